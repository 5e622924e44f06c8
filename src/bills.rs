use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::models::{Bill, BillPatch, BillStatus};

/// How long a snooze suppresses the overdue flag.
pub const SNOOZE_HOURS: i64 = 4;

/// The instant a bill falls due: calendar date plus time-of-day, midnight
/// when no time was given.
pub fn due_instant(bill: &Bill) -> DateTime<Utc> {
    let time = bill.due_time.unwrap_or(NaiveTime::MIN);
    bill.due_date.and_time(time).and_utc()
}

/// Whether a snooze window is currently active.
pub fn is_snoozed(bill: &Bill, now: DateTime<Utc>) -> bool {
    matches!(bill.snoozed_until, Some(until) if until > now)
}

/// A bill is overdue iff it is unpaid, past due, and not snoozed.
pub fn is_overdue(bill: &Bill, now: DateTime<Utc>) -> bool {
    bill.status != BillStatus::Paid && now >= due_instant(bill) && !is_snoozed(bill, now)
}

/// Status as presented: `paid` is sticky, `overdue` is derived on every read
/// rather than trusted from storage.
pub fn effective_status(bill: &Bill, now: DateTime<Utc>) -> BillStatus {
    if bill.status == BillStatus::Paid {
        BillStatus::Paid
    } else if is_overdue(bill, now) {
        BillStatus::Overdue
    } else {
        BillStatus::Scheduled
    }
}

/// Whether a reminder should fire for this bill right now. There is no
/// built-in dedup here; throttling is the notifier's policy decision.
pub fn should_remind(bill: &Bill, now: DateTime<Utc>) -> bool {
    bill.status != BillStatus::Paid && !is_snoozed(bill, now) && now >= due_instant(bill)
}

/// Patch that snoozes a bill: suppressed for the next four hours, stored
/// status reset to `scheduled` so the derived check governs again after the
/// window elapses.
pub fn snooze_patch(now: DateTime<Utc>) -> BillPatch {
    BillPatch {
        snoozed_until: Some(now + Duration::hours(SNOOZE_HOURS)),
        status: Some(BillStatus::Scheduled),
        ..BillPatch::default()
    }
}

/// Patch that marks a bill paid, recording the instant. Returns `None` for a
/// bill that is already paid: `paid_at` must never be overwritten.
pub fn mark_paid_patch(bill: &Bill, now: DateTime<Utc>) -> Option<BillPatch> {
    if bill.status == BillStatus::Paid {
        return None;
    }
    Some(BillPatch {
        status: Some(BillStatus::Paid),
        paid_at: Some(now),
        ..BillPatch::default()
    })
}

/// Bills with their derived status, in presentation order (ascending due
/// date; lexicographic on the ISO date is time-correct).
pub fn presented(mut bills: Vec<Bill>, now: DateTime<Utc>) -> Vec<Bill> {
    for bill in &mut bills {
        bill.status = effective_status(bill, now);
    }
    bills.sort_by(|a, b| a.due_date.cmp(&b.due_date));
    bills
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn utility_bill() -> Bill {
        Bill::new(
            "Utility Corp".to_string(),
            42.50,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            at("2024-01-01T00:00:00Z"),
        )
    }

    #[test]
    fn due_instant_defaults_to_midnight() {
        let mut bill = utility_bill();
        assert_eq!(due_instant(&bill), at("2024-01-10T00:00:00Z"));

        bill.due_time = NaiveTime::from_hms_opt(17, 30, 0);
        assert_eq!(due_instant(&bill), at("2024-01-10T17:30:00Z"));
    }

    #[test]
    fn overdue_iff_past_due_and_not_snoozed() {
        let bill = utility_bill();
        assert!(!is_overdue(&bill, at("2024-01-09T23:59:59Z")));
        assert!(is_overdue(&bill, at("2024-01-10T00:00:00Z")));
        assert!(is_overdue(&bill, at("2024-01-11T00:00:00Z")));
        assert_eq!(
            effective_status(&bill, at("2024-01-11T00:00:00Z")),
            BillStatus::Overdue
        );
    }

    #[test]
    fn paid_is_sticky() {
        let mut bill = utility_bill();
        let paid_at = at("2024-01-11T00:00:00Z");
        bill.apply(mark_paid_patch(&bill, paid_at).unwrap(), paid_at);
        assert_eq!(bill.status, BillStatus::Paid);
        assert_eq!(bill.paid_at, Some(paid_at));

        // Long past due, still paid.
        assert_eq!(
            effective_status(&bill, at("2024-06-01T00:00:00Z")),
            BillStatus::Paid
        );
    }

    #[test]
    fn mark_paid_is_idempotent() {
        let mut bill = utility_bill();
        let first = at("2024-01-11T00:00:00Z");
        bill.apply(mark_paid_patch(&bill, first).unwrap(), first);

        assert!(mark_paid_patch(&bill, at("2024-01-12T00:00:00Z")).is_none());
        assert_eq!(bill.paid_at, Some(first));
    }

    #[test]
    fn snooze_window_suppresses_then_expires() {
        // Overdue on Jan 11 at midnight.
        let mut bill = utility_bill();
        let now = at("2024-01-11T00:00:00Z");
        assert_eq!(effective_status(&bill, now), BillStatus::Overdue);

        // Snoozing resets to scheduled with a four hour window.
        bill.apply(snooze_patch(now), now);
        assert_eq!(bill.status, BillStatus::Scheduled);
        assert_eq!(bill.snoozed_until, Some(at("2024-01-11T04:00:00Z")));
        assert!(!is_overdue(&bill, now));

        // Still suppressed inside the window.
        assert_eq!(
            effective_status(&bill, at("2024-01-11T03:00:00Z")),
            BillStatus::Scheduled
        );

        // Window elapsed, overdue again.
        assert_eq!(
            effective_status(&bill, at("2024-01-11T05:00:00Z")),
            BillStatus::Overdue
        );
    }

    #[test]
    fn reminder_fires_only_when_unpaid_due_and_unsnoozed() {
        let mut bill = utility_bill();
        assert!(!should_remind(&bill, at("2024-01-09T00:00:00Z")));
        assert!(should_remind(&bill, at("2024-01-10T00:00:00Z")));

        let now = at("2024-01-10T12:00:00Z");
        bill.apply(snooze_patch(now), now);
        assert!(!should_remind(&bill, now));
        assert!(should_remind(&bill, at("2024-01-10T17:00:00Z")));

        bill.apply(mark_paid_patch(&bill, now).unwrap(), now);
        assert!(!should_remind(&bill, at("2024-02-01T00:00:00Z")));
    }

    #[test]
    fn presentation_sorts_by_due_date_and_derives_status() {
        let now = at("2024-01-11T00:00:00Z");
        let mut late = utility_bill();
        late.due_date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let early = utility_bill();

        let shown = presented(vec![late, early], now);
        assert_eq!(shown[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(shown[0].status, BillStatus::Overdue);
        assert_eq!(shown[1].status, BillStatus::Scheduled);
    }
}
