use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::bills;
use crate::models::Document;

/// Fire-and-forget alert sink. The terminal implementation prints; tests
/// capture.
pub trait Notifier {
    fn notify(&mut self, title: &str, body: &str);
}

/// Prints alerts to the terminal.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&mut self, title: &str, body: &str) {
        println!("🔔 {title}\n   {body}");
    }
}

/// Scans bills and fires reminders for whatever is due.
///
/// With a zero throttle this nags: every check that still finds an overdue,
/// unsnoozed bill fires again. A positive throttle suppresses repeats per
/// bill inside the window.
pub struct ReminderEngine {
    throttle: Option<Duration>,
    last_fired: HashMap<String, DateTime<Utc>>,
}

impl ReminderEngine {
    pub fn new(throttle_minutes: u64) -> Self {
        let throttle = if throttle_minutes == 0 {
            None
        } else {
            Some(Duration::minutes(throttle_minutes as i64))
        };
        Self {
            throttle,
            last_fired: HashMap::new(),
        }
    }

    /// One reminder pass. Read-only against the document, so it can run
    /// alongside user-initiated mutations without racing them.
    pub fn check(&mut self, doc: &Document, now: DateTime<Utc>, notifier: &mut dyn Notifier) {
        if !doc.settings.notifications_enabled {
            return;
        }

        for bill in &doc.bills {
            if !bills::should_remind(bill, now) {
                continue;
            }
            if let (Some(window), Some(fired)) = (self.throttle, self.last_fired.get(&bill.id)) {
                if now < *fired + window {
                    debug!(payee = %bill.payee, "reminder throttled");
                    continue;
                }
            }
            notifier.notify(
                &format!("FocusPilot Alert: {} Overdue", bill.payee),
                &format!(
                    "Your payment of {} {} was due on {}. Action required.",
                    bill.amount, bill.currency, bill.due_date
                ),
            );
            self.last_fired.insert(bill.id.clone(), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bill;
    use chrono::NaiveDate;

    #[derive(Default)]
    struct Capture(Vec<(String, String)>);

    impl Notifier for Capture {
        fn notify(&mut self, title: &str, body: &str) {
            self.0.push((title.to_string(), body.to_string()));
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn doc_with_overdue_bill() -> Document {
        let created = at("2024-01-01T00:00:00Z");
        let mut doc = Document::default();
        doc.settings.notifications_enabled = true;
        doc.bills.push(Bill::new(
            "Utility Corp".to_string(),
            42.50,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            created,
        ));
        doc
    }

    #[test]
    fn silent_when_notifications_disabled() {
        let mut doc = doc_with_overdue_bill();
        doc.settings.notifications_enabled = false;
        let mut capture = Capture::default();
        let mut engine = ReminderEngine::new(0);

        engine.check(&doc, at("2024-01-11T00:00:00Z"), &mut capture);
        assert!(capture.0.is_empty());
    }

    #[test]
    fn unthrottled_engine_fires_every_poll() {
        let doc = doc_with_overdue_bill();
        let mut capture = Capture::default();
        let mut engine = ReminderEngine::new(0);

        engine.check(&doc, at("2024-01-11T00:00:00Z"), &mut capture);
        engine.check(&doc, at("2024-01-11T00:01:00Z"), &mut capture);
        assert_eq!(capture.0.len(), 2);
        assert_eq!(capture.0[0].0, "FocusPilot Alert: Utility Corp Overdue");
        assert!(capture.0[0].1.contains("42.5 USD"));
    }

    #[test]
    fn throttle_suppresses_repeats_inside_the_window() {
        let doc = doc_with_overdue_bill();
        let mut capture = Capture::default();
        let mut engine = ReminderEngine::new(60);

        engine.check(&doc, at("2024-01-11T00:00:00Z"), &mut capture);
        engine.check(&doc, at("2024-01-11T00:30:00Z"), &mut capture);
        assert_eq!(capture.0.len(), 1);

        engine.check(&doc, at("2024-01-11T01:00:00Z"), &mut capture);
        assert_eq!(capture.0.len(), 2);
    }

    #[test]
    fn snoozed_and_paid_bills_stay_quiet() {
        let mut doc = doc_with_overdue_bill();
        let now = at("2024-01-11T00:00:00Z");
        let mut capture = Capture::default();
        let mut engine = ReminderEngine::new(0);

        let snooze = crate::bills::snooze_patch(now);
        let bill = &mut doc.bills[0];
        bill.apply(snooze, now);
        engine.check(&doc, now, &mut capture);
        assert!(capture.0.is_empty());

        let bill = &mut doc.bills[0];
        let pay = crate::bills::mark_paid_patch(bill, now).unwrap();
        bill.apply(pay, now);
        engine.check(&doc, at("2024-06-01T00:00:00Z"), &mut capture);
        assert!(capture.0.is_empty());
    }
}
