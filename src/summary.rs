use chrono::{DateTime, Duration, Utc};

use crate::bills;
use crate::models::{DailySummary, Document, TaskStatus};

/// Build the end-of-day digest from the current document. Pure; callers
/// decide whether to persist it into the summaries collection.
pub fn build_daily_summary(doc: &Document, now: DateTime<Utc>) -> DailySummary {
    let today = now.date_naive();
    let start_of_day = today.and_time(chrono::NaiveTime::MIN).and_utc();

    let completed_tasks = doc
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .filter(|t| matches!(t.completed_at, Some(done) if done.date_naive() == today))
        .map(|t| t.title.clone())
        .collect();

    let missed_tasks = doc
        .tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Done)
        .filter(|t| matches!(t.due_at, Some(due) if due < start_of_day))
        .map(|t| t.title.clone())
        .collect();

    let overdue_bills: Vec<String> = doc
        .bills
        .iter()
        .filter(|b| bills::is_overdue(b, now))
        .map(|b| b.payee.clone())
        .collect();

    let horizon = today + Duration::days(7);
    let upcoming_bills = doc
        .bills
        .iter()
        .filter(|b| b.status != crate::models::BillStatus::Paid)
        .filter(|b| !bills::is_overdue(b, now))
        .filter(|b| b.due_date >= today && b.due_date <= horizon)
        .map(|b| format!("{} ({:.2} {})", b.payee, b.amount, b.currency))
        .collect();

    // Top suggestions: open tasks by priority, then by nearest due instant.
    let mut open: Vec<_> = doc
        .tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Done)
        .collect();
    open.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| match (a.due_at, b.due_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });
    let suggested_tomorrow_top5 = open.iter().take(5).map(|t| t.title.clone()).collect();

    DailySummary {
        date: today,
        completed_tasks,
        missed_tasks,
        upcoming_bills,
        overdue_bills,
        suggested_tomorrow_top5,
    }
}

/// Human-readable rendering for the chat bubble / terminal.
pub fn render(summary: &DailySummary) -> String {
    let mut out = format!("Daily summary for {}\n", summary.date);
    out.push_str(&section("Completed today", &summary.completed_tasks));
    out.push_str(&section("Missed", &summary.missed_tasks));
    out.push_str(&section("Bills due this week", &summary.upcoming_bills));
    out.push_str(&section("Overdue bills", &summary.overdue_bills));
    out.push_str(&section(
        "Suggested for tomorrow",
        &summary.suggested_tomorrow_top5,
    ));
    out
}

fn section(title: &str, items: &[String]) -> String {
    if items.is_empty() {
        return format!("{title}: none\n");
    }
    let mut out = format!("{title}:\n");
    for item in items {
        out.push_str(&format!("  - {item}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bill, Priority, Task, TaskPatch, TaskStatus};
    use chrono::NaiveDate;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn summary_buckets_tasks_and_bills() {
        let now = at("2024-01-11T20:00:00Z");
        let earlier = at("2024-01-09T08:00:00Z");
        let mut doc = Document::default();

        let mut done_today = Task::new("Ship report".to_string(), earlier);
        done_today.apply(
            TaskPatch {
                status: Some(TaskStatus::Done),
                ..TaskPatch::default()
            },
            at("2024-01-11T10:00:00Z"),
        );
        doc.tasks.push(done_today);

        let mut missed = Task::new("Renew passport".to_string(), earlier);
        missed.due_at = Some(at("2024-01-10T09:00:00Z"));
        doc.tasks.push(missed);

        let mut urgent = Task::new("File taxes".to_string(), earlier);
        urgent.priority = Priority::P0;
        doc.tasks.push(urgent);

        // Overdue on the 11th.
        doc.bills.push(Bill::new(
            "Utility Corp".to_string(),
            42.50,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            earlier,
        ));
        // Due within the week.
        doc.bills.push(Bill::new(
            "Rent".to_string(),
            1200.0,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            earlier,
        ));
        // Too far out.
        doc.bills.push(Bill::new(
            "Insurance".to_string(),
            300.0,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            earlier,
        ));

        let summary = build_daily_summary(&doc, now);
        assert_eq!(summary.date, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(summary.completed_tasks, vec!["Ship report".to_string()]);
        assert_eq!(summary.missed_tasks, vec!["Renew passport".to_string()]);
        assert_eq!(summary.overdue_bills, vec!["Utility Corp".to_string()]);
        assert_eq!(summary.upcoming_bills, vec!["Rent (1200.00 USD)".to_string()]);
        // Priority wins over insertion order.
        assert_eq!(summary.suggested_tomorrow_top5[0], "File taxes");
    }

    #[test]
    fn render_mentions_every_section() {
        let summary = DailySummary {
            date: NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
            completed_tasks: vec![],
            missed_tasks: vec!["Renew passport".to_string()],
            upcoming_bills: vec![],
            overdue_bills: vec![],
            suggested_tomorrow_top5: vec![],
        };
        let text = render(&summary);
        assert!(text.contains("Completed today: none"));
        assert!(text.contains("- Renew passport"));
    }
}
