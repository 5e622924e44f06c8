use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::new_id;

/// Task urgency, P0 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Scheduled,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    None,
    Monthly,
    Biweekly,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub payee: String,
    pub amount: f64,
    pub currency: String,
    /// Calendar due date; time-of-day is separate and defaults to midnight.
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub autopay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consequences_text: Option<String>,
    /// Reminder lead times before the due date, e.g. ["3d", "1d"].
    #[serde(default)]
    pub reminder_cadence: Vec<String>,
    pub status: BillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Soft reference, not checked against the tasks collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Soft reference to any other item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_item_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: String,
    pub vendor_name: String,
    pub date: String,
    pub total: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ReceiptExtract>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured data pulled out of a receipt image. Extraction is best-effort,
/// so every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptExtract {
    pub vendor_name: Option<String>,
    pub date: Option<String>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total: Option<f64>,
    pub currency: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub completed_tasks: Vec<String>,
    pub missed_tasks: Vec<String>,
    pub upcoming_bills: Vec<String>,
    pub overdue_bills: Vec<String>,
    pub suggested_tomorrow_top5: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub timezone: String,
    /// "HH:MM"
    pub work_hours_start: String,
    /// "HH:MM"
    pub work_hours_end: String,
    pub notifications_enabled: bool,
    pub currency: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            work_hours_start: "09:00".to_string(),
            work_hours_end: "17:00".to_string(),
            notifications_enabled: false,
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single turn in the concierge chat. Lives only in memory for the active
/// session and is never written to the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// The full per-user document: six collections plus the settings singleton.
/// This is exactly what gets serialized into the user's storage partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub bills: Vec<Bill>,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
    #[serde(default)]
    pub summaries: Vec<DailySummary>,
    #[serde(default)]
    pub settings: Settings,
}

impl Task {
    pub fn new(title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            title,
            notes: None,
            due_at: None,
            priority: Priority::P1,
            tags: Vec::new(),
            project: None,
            status: TaskStatus::Todo,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch over this task, refreshing `updated_at`.
    ///
    /// The completion invariant is enforced here: `completed_at` is present
    /// exactly when the status is `done`.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
        if let Some(due_at) = patch.due_at {
            self.due_at = Some(due_at);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(project) = patch.project {
            self.project = Some(project);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
        match self.status {
            TaskStatus::Done => {
                if self.completed_at.is_none() {
                    self.completed_at = Some(now);
                }
            }
            _ => self.completed_at = None,
        }
        self.updated_at = now;
    }
}

impl Bill {
    pub fn new(payee: String, amount: f64, due_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            payee,
            amount,
            currency: "USD".to_string(),
            due_date,
            due_time: None,
            recurrence: None,
            autopay: false,
            consequences_text: None,
            reminder_cadence: vec!["3d".to_string(), "1d".to_string()],
            status: BillStatus::Scheduled,
            paid_at: None,
            proof_note: None,
            snoozed_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch over this bill, refreshing `updated_at`.
    pub fn apply(&mut self, patch: BillPatch, now: DateTime<Utc>) {
        if let Some(payee) = patch.payee {
            self.payee = payee;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(currency) = patch.currency {
            self.currency = currency;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(due_time) = patch.due_time {
            self.due_time = Some(due_time);
        }
        if let Some(recurrence) = patch.recurrence {
            self.recurrence = Some(recurrence);
        }
        if let Some(autopay) = patch.autopay {
            self.autopay = autopay;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(paid_at) = patch.paid_at {
            self.paid_at = Some(paid_at);
        }
        if let Some(proof_note) = patch.proof_note {
            self.proof_note = Some(proof_note);
        }
        if let Some(snoozed_until) = patch.snoozed_until {
            self.snoozed_until = Some(snoozed_until);
        }
        self.updated_at = now;
    }
}

impl CalendarEvent {
    pub fn new(title: String, start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            title,
            start,
            end,
            location: None,
            notes: None,
            related_task_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Note {
    pub fn new(content: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            content,
            tags: Vec::new(),
            linked_item_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch over this note, refreshing `updated_at`.
    pub fn apply(&mut self, patch: NotePatch, now: DateTime<Utc>) {
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(linked_item_id) = patch.linked_item_id {
            self.linked_item_id = Some(linked_item_id);
        }
        self.updated_at = now;
    }
}

impl Receipt {
    pub fn new(vendor_name: String, date: String, total: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            vendor_name,
            date,
            total,
            currency: "USD".to_string(),
            category: None,
            image_path: None,
            extracted: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a task. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub project: Option<String>,
    pub status: Option<TaskStatus>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Partial update for a bill. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BillPatch {
    pub payee: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub recurrence: Option<Recurrence>,
    pub autopay: Option<bool>,
    pub status: Option<BillStatus>,
    pub paid_at: Option<DateTime<Utc>>,
    pub proof_note: Option<String>,
    pub snoozed_until: Option<DateTime<Utc>>,
}

/// Partial update for a note. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub linked_item_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn priority_orders_p0_first() {
        assert!(Priority::P0 < Priority::P1);
        assert!(Priority::P2 < Priority::P3);
    }

    #[test]
    fn task_patch_enforces_completion_invariant() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let mut task = Task::new("Call bank".to_string(), now);
        assert!(task.completed_at.is_none());

        let later = at("2024-01-11T09:00:00Z");
        task.apply(
            TaskPatch {
                status: Some(TaskStatus::Done),
                ..TaskPatch::default()
            },
            later,
        );
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.completed_at, Some(later));
        assert_eq!(task.updated_at, later);

        // Reopening clears the completion instant.
        task.apply(
            TaskPatch {
                status: Some(TaskStatus::Todo),
                ..TaskPatch::default()
            },
            at("2024-01-12T09:00:00Z"),
        );
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn document_round_trips_through_json() {
        let now = at("2024-01-10T08:00:00Z");
        let mut doc = Document::default();
        let mut task = Task::new("Explore FocusPilot features".to_string(), now);
        task.tags = vec!["onboarding".to_string()];
        doc.tasks.push(task);
        doc.bills.push(Bill::new(
            "Utility Corp".to_string(),
            42.50,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            now,
        ));
        doc.notes.push(Note::new("remember the milk".to_string(), now));

        let json = serde_json::to_string(&doc).unwrap();
        let reloaded: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            serde_json::to_value(&reloaded).unwrap()
        );
        assert_eq!(reloaded.tasks[0].tags, vec!["onboarding".to_string()]);
        assert_eq!(reloaded.bills[0].status, BillStatus::Scheduled);
    }

    #[test]
    fn bill_serializes_with_camel_case_keys() {
        let now = at("2024-01-10T08:00:00Z");
        let bill = Bill::new(
            "Utility Corp".to_string(),
            42.50,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            now,
        );
        let value = serde_json::to_value(&bill).unwrap();
        assert_eq!(value["dueDate"], "2024-01-10");
        assert_eq!(value["status"], "scheduled");
        assert_eq!(value["reminderCadence"][0], "3d");
        assert!(value.get("snoozedUntil").is_none());
    }
}
