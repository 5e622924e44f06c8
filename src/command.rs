use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bills;
use crate::models::{
    Bill, CalendarEvent, Note, Priority, Recurrence, Task, TaskPatch, TaskStatus,
};
use crate::store::{Collection, Item, Store, StoreError};
use crate::summary;

/// Wire shape the interpreter must produce for any free-text input. This is
/// the contract with the hosted model: a fixed action enumeration, a
/// confidence score, an optional clarification, the fields it could not
/// fill, and a sparse best-effort payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedCommand {
    #[serde(rename = "type", default)]
    pub action: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub clarification_question: Option<String>,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub payload: CommandPayload,
}

/// Sparse extraction payload. Every field is optional; instants and dates
/// stay as strings on the wire and are parsed leniently during conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due_at: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
    pub payee: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub due_date: Option<String>,
    pub autopay: Option<bool>,
    pub recurrence: Option<String>,
    pub id: Option<String>,
}

/// The closed set of actions a parsed command can dispatch to. One variant
/// per action type, each carrying its own typed payload; anything outside
/// the enumeration lands in `Unrecognized` and is reported, never silently
/// dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTask {
        title: Option<String>,
        notes: Option<String>,
        due_at: Option<DateTime<Utc>>,
        priority: Option<Priority>,
        tags: Vec<String>,
    },
    UpdateTask {
        id: Option<String>,
        title: Option<String>,
        notes: Option<String>,
        due_at: Option<DateTime<Utc>>,
        priority: Option<Priority>,
        tags: Option<Vec<String>>,
    },
    CompleteTask {
        id: Option<String>,
    },
    CreateBill {
        payee: Option<String>,
        amount: Option<f64>,
        currency: Option<String>,
        due_date: Option<NaiveDate>,
        autopay: Option<bool>,
        recurrence: Option<Recurrence>,
    },
    MarkBillPaid {
        id: Option<String>,
    },
    CreateEvent {
        title: Option<String>,
        start: Option<DateTime<Utc>>,
    },
    CreateNote {
        content: Option<String>,
    },
    SetReminder {
        title: Option<String>,
        due_at: Option<DateTime<Utc>>,
    },
    Query,
    DailySummary,
    Unrecognized(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unrecognized command type: {0}")]
    UnrecognizedCommand(String),
    #[error("Cannot {action} without {field}")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
}

/// What a dispatched command did, for the caller to report.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The interpreter wants more information; nothing was mutated. Shown
    /// verbatim.
    Clarification(String),
    Created {
        collection: Collection,
        id: String,
        label: String,
    },
    Updated {
        collection: Collection,
        id: String,
        label: String,
    },
    /// Read-only answer (query, daily summary).
    Answer(String),
}

/// Accept an RFC 3339 instant, a naive date-time, or a bare date (midnight).
/// Extraction is best-effort, so an unparseable value degrades to absent
/// rather than failing the whole command.
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Some(dt);
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Accept a bare date or take the date part of a full instant.
fn parse_date_loose(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_instant(s).map(|dt| dt.date_naive()))
}

fn parse_priority(s: &str) -> Option<Priority> {
    match s {
        "P0" => Some(Priority::P0),
        "P1" => Some(Priority::P1),
        "P2" => Some(Priority::P2),
        "P3" => Some(Priority::P3),
        _ => None,
    }
}

fn parse_recurrence(s: &str) -> Option<Recurrence> {
    match s {
        "none" => Some(Recurrence::None),
        "monthly" => Some(Recurrence::Monthly),
        "biweekly" => Some(Recurrence::Biweekly),
        "custom" => Some(Recurrence::Custom),
        _ => None,
    }
}

impl Command {
    /// Convert the wire shape into the typed union.
    pub fn from_parsed(parsed: &ParsedCommand) -> Self {
        let p = &parsed.payload;
        match parsed.action.as_str() {
            "create_task" => Command::CreateTask {
                title: p.title.clone(),
                notes: p.notes.clone(),
                due_at: p.due_at.as_deref().and_then(parse_instant),
                priority: p.priority.as_deref().and_then(parse_priority),
                tags: p.tags.clone().unwrap_or_default(),
            },
            "update_task" => Command::UpdateTask {
                id: p.id.clone(),
                title: p.title.clone(),
                notes: p.notes.clone(),
                due_at: p.due_at.as_deref().and_then(parse_instant),
                priority: p.priority.as_deref().and_then(parse_priority),
                tags: p.tags.clone(),
            },
            "complete_task" => Command::CompleteTask { id: p.id.clone() },
            "create_bill" => Command::CreateBill {
                payee: p.payee.clone(),
                amount: p.amount,
                currency: p.currency.clone(),
                due_date: p.due_date.as_deref().and_then(parse_date_loose),
                autopay: p.autopay,
                recurrence: p.recurrence.as_deref().and_then(parse_recurrence),
            },
            "mark_bill_paid" => Command::MarkBillPaid { id: p.id.clone() },
            "create_event" => Command::CreateEvent {
                title: p.title.clone(),
                start: p.due_at.as_deref().and_then(parse_instant),
            },
            "create_note" => Command::CreateNote {
                content: p.notes.clone().or_else(|| p.title.clone()),
            },
            "set_reminder" => Command::SetReminder {
                title: p.title.clone(),
                due_at: p.due_at.as_deref().and_then(parse_instant),
            },
            "query" => Command::Query,
            "daily_summary" => Command::DailySummary,
            other => Command::Unrecognized(other.to_string()),
        }
    }
}

/// Map a parsed command onto exactly one store operation.
///
/// A pending clarification short-circuits before any mutation. Required
/// defaults are filled here: new tasks get "New Task"/todo/P1, new bills get
/// scheduled/["3d","1d"]/the configured currency.
pub fn dispatch(
    store: &mut Store,
    parsed: &ParsedCommand,
    now: DateTime<Utc>,
) -> Result<Outcome, DispatchError> {
    if let Some(question) = &parsed.clarification_question {
        return Ok(Outcome::Clarification(question.clone()));
    }

    match Command::from_parsed(parsed) {
        Command::CreateTask {
            title,
            notes,
            due_at,
            priority,
            tags,
        } => {
            let mut task = Task::new(title.unwrap_or_else(|| "New Task".to_string()), now);
            task.notes = notes;
            task.due_at = due_at;
            task.priority = priority.unwrap_or(Priority::P1);
            task.tags = tags;
            let id = task.id.clone();
            let label = task.title.clone();
            store.add_item(Item::Task(task), now)?;
            Ok(Outcome::Created {
                collection: Collection::Tasks,
                id,
                label,
            })
        }
        Command::UpdateTask {
            id,
            title,
            notes,
            due_at,
            priority,
            tags,
        } => {
            let id = id.ok_or(DispatchError::MissingField {
                action: "update a task",
                field: "id",
            })?;
            let patch = TaskPatch {
                title,
                notes,
                due_at,
                priority,
                tags,
                ..TaskPatch::default()
            };
            store.update_task(&id, patch, now)?;
            Ok(Outcome::Updated {
                collection: Collection::Tasks,
                label: "task".to_string(),
                id,
            })
        }
        Command::CompleteTask { id } => {
            let id = id.ok_or(DispatchError::MissingField {
                action: "complete a task",
                field: "id",
            })?;
            let patch = TaskPatch {
                status: Some(TaskStatus::Done),
                completed_at: Some(now),
                ..TaskPatch::default()
            };
            store.update_task(&id, patch, now)?;
            Ok(Outcome::Updated {
                collection: Collection::Tasks,
                label: "task completed".to_string(),
                id,
            })
        }
        Command::CreateBill {
            payee,
            amount,
            currency,
            due_date,
            autopay,
            recurrence,
        } => {
            let payee = payee.ok_or(DispatchError::MissingField {
                action: "create a bill",
                field: "payee",
            })?;
            let amount = amount.ok_or(DispatchError::MissingField {
                action: "create a bill",
                field: "amount",
            })?;
            let settings = store.get(now)?.settings;
            let mut bill = Bill::new(payee, amount, due_date.unwrap_or(now.date_naive()), now);
            bill.currency = currency.unwrap_or(settings.currency);
            bill.autopay = autopay.unwrap_or(false);
            bill.recurrence = recurrence;
            let id = bill.id.clone();
            let label = bill.payee.clone();
            store.add_item(Item::Bill(bill), now)?;
            Ok(Outcome::Created {
                collection: Collection::Bills,
                id,
                label,
            })
        }
        Command::MarkBillPaid { id } => {
            let id = id.ok_or(DispatchError::MissingField {
                action: "mark a bill paid",
                field: "id",
            })?;
            let doc = store.get(now)?;
            if let Some(bill) = doc.bills.iter().find(|b| b.id == id) {
                if let Some(patch) = bills::mark_paid_patch(bill, now) {
                    store.update_bill(&id, patch, now)?;
                }
            }
            Ok(Outcome::Updated {
                collection: Collection::Bills,
                label: "bill paid".to_string(),
                id,
            })
        }
        Command::CreateEvent { title, start } => {
            let start = start.unwrap_or(now);
            let event = CalendarEvent::new(
                title.unwrap_or_else(|| "New Event".to_string()),
                start,
                start + Duration::hours(1),
                now,
            );
            let id = event.id.clone();
            let label = event.title.clone();
            store.add_item(Item::Event(event), now)?;
            Ok(Outcome::Created {
                collection: Collection::Events,
                id,
                label,
            })
        }
        Command::CreateNote { content } => {
            let content = content.ok_or(DispatchError::MissingField {
                action: "create a note",
                field: "content",
            })?;
            let note = Note::new(content, now);
            let id = note.id.clone();
            let label = note.content.clone();
            store.add_item(Item::Note(note), now)?;
            Ok(Outcome::Created {
                collection: Collection::Notes,
                id,
                label,
            })
        }
        Command::SetReminder { title, due_at } => {
            let due_at = due_at.ok_or(DispatchError::MissingField {
                action: "set a reminder",
                field: "dueAt",
            })?;
            let mut task = Task::new(title.unwrap_or_else(|| "Reminder".to_string()), now);
            task.due_at = Some(due_at);
            task.tags = vec!["reminder".to_string()];
            let id = task.id.clone();
            let label = task.title.clone();
            store.add_item(Item::Task(task), now)?;
            Ok(Outcome::Created {
                collection: Collection::Tasks,
                id,
                label,
            })
        }
        Command::Query => {
            let doc = store.get(now)?;
            let active_tasks = doc
                .tasks
                .iter()
                .filter(|t| t.status != TaskStatus::Done)
                .count();
            let unpaid_bills = doc
                .bills
                .iter()
                .filter(|b| bills::effective_status(b, now) != crate::models::BillStatus::Paid)
                .count();
            Ok(Outcome::Answer(format!(
                "{} active tasks, {} unpaid bills, {} notes, {} receipts on file.",
                active_tasks,
                unpaid_bills,
                doc.notes.len(),
                doc.receipts.len()
            )))
        }
        Command::DailySummary => {
            let doc = store.get(now)?;
            let daily = summary::build_daily_summary(&doc, now);
            let rendered = summary::render(&daily);
            store.add_item(Item::Summary(daily), now)?;
            Ok(Outcome::Answer(rendered))
        }
        Command::Unrecognized(action) => Err(DispatchError::UnrecognizedCommand(action)),
    }
}
