use clap::{Parser, Subcommand};
use thiserror::Error;

use chrono::Utc;
use std::io::{BufRead, Write};

use crate::assistant::{
    AssistantError, ChatSession, CommandInterpreter, Concierge, InterpretContext, ReceiptExtractor,
};
use crate::auth::{Auth, AuthError};
use crate::bills;
use crate::command::{self, DispatchError, Outcome};
use crate::config::Config;
use crate::database::DatabaseError;
use crate::models::{Priority, Receipt, Recurrence, Task, TaskStatus};
use crate::notify::{ReminderEngine, TerminalNotifier};
use crate::store::{Collection, Item, SettingsPatch, Store, StoreError};
use crate::utils::{parse_date, parse_time};

#[derive(Parser)]
#[command(name = "focuspilot")]
#[command(about = "Tasks, bills, notes and receipts with an AI command bar")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new account (and sign in)
    Register {
        /// Display name
        name: String,
        /// Email address
        email: String,
        /// Password
        #[arg(long)]
        password: String,
    },
    /// Sign in to an existing account
    Login {
        /// Email address
        email: String,
        /// Password
        #[arg(long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Tell FocusPilot what's next, in plain language
    Do {
        /// The request, e.g. "pay the electric bill friday"
        text: String,
    },
    /// Chat with the AI concierge
    Chat,
    /// Quickly add a new task
    AddTask {
        /// Task title
        title: String,
        /// Due instant (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
        /// Priority (P0..P3)
        #[arg(long)]
        priority: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// Project label
        #[arg(long)]
        project: Option<String>,
    },
    /// Quickly add a new bill
    AddBill {
        /// Payee name
        payee: String,
        /// Amount due
        amount: f64,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: String,
        /// Time of day the bill is due (HH:MM)
        #[arg(long)]
        time: Option<String>,
        /// Currency code (defaults to the configured currency)
        #[arg(long)]
        currency: Option<String>,
        /// Paid automatically
        #[arg(long)]
        autopay: bool,
        /// Recurrence (none, monthly, biweekly, custom)
        #[arg(long)]
        recurrence: Option<String>,
    },
    /// Quickly add a new note
    AddNote {
        /// Note content
        content: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Capture a receipt image and extract its data
    Receipt {
        /// Path to the receipt image (JPEG)
        image: String,
    },
    /// List tasks
    Tasks,
    /// List bills with their current status
    Bills,
    /// List notes
    Notes,
    /// Mark a task done
    Complete {
        /// Task id
        id: String,
    },
    /// Mark a bill paid
    Pay {
        /// Bill id
        id: String,
    },
    /// Snooze an overdue bill for four hours
    Snooze {
        /// Bill id
        id: String,
    },
    /// Delete an item from a collection
    Delete {
        /// Collection (tasks, bills, events, notes, receipts)
        collection: String,
        /// Item id
        id: String,
    },
    /// Print the daily summary
    Summary,
    /// Run the bill reminder check
    Remind {
        /// Keep polling instead of checking once
        #[arg(long)]
        watch: bool,
    },
    /// Update settings
    Settings {
        /// Timezone identifier
        #[arg(long)]
        timezone: Option<String>,
        /// Default currency code
        #[arg(long)]
        currency: Option<String>,
        /// Work hours start (HH:MM)
        #[arg(long)]
        work_start: Option<String>,
        /// Work hours end (HH:MM)
        #[arg(long)]
        work_end: Option<String>,
        /// Enable or disable notifications
        #[arg(long)]
        notifications: Option<bool>,
    },
    /// Delete all stored data for the signed-in account
    Erase {
        /// Required confirmation
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("{0}")]
    AuthError(#[from] AuthError),
    #[error("Assistant error: {0}")]
    AssistantError(#[from] AssistantError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Unknown {kind}: {value}")]
    BadArgument { kind: &'static str, value: String },
    #[error("Not signed in. Run `focuspilot register` or `focuspilot login` first.")]
    NotLoggedIn,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Resolve the signed-in user or refuse.
pub fn require_user(auth: &Auth) -> Result<crate::auth::User, CliError> {
    auth.current_user()?.ok_or(CliError::NotLoggedIn)
}

fn parse_priority_arg(s: &str) -> Result<Priority, CliError> {
    match s.to_ascii_uppercase().as_str() {
        "P0" => Ok(Priority::P0),
        "P1" => Ok(Priority::P1),
        "P2" => Ok(Priority::P2),
        "P3" => Ok(Priority::P3),
        _ => Err(CliError::BadArgument {
            kind: "priority",
            value: s.to_string(),
        }),
    }
}

fn parse_recurrence_arg(s: &str) -> Result<Recurrence, CliError> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(Recurrence::None),
        "monthly" => Ok(Recurrence::Monthly),
        "biweekly" => Ok(Recurrence::Biweekly),
        "custom" => Ok(Recurrence::Custom),
        _ => Err(CliError::BadArgument {
            kind: "recurrence",
            value: s.to_string(),
        }),
    }
}

fn parse_collection_arg(s: &str) -> Result<Collection, CliError> {
    match s.to_ascii_lowercase().as_str() {
        "tasks" => Ok(Collection::Tasks),
        "bills" => Ok(Collection::Bills),
        "events" => Ok(Collection::Events),
        "notes" => Ok(Collection::Notes),
        "receipts" => Ok(Collection::Receipts),
        _ => Err(CliError::BadArgument {
            kind: "collection",
            value: s.to_string(),
        }),
    }
}

fn split_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Handle the free-text command bar. Interpretation failures surface as a
/// clarification bubble, never as a raw error.
pub fn handle_do(
    text: &str,
    store: &mut Store,
    interpreter: &dyn CommandInterpreter,
) -> Result<(), CliError> {
    let now = Utc::now();
    let settings = store.get(now)?.settings;
    let ctx = InterpretContext {
        now,
        timezone: settings.timezone.clone(),
        currency: settings.currency.clone(),
    };

    let parsed = match interpreter.interpret(text, &ctx) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "command interpretation failed");
            println!("FocusPilot: Command parsing issue. Please clarify.");
            return Ok(());
        }
    };

    match command::dispatch(store, &parsed, now) {
        Ok(Outcome::Clarification(question)) => println!("FocusPilot: {question}"),
        Ok(Outcome::Created { label, id, .. }) => println!("Created \"{label}\" (id: {id})"),
        Ok(Outcome::Updated { label, id, .. }) => println!("Updated {label} (id: {id})"),
        Ok(Outcome::Answer(text)) => println!("{text}"),
        Err(DispatchError::MissingField { action, field }) => {
            println!("FocusPilot: I still need the {field} to {action}.");
        }
        Err(DispatchError::UnrecognizedCommand(action)) => {
            println!("FocusPilot: I don't know how to \"{action}\" yet.");
        }
        Err(DispatchError::StoreError(e)) => return Err(e.into()),
    }
    Ok(())
}

/// Interactive concierge loop. Ends on "exit", "quit" or EOF.
pub fn handle_chat(store: &mut Store, concierge: &dyn Concierge, user_name: &str) -> Result<(), CliError> {
    let doc = store.get(Utc::now())?;
    let mut session = ChatSession::for_document(&doc);
    let first_name = user_name.split(' ').next().unwrap_or(user_name);
    println!("Operational, {first_name}. FocusPilot Concierge ready for input.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        match concierge.chat(&mut session, line) {
            Ok(reply) => println!("{reply}"),
            Err(e) => {
                tracing::warn!(error = %e, "concierge call failed");
                println!("Uplink failed. Connectivity check required.");
            }
        }
    }
    Ok(())
}

/// Handle the add-task command
pub fn handle_add_task(
    title: String,
    due: Option<String>,
    priority: Option<String>,
    tags: Option<String>,
    notes: Option<String>,
    project: Option<String>,
    store: &mut Store,
) -> Result<(), CliError> {
    let now = Utc::now();
    let due_at = match due {
        Some(due_str) => Some(
            due_str
                .parse::<chrono::DateTime<Utc>>()
                .or_else(|_| {
                    parse_date(&due_str).map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
                })
                .map_err(|e| {
                    CliError::DateParseError(format!("Invalid date format '{}': {}", due_str, e))
                })?,
        ),
        None => None,
    };

    let mut task = Task::new(title, now);
    task.due_at = due_at;
    task.notes = notes;
    task.project = project;
    task.tags = split_tags(tags);
    if let Some(p) = priority {
        task.priority = parse_priority_arg(&p)?;
    }

    let id = task.id.clone();
    store.add_item(Item::Task(task), now)?;
    println!("Task created successfully (id: {id})");
    Ok(())
}

/// Handle the add-bill command
#[allow(clippy::too_many_arguments)]
pub fn handle_add_bill(
    payee: String,
    amount: f64,
    due: String,
    time: Option<String>,
    currency: Option<String>,
    autopay: bool,
    recurrence: Option<String>,
    store: &mut Store,
) -> Result<(), CliError> {
    let now = Utc::now();
    let due_date = parse_date(&due)
        .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", due, e)))?;
    let due_time = match time {
        Some(t) => Some(parse_time(&t).map_err(|e| {
            CliError::DateParseError(format!("Invalid time format '{}': {}", t, e))
        })?),
        None => None,
    };

    let settings = store.get(now)?.settings;
    let mut bill = crate::models::Bill::new(payee, amount, due_date, now);
    bill.due_time = due_time;
    bill.currency = currency.unwrap_or(settings.currency);
    bill.autopay = autopay;
    if let Some(r) = recurrence {
        bill.recurrence = Some(parse_recurrence_arg(&r)?);
    }

    let id = bill.id.clone();
    store.add_item(Item::Bill(bill), now)?;
    println!("Bill created successfully (id: {id})");
    Ok(())
}

/// Handle the add-note command
pub fn handle_add_note(
    content: String,
    tags: Option<String>,
    store: &mut Store,
) -> Result<(), CliError> {
    let now = Utc::now();
    let mut note = crate::models::Note::new(content, now);
    note.tags = split_tags(tags);

    let id = note.id.clone();
    store.add_item(Item::Note(note), now)?;
    println!("Note created successfully (id: {id})");
    Ok(())
}

/// Capture a receipt: read the image, run extraction, store the result with
/// sensible fallbacks. Extraction failures print a retry message.
pub fn handle_receipt(
    image_path: String,
    store: &mut Store,
    extractor: &dyn ReceiptExtractor,
) -> Result<(), CliError> {
    let now = Utc::now();
    let bytes = std::fs::read(&image_path)?;

    let extracted = match extractor.extract_receipt(&bytes) {
        Ok(extracted) => extracted,
        Err(e) => {
            tracing::warn!(error = %e, "receipt extraction failed");
            println!("Failed to process receipt. Please retry.");
            return Ok(());
        }
    };

    let settings = store.get(now)?.settings;
    let mut receipt = Receipt::new(
        extracted
            .vendor_name
            .clone()
            .unwrap_or_else(|| "Unknown Vendor".to_string()),
        extracted
            .date
            .clone()
            .unwrap_or_else(|| now.date_naive().to_string()),
        extracted.total.unwrap_or(0.0),
        now,
    );
    receipt.currency = extracted
        .currency
        .clone()
        .unwrap_or(settings.currency);
    receipt.category = extracted.category.clone();
    receipt.image_path = Some(image_path);
    receipt.extracted = Some(extracted);

    let id = receipt.id.clone();
    let vendor = receipt.vendor_name.clone();
    store.add_item(Item::Receipt(receipt), now)?;
    println!("Receipt from {vendor} captured (id: {id})");
    Ok(())
}

/// List tasks, open ones first.
pub fn handle_tasks(store: &mut Store) -> Result<(), CliError> {
    let doc = store.get(Utc::now())?;
    let mut tasks = doc.tasks;
    tasks.sort_by(|a, b| {
        let a_done = a.status == TaskStatus::Done;
        let b_done = b.status == TaskStatus::Done;
        a_done.cmp(&b_done).then_with(|| a.due_at.cmp(&b.due_at))
    });

    if tasks.is_empty() {
        println!("No tasks yet.");
        return Ok(());
    }
    for task in &tasks {
        let mark = if task.status == TaskStatus::Done { "x" } else { " " };
        let due = task
            .due_at
            .map(|d| d.format(" due %Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("[{mark}] {:?} {}{}  ({})", task.priority, task.title, due, task.id);
    }
    Ok(())
}

/// List bills with the derived status, ordered by due date.
pub fn handle_bills(store: &mut Store) -> Result<(), CliError> {
    let now = Utc::now();
    let doc = store.get(now)?;
    let shown = bills::presented(doc.bills, now);

    if shown.is_empty() {
        println!("No bills yet.");
        return Ok(());
    }
    let total_due: f64 = shown
        .iter()
        .filter(|b| b.status != crate::models::BillStatus::Paid)
        .map(|b| b.amount)
        .sum();
    for bill in &shown {
        let snoozed = if bills::is_snoozed(bill, now) { " (snoozed)" } else { "" };
        println!(
            "{:<10} {} {:.2} {} due {}{}  ({})",
            format!("{:?}", bill.status).to_lowercase(),
            bill.payee,
            bill.amount,
            bill.currency,
            bill.due_date,
            snoozed,
            bill.id
        );
    }
    println!("Total due: {total_due:.2}");
    Ok(())
}

/// List notes, newest first (store order).
pub fn handle_notes(store: &mut Store) -> Result<(), CliError> {
    let doc = store.get(Utc::now())?;
    if doc.notes.is_empty() {
        println!("No notes yet.");
        return Ok(());
    }
    for note in &doc.notes {
        let tags = if note.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", note.tags.join(", "))
        };
        println!("{}{}  ({})", note.content, tags, note.id);
    }
    Ok(())
}

/// Mark a task done.
pub fn handle_complete(id: String, store: &mut Store) -> Result<(), CliError> {
    let now = Utc::now();
    store.update_task(
        &id,
        crate::models::TaskPatch {
            status: Some(TaskStatus::Done),
            completed_at: Some(now),
            ..crate::models::TaskPatch::default()
        },
        now,
    )?;
    println!("Task {id} completed");
    Ok(())
}

/// Mark a bill paid (idempotent).
pub fn handle_pay(id: String, store: &mut Store) -> Result<(), CliError> {
    let now = Utc::now();
    let doc = store.get(now)?;
    if let Some(bill) = doc.bills.iter().find(|b| b.id == id) {
        if let Some(patch) = bills::mark_paid_patch(bill, now) {
            store.update_bill(&id, patch, now)?;
            println!("Bill {id} marked paid");
        } else {
            println!("Bill {id} was already paid");
        }
    } else {
        println!("No bill with id {id}");
    }
    Ok(())
}

/// Snooze a bill for four hours.
pub fn handle_snooze(id: String, store: &mut Store) -> Result<(), CliError> {
    let now = Utc::now();
    store.update_bill(&id, bills::snooze_patch(now), now)?;
    println!("Bill {id} snoozed for {} hours", bills::SNOOZE_HOURS);
    Ok(())
}

/// Delete one item by id.
pub fn handle_delete(collection: String, id: String, store: &mut Store) -> Result<(), CliError> {
    let collection = parse_collection_arg(&collection)?;
    store.delete_item(collection, &id, Utc::now())?;
    println!("Deleted {id}");
    Ok(())
}

/// Print (and record) today's summary.
pub fn handle_summary(store: &mut Store) -> Result<(), CliError> {
    let now = Utc::now();
    let doc = store.get(now)?;
    let daily = crate::summary::build_daily_summary(&doc, now);
    print!("{}", crate::summary::render(&daily));
    store.add_item(Item::Summary(daily), now)?;
    Ok(())
}

/// Run the reminder check once, or keep polling in watch mode. The check is
/// read-only against the store.
pub fn handle_remind(watch: bool, config: &Config, store: &mut Store) -> Result<(), CliError> {
    let mut engine = ReminderEngine::new(config.reminder_throttle_minutes);
    let mut notifier = TerminalNotifier;
    loop {
        let now = Utc::now();
        let doc = store.get(now)?;
        engine.check(&doc, now, &mut notifier);
        if !watch {
            return Ok(());
        }
        std::thread::sleep(std::time::Duration::from_secs(config.reminder_poll_seconds));
    }
}

/// Patch settings from the provided flags.
pub fn handle_settings(
    timezone: Option<String>,
    currency: Option<String>,
    work_start: Option<String>,
    work_end: Option<String>,
    notifications: Option<bool>,
    store: &mut Store,
) -> Result<(), CliError> {
    let now = Utc::now();
    if let Some(t) = &work_start {
        parse_time(t).map_err(|e| {
            CliError::DateParseError(format!("Invalid time format '{}': {}", t, e))
        })?;
    }
    if let Some(t) = &work_end {
        parse_time(t).map_err(|e| {
            CliError::DateParseError(format!("Invalid time format '{}': {}", t, e))
        })?;
    }
    store.update_settings(
        SettingsPatch {
            timezone,
            currency,
            work_hours_start: work_start,
            work_hours_end: work_end,
            notifications_enabled: notifications,
        },
        now,
    )?;
    let settings = store.get(now)?.settings;
    println!(
        "timezone={} currency={} work_hours={}-{} notifications={}",
        settings.timezone,
        settings.currency,
        settings.work_hours_start,
        settings.work_hours_end,
        settings.notifications_enabled
    );
    Ok(())
}

/// Erase the signed-in account's data partition.
pub fn handle_erase(force: bool, store: &mut Store) -> Result<(), CliError> {
    if !force {
        println!("This deletes every task, bill, note and receipt. Re-run with --force to confirm.");
        return Ok(());
    }
    store.delete_partition()?;
    println!("All data erased for this account.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn collection_names_parse() {
        assert_eq!(parse_collection_arg("tasks").unwrap(), Collection::Tasks);
        assert_eq!(parse_collection_arg("Bills").unwrap(), Collection::Bills);
        assert!(parse_collection_arg("summaries").is_err());
        assert!(parse_collection_arg("junk").is_err());
    }

    #[test]
    fn tags_split_and_trim() {
        assert_eq!(
            split_tags(Some("home, errands ,".to_string())),
            vec!["home".to_string(), "errands".to_string()]
        );
        assert!(split_tags(None).is_empty());
    }

    #[test]
    fn add_task_rejects_bad_dates() {
        let db = Database::in_memory().unwrap();
        let mut store = Store::new(&db, "u1");
        let result = handle_add_task(
            "Call bank".to_string(),
            Some("tomorrow".to_string()),
            None,
            None,
            None,
            None,
            &mut store,
        );
        assert!(matches!(result, Err(CliError::DateParseError(_))));
    }

    #[test]
    fn add_bill_inherits_configured_currency() {
        let db = Database::in_memory().unwrap();
        let mut store = Store::new(&db, "u1");
        store.get(Utc::now()).unwrap();
        store
            .update_settings(
                SettingsPatch {
                    currency: Some("GBP".to_string()),
                    ..SettingsPatch::default()
                },
                Utc::now(),
            )
            .unwrap();

        handle_add_bill(
            "Utility Corp".to_string(),
            42.5,
            "2024-01-10".to_string(),
            None,
            None,
            false,
            None,
            &mut store,
        )
        .unwrap();

        let bill = &store.get(Utc::now()).unwrap().bills[0];
        assert_eq!(bill.currency, "GBP");
    }

    #[test]
    fn require_user_refuses_when_signed_out() {
        let db = Database::in_memory().unwrap();
        let auth = Auth::new(&db);
        assert!(matches!(require_user(&auth), Err(CliError::NotLoggedIn)));
    }
}
