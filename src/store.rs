use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::database::{Database, DatabaseError};
use crate::models::{
    Bill, BillPatch, CalendarEvent, DailySummary, Document, Note, NotePatch, Receipt, Settings,
    Task, TaskPatch,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Failed to serialize document: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// The six item collections of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Tasks,
    Bills,
    Events,
    Notes,
    Receipts,
    Summaries,
}

/// A storable item, tagged with the collection it belongs to.
#[derive(Debug, Clone)]
pub enum Item {
    Task(Task),
    Bill(Bill),
    Event(CalendarEvent),
    Note(Note),
    Receipt(Receipt),
    Summary(DailySummary),
}

/// Partial update for the settings singleton. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub timezone: Option<String>,
    pub work_hours_start: Option<String>,
    pub work_hours_end: Option<String>,
    pub notifications_enabled: Option<bool>,
    pub currency: Option<String>,
}

impl Settings {
    /// Merge a patch over these settings.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(timezone) = patch.timezone {
            self.timezone = timezone;
        }
        if let Some(start) = patch.work_hours_start {
            self.work_hours_start = start;
        }
        if let Some(end) = patch.work_hours_end {
            self.work_hours_end = end;
        }
        if let Some(enabled) = patch.notifications_enabled {
            self.notifications_enabled = enabled;
        }
        if let Some(currency) = patch.currency {
            self.currency = currency;
        }
    }
}

/// Document store over one user partition.
///
/// The partition key is explicit: callers construct a `Store` per user, and
/// nothing here consults any ambient "current user". Every mutation is a
/// read-modify-write of the whole document followed by a single replace of
/// the stored blob, so each write costs O(document size). Nothing needs
/// finer granularity at this scale.
pub struct Store<'a> {
    db: &'a Database,
    partition: String,
    /// Last document successfully loaded or written. Served as a fallback
    /// when the stored blob fails to parse, so one bad write cannot reset a
    /// partition to empty.
    last_good: Option<Document>,
}

impl<'a> Store<'a> {
    pub fn new(db: &'a Database, partition: impl Into<String>) -> Self {
        Self {
            db,
            partition: partition.into(),
            last_good: None,
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Get the full current document for this partition.
    ///
    /// A first access creates, seeds and persists a fresh default document.
    /// A blob that fails to parse yields the last-known-good copy instead of
    /// an empty default.
    pub fn get(&mut self, now: DateTime<Utc>) -> Result<Document, StoreError> {
        match self.db.load_document(&self.partition)? {
            Some(body) => match serde_json::from_str::<Document>(&body) {
                Ok(doc) => {
                    self.last_good = Some(doc.clone());
                    Ok(doc)
                }
                Err(e) => {
                    warn!(partition = %self.partition, error = %e, "stored document failed to parse, serving last-known-good");
                    Ok(self.last_good.clone().unwrap_or_default())
                }
            },
            None => {
                let doc = seed_document(now);
                self.persist(&doc)?;
                Ok(doc)
            }
        }
    }

    /// Insert an item at the front of its collection (most-recent-first).
    pub fn add_item(&mut self, item: Item, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut doc = self.get(now)?;
        match item {
            Item::Task(task) => doc.tasks.insert(0, task),
            Item::Bill(bill) => doc.bills.insert(0, bill),
            Item::Event(event) => doc.events.insert(0, event),
            Item::Note(note) => doc.notes.insert(0, note),
            Item::Receipt(receipt) => doc.receipts.insert(0, receipt),
            Item::Summary(summary) => doc.summaries.insert(0, summary),
        }
        self.persist(&doc)
    }

    /// Patch a task by id. A missing id is a silent no-op.
    pub fn update_task(
        &mut self,
        id: &str,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut doc = self.get(now)?;
        match doc.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.apply(patch, now);
                self.persist(&doc)
            }
            None => Ok(()),
        }
    }

    /// Patch a bill by id. A missing id is a silent no-op.
    pub fn update_bill(
        &mut self,
        id: &str,
        patch: BillPatch,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut doc = self.get(now)?;
        match doc.bills.iter_mut().find(|b| b.id == id) {
            Some(bill) => {
                bill.apply(patch, now);
                self.persist(&doc)
            }
            None => Ok(()),
        }
    }

    /// Patch a note by id. A missing id is a silent no-op.
    pub fn update_note(
        &mut self,
        id: &str,
        patch: NotePatch,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut doc = self.get(now)?;
        match doc.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.apply(patch, now);
                self.persist(&doc)
            }
            None => Ok(()),
        }
    }

    /// Remove the item with the given id from a collection. No-op if absent.
    pub fn delete_item(
        &mut self,
        collection: Collection,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut doc = self.get(now)?;
        match collection {
            Collection::Tasks => doc.tasks.retain(|t| t.id != id),
            Collection::Bills => doc.bills.retain(|b| b.id != id),
            Collection::Events => doc.events.retain(|e| e.id != id),
            Collection::Notes => doc.notes.retain(|n| n.id != id),
            Collection::Receipts => doc.receipts.retain(|r| r.id != id),
            // Summaries carry no item id; they are keyed by date and never
            // deleted individually.
            Collection::Summaries => {}
        }
        self.persist(&doc)
    }

    /// Merge a patch into the settings singleton.
    pub fn update_settings(
        &mut self,
        patch: SettingsPatch,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut doc = self.get(now)?;
        doc.settings.apply(patch);
        self.persist(&doc)
    }

    /// Drop this partition's document entirely (account deletion).
    pub fn delete_partition(&mut self) -> Result<(), StoreError> {
        self.db.delete_document(&self.partition)?;
        self.last_good = None;
        Ok(())
    }

    fn persist(&mut self, doc: &Document) -> Result<(), StoreError> {
        let body = serde_json::to_string(doc)?;
        self.db.save_document(&self.partition, &body)?;
        self.last_good = Some(doc.clone());
        debug!(partition = %self.partition, bytes = body.len(), "document persisted");
        Ok(())
    }
}

/// Fresh default document for a new partition, seeded with one onboarding
/// task the way first login always has been.
fn seed_document(now: DateTime<Utc>) -> Document {
    let mut doc = Document::default();
    let mut task = Task::new("Explore FocusPilot features".to_string(), now);
    task.tags = vec!["onboarding".to_string()];
    doc.tasks.push(task);
    doc
}
