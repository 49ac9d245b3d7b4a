//! # MemoryStore
//!
//! A fully concurrent, in-process implementation of the `DocumentStore`
//! port. A single mutex serializes all writes, which gives transactions and
//! batches their all-or-nothing semantics; listeners are notified outside
//! the lock so a change handler may itself issue store calls.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    ChangeHandler, CoreError, Document, DocumentStore, Direction, OrderBy, Predicate, Result,
    Subscription, TransactionBody, TransactionOps, WriteOp,
};
use serde_json::Value;
use tracing::trace;

type Collections = HashMap<String, BTreeMap<String, Document>>;

struct ListenerEntry {
    collection: String,
    predicates: Vec<Predicate>,
    handler: ChangeHandler,
}

pub struct MemoryStore {
    inner: Mutex<Collections>,
    listeners: Arc<DashMap<u64, Arc<ListenerEntry>>>,
    next_listener_id: AtomicU64,
    offline: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Collections::new()),
            listeners: Arc::new(DashMap::new()),
            next_listener_id: AtomicU64::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulates a store outage: while offline, every operation fails with
    /// `StoreUnavailable`. Used by tests exercising fail-closed paths.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn collections(&self) -> Result<MutexGuard<'_, Collections>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::StoreUnavailable("store offline".into()));
        }
        self.inner
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("store poisoned by an earlier panic".into()))
    }

    /// Applies `ops` atomically: everything is staged on a copy first, so a
    /// failing op leaves committed state untouched. Returns the collections
    /// that changed.
    fn apply_ops(cols: &mut Collections, ops: Vec<WriteOp>) -> Result<HashSet<String>> {
        let mut staged = cols.clone();
        let mut touched = HashSet::new();
        for op in ops {
            match op {
                WriteOp::Set { collection, id, doc } => {
                    staged.entry(collection.clone()).or_default().insert(id, doc);
                    touched.insert(collection);
                }
                WriteOp::Update {
                    collection,
                    id,
                    fields,
                } => {
                    let existing = staged
                        .entry(collection.clone())
                        .or_default()
                        .get_mut(&id)
                        .ok_or_else(|| CoreError::not_found("document", &id))?;
                    for (k, v) in fields {
                        existing.insert(k, v);
                    }
                    touched.insert(collection);
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(col) = staged.get_mut(&collection) {
                        if col.remove(&id).is_some() {
                            touched.insert(collection);
                        }
                    }
                }
            }
        }
        *cols = staged;
        Ok(touched)
    }

    /// Snapshots the matching result set for every listener on a touched
    /// collection while the lock is held, then fires handlers after release.
    fn snapshot_notifications(
        &self,
        cols: &Collections,
        touched: &HashSet<String>,
    ) -> Vec<(Arc<ListenerEntry>, Vec<Document>)> {
        self.listeners
            .iter()
            .filter(|entry| touched.contains(&entry.value().collection))
            .map(|entry| {
                let listener = Arc::clone(entry.value());
                let docs = matching_docs(cols, &listener.collection, &listener.predicates, None);
                (listener, docs)
            })
            .collect()
    }

    fn write(&self, op: WriteOp) -> Result<()> {
        self.write_all(vec![op])
    }

    fn write_all(&self, ops: Vec<WriteOp>) -> Result<()> {
        let pending;
        {
            let mut cols = self.collections()?;
            let touched = Self::apply_ops(&mut cols, ops)?;
            pending = self.snapshot_notifications(&cols, &touched);
        }
        for (listener, docs) in pending {
            (listener.handler)(&docs);
        }
        Ok(())
    }
}

fn matches(doc: &Document, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|p| match p {
        Predicate::Eq(field, value) => doc.get(field) == Some(value),
        Predicate::In(field, values) => doc
            .get(field)
            .map(|v| values.contains(v))
            .unwrap_or(false),
    })
}

fn matching_docs(
    cols: &Collections,
    collection: &str,
    predicates: &[Predicate],
    order: Option<&OrderBy>,
) -> Vec<Document> {
    let mut docs: Vec<Document> = cols
        .get(collection)
        .map(|col| {
            col.values()
                .filter(|doc| matches(doc, predicates))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    if let Some(order) = order {
        docs.sort_by(|a, b| {
            let ord = value_cmp(a.get(&order.field), b.get(&order.field));
            match order.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
    }
    docs
}

/// Field comparison for ordering. Timestamps are stored as RFC 3339 strings,
/// so lexicographic order is chronological order.
fn value_cmp(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Less,
        (Some(_), None) => CmpOrdering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

/// Transaction view: committed state overlaid with this transaction's own
/// queued writes.
struct MemTransaction<'a> {
    cols: &'a Collections,
    writes: Vec<WriteOp>,
}

impl TransactionOps for MemTransaction<'_> {
    fn get(&mut self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut current = self
            .cols
            .get(collection)
            .and_then(|col| col.get(id))
            .cloned();
        for op in &self.writes {
            match op {
                WriteOp::Set {
                    collection: c,
                    id: i,
                    doc,
                } if c == collection && i == id => current = Some(doc.clone()),
                WriteOp::Update {
                    collection: c,
                    id: i,
                    fields,
                } if c == collection && i == id => {
                    if let Some(doc) = current.as_mut() {
                        for (k, v) in fields {
                            doc.insert(k.clone(), v.clone());
                        }
                    }
                }
                WriteOp::Delete {
                    collection: c,
                    id: i,
                } if c == collection && i == id => current = None,
                _ => {}
            }
        }
        Ok(current)
    }

    fn set(&mut self, collection: &str, id: &str, doc: Document) {
        self.writes.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            doc,
        });
    }

    fn update(&mut self, collection: &str, id: &str, fields: Document) {
        self.writes.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
    }

    fn delete(&mut self, collection: &str, id: &str) {
        self.writes.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }
}

struct MemorySubscription {
    id: u64,
    listeners: Arc<DashMap<u64, Arc<ListenerEntry>>>,
}

impl Subscription for MemorySubscription {
    fn unsubscribe(&self) {
        self.listeners.remove(&self.id);
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.listeners.remove(&self.id);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let cols = self.collections()?;
        Ok(cols.get(collection).and_then(|col| col.get(id)).cloned())
    }

    async fn query(
        &self,
        collection: &str,
        predicates: &[Predicate],
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        let cols = self.collections()?;
        Ok(matching_docs(&cols, collection, predicates, order))
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<()> {
        trace!(collection, id, "set");
        self.write(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            doc,
        })
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
        trace!(collection, id, "update");
        self.write(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        trace!(collection, id, "delete");
        self.write(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    async fn run_transaction(&self, mut body: TransactionBody<'_>) -> Result<()> {
        let pending;
        {
            let mut cols = self.collections()?;
            let mut tx = MemTransaction {
                cols: &cols,
                writes: Vec::new(),
            };
            body(&mut tx)?;
            let writes = tx.writes;
            let touched = Self::apply_ops(&mut cols, writes)?;
            pending = self.snapshot_notifications(&cols, &touched);
        }
        for (listener, docs) in pending {
            (listener.handler)(&docs);
        }
        Ok(())
    }

    async fn atomic_increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64> {
        let new_value;
        let pending;
        {
            let mut cols = self.collections()?;
            let doc = cols
                .get_mut(collection)
                .and_then(|col| col.get_mut(id))
                .ok_or_else(|| CoreError::not_found("document", id))?;
            let current = match doc.get(field) {
                None => 0,
                Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                    CoreError::Validation(format!("field {field} is not an integer"))
                })?,
                Some(_) => {
                    return Err(CoreError::Validation(format!(
                        "field {field} is not numeric"
                    )))
                }
            };
            new_value = current + delta;
            doc.insert(field.to_string(), Value::from(new_value));
            let mut touched = HashSet::new();
            touched.insert(collection.to_string());
            pending = self.snapshot_notifications(&cols, &touched);
        }
        for (listener, docs) in pending {
            (listener.handler)(&docs);
        }
        Ok(new_value)
    }

    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<()> {
        trace!(ops = ops.len(), "commit_batch");
        self.write_all(ops)
    }

    async fn subscribe(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
        on_change: ChangeHandler,
    ) -> Result<Box<dyn Subscription>> {
        let initial = {
            let cols = self.collections()?;
            matching_docs(&cols, collection, &predicates, None)
        };
        let entry = Arc::new(ListenerEntry {
            collection: collection.to_string(),
            predicates,
            handler: on_change,
        });
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.insert(id, Arc::clone(&entry));
        // Fire once with the current result set so new listeners do not
        // have to issue a separate initial read.
        (entry.handler)(&initial);
        Ok(Box::new(MemorySubscription {
            id,
            listeners: Arc::clone(&self.listeners),
        }))
    }
}
