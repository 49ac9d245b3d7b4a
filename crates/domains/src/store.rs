//! # Document Store Port
//!
//! Contract for the networked document database the core issues operations
//! against. Adapters own the wire protocol; the core only sees logical
//! collections of JSON documents plus the atomic primitives it needs for
//! multi-step invariants (transactions, increments, batched writes).

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CoreError, Result};

/// A raw document as stored: a JSON object keyed by camelCase field names.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A field-level query predicate. Predicates combine conjunctively.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals value.
    Eq(String, serde_json::Value),
    /// Field equals any of the listed values.
    In(String, Vec<serde_json::Value>),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Predicate::Eq(field.into(), value.into())
    }

    pub fn any_of(
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<serde_json::Value>>,
    ) -> Self {
        Predicate::In(field.into(), values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Server-side ordering request for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// A single write in a batch or transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace the whole document (creating it if absent).
    Set {
        collection: String,
        id: String,
        doc: Document,
    },
    /// Merge fields into an existing document; fails if it does not exist.
    Update {
        collection: String,
        id: String,
        fields: Document,
    },
    /// Remove the document; removing an absent document is a no-op.
    Delete { collection: String, id: String },
}

/// Operations available inside a transaction body.
///
/// Reads observe committed state overlaid with the transaction's own queued
/// writes. Nothing is applied unless the body returns `Ok`.
pub trait TransactionOps {
    fn get(&mut self, collection: &str, id: &str) -> Result<Option<Document>>;
    fn set(&mut self, collection: &str, id: &str, doc: Document);
    fn update(&mut self, collection: &str, id: &str, fields: Document);
    fn delete(&mut self, collection: &str, id: &str);
}

/// A transaction body. Returning an error aborts the transaction with no
/// writes applied; the error is surfaced to the caller unchanged.
pub type TransactionBody<'a> = Box<dyn FnMut(&mut dyn TransactionOps) -> Result<()> + Send + 'a>;

/// Callback invoked with the full matching result set whenever a watched
/// collection changes.
pub type ChangeHandler = Box<dyn Fn(&[Document]) + Send + Sync>;

/// Handle to a live query. Dropping the handle must also detach it; an
/// explicit [`Subscription::unsubscribe`] makes the detach point visible
/// at the call site.
pub trait Subscription: Send {
    fn unsubscribe(&self);
}

/// Data persistence contract for users, posts, comments, and reports.
///
/// Operations against the same entity are serialized by the store's own
/// atomic primitives; callers never rely on client-side locking, since
/// multiple app instances may act on the same documents concurrently.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    async fn query(
        &self,
        collection: &str,
        predicates: &[Predicate],
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>>;

    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<()>;

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Runs `body` as a single atomic read-modify-write unit.
    async fn run_transaction(&self, body: TransactionBody<'_>) -> Result<()>;

    /// Server-side numeric increment; returns the new field value.
    async fn atomic_increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64>;

    /// Applies all writes or none of them.
    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<()>;

    /// Registers a live query over `collection`; `on_change` fires with the
    /// current matching set after every committed change to it.
    async fn subscribe(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
        on_change: ChangeHandler,
    ) -> Result<Box<dyn Subscription>>;
}

/// Decodes a raw document into a typed entity at the store boundary.
///
/// The core never hands untyped maps to its callers; a schema mismatch is a
/// `Validation` failure here, once, instead of a panic somewhere downstream.
pub fn decode<T: DeserializeOwned>(doc: Document) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(doc))
        .map_err(|e| CoreError::Validation(format!("malformed document: {e}")))
}

/// Encodes a typed entity into its persisted document shape.
pub fn encode<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(CoreError::Validation(format!(
            "entity did not encode to a document: {other}"
        ))),
        Err(e) => Err(CoreError::Validation(format!("encode failed: {e}"))),
    }
}

/// Builds a partial-update document from field/value pairs.
pub fn fields(pairs: impl IntoIterator<Item = (&'static str, serde_json::Value)>) -> Document {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
