use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Result, Version};

/// A persisted aggregate: its serialized state plus the metadata needed to
/// find it and to detect concurrent writers.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: AggregateId,

    /// Aggregate type, e.g. `"Cart"` or `"Order"`.
    pub kind: String,

    /// User the document belongs to, used for per-user listings.
    pub owner: Option<UserId>,

    /// Version this document is written at (or was read at).
    pub version: Version,

    pub updated_at: DateTime<Utc>,

    pub state: serde_json::Value,
}

impl Document {
    /// Serializes an aggregate into a document at the given version.
    pub fn from_state<T: Serialize>(
        id: AggregateId,
        kind: impl Into<String>,
        owner: Option<UserId>,
        version: Version,
        state: &T,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self {
            id,
            kind: kind.into(),
            owner,
            version,
            updated_at: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(self.state.clone())
    }
}

/// Options for saving a document.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Version the caller read before mutating. `None` skips the check.
    pub expected_version: Option<Version>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the document not to exist yet.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

/// Storage for whole-aggregate documents with optimistic concurrency.
///
/// Implementations must make the version check and the write a single atomic
/// step: two writers that read the same version cannot both succeed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads the current document, or `None` if it was never saved.
    async fn load(&self, kind: &str, id: AggregateId) -> Result<Option<Document>>;

    /// Writes the document at `document.version`.
    ///
    /// Fails with `ConcurrencyConflict` if `options.expected_version` is set and
    /// does not match the stored version. Returns the version written.
    async fn save(&self, document: Document, options: SaveOptions) -> Result<Version>;

    /// Lists documents of a kind owned by a user, most recently updated first.
    async fn list_by_owner(&self, kind: &str, owner: UserId) -> Result<Vec<Document>>;

    /// Lists every document of a kind, most recently updated first.
    async fn list(&self, kind: &str) -> Result<Vec<Document>>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn load(&self, kind: &str, id: AggregateId) -> Result<Option<Document>> {
        (**self).load(kind, id).await
    }

    async fn save(&self, document: Document, options: SaveOptions) -> Result<Version> {
        (**self).save(document, options).await
    }

    async fn list_by_owner(&self, kind: &str, owner: UserId) -> Result<Vec<Document>> {
        (**self).list_by_owner(kind, owner).await
    }

    async fn list(&self, kind: &str) -> Result<Vec<Document>> {
        (**self).list(kind).await
    }
}
