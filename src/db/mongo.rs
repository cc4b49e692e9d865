//! Typed MongoDB access for the game collections
//!
//! Every collection is opened through `MongoClient::collection`, which applies
//! the schema's indexes first. Reads skip soft-deleted documents.

use bson::{doc, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::{ClientOptions, FindOptions, IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::db::schemas::Metadata;
use crate::types::GameError;

const SERVER_TIMEOUT: Duration = Duration::from_secs(3);

/// Schemas declaring the indexes their collection needs
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Schemas carrying a `Metadata` block stamped on write
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Bounds shared by every stored document type
pub trait GameDocument:
    Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata
{
}

impl<T> GameDocument for T where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata
{
}

#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping `db_name`, failing fast when the server is unreachable
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, GameError> {
        info!("Connecting to MongoDB at {}", uri);

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| GameError::Config(format!("Invalid MongoDB URI: {}", e)))?;
        options.server_selection_timeout = Some(SERVER_TIMEOUT);
        options.connect_timeout = Some(SERVER_TIMEOUT);
        options.app_name.get_or_insert_with(|| "tapforge".to_string());

        let client = Client::with_options(options).map_err(|e| {
            GameError::Database(format!("Failed to create MongoDB client: {}", e))
        })?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| GameError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("MongoDB database '{}' reachable", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Open a typed collection with its indexes in place
    pub async fn collection<T: GameDocument>(
        &self,
        name: &str,
    ) -> Result<MongoCollection<T>, GameError> {
        let collection = MongoCollection {
            inner: self.client.database(&self.db_name).collection::<T>(name),
        };
        collection.ensure_indexes(name).await?;
        Ok(collection)
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Send + Sync,
{
    inner: Collection<T>,
}

/// Restrict `filter` to documents that are not soft-deleted
fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

impl<T: GameDocument> MongoCollection<T> {
    async fn ensure_indexes(&self, name: &str) -> Result<(), GameError> {
        let models: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, options)| IndexModel::builder().keys(keys).options(options).build())
            .collect();

        if models.is_empty() {
            return Ok(());
        }

        let count = models.len();
        self.inner.create_indexes(models).await.map_err(|e| {
            GameError::Database(format!("Index creation on '{}' failed: {}", name, e))
        })?;

        debug!(collection = %name, indexes = count, "Indexes ensured");
        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, GameError> {
        Ok(self.inner.find_one(live(filter)).await?)
    }

    /// All live documents matching `filter`, with optional sort and limit
    pub async fn find_many(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, GameError> {
        let cursor = self.inner.find(live(filter)).with_options(options).await?;
        let docs: Vec<T> = cursor.try_collect().await?;
        Ok(docs)
    }

    /// Write the whole document, inserting it when nothing matches `filter`
    pub async fn replace_or_insert(&self, filter: Document, mut item: T) -> Result<(), GameError> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at.get_or_insert(now);
        metadata.updated_at = Some(now);

        self.inner.replace_one(filter, item).upsert(true).await?;
        Ok(())
    }

    /// Apply an update operator document, creating the document from `filter` if absent
    pub async fn upsert_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, GameError> {
        Ok(self
            .inner
            .update_one(filter, update.into())
            .upsert(true)
            .await?)
    }
}
