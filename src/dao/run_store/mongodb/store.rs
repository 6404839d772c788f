use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, DateTime, Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoEventDocument, MongoRunDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    models::{EventEntity, HourlyDelta, NewEvent, NewRun, RunEntity, RunOutcome},
    run_store::RunStore,
    storage::StorageResult,
};

const RUN_COLLECTION_NAME: &str = "runs";
const EVENT_COLLECTION_NAME: &str = "events";
const HOURLY_STAT_COLLECTION_NAME: &str = "hourly_stats";

/// MongoDB-backed [`RunStore`].
///
/// The exactly-once finish guarantee is carried by a single conditional
/// `update_one` whose filter pins `finished_at` to null; MongoDB applies the
/// update atomically per document, so two racing finishes can never both
/// match.
#[derive(Clone)]
pub struct MongoRunStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            super::connection::establish_connection(&self.config.options, &self.config.database_name)
                .await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRunStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            super::connection::establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Covers both the 24h volume count and the latest-run cooldown lookup.
        let runs = database.collection::<Document>(RUN_COLLECTION_NAME);
        let run_index = IndexModel::builder()
            .keys(doc! {"user_id": 1, "started_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("run_user_started_idx".to_owned()))
                    .build(),
            )
            .build();
        runs.create_index(run_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RUN_COLLECTION_NAME,
                index: "user_id,started_at",
                source,
            })?;

        let events = database.collection::<Document>(EVENT_COLLECTION_NAME);
        let event_index = IndexModel::builder()
            .keys(doc! {"run_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("event_run_idx".to_owned()))
                    .build(),
            )
            .build();
        events
            .create_index(event_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: EVENT_COLLECTION_NAME,
                index: "run_id",
                source,
            })?;

        // One bucket per (user, hour); upsert-with-increment keeps it that way.
        let stats = database.collection::<Document>(HOURLY_STAT_COLLECTION_NAME);
        let stat_index = IndexModel::builder()
            .keys(doc! {"user_id": 1, "hour_start": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("stat_user_hour_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        stats
            .create_index(stat_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: HOURLY_STAT_COLLECTION_NAME,
                index: "user_id,hour_start",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn run_collection(&self) -> Collection<MongoRunDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRunDocument>(RUN_COLLECTION_NAME)
    }

    async fn event_collection(&self) -> Collection<MongoEventDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoEventDocument>(EVENT_COLLECTION_NAME)
    }

    async fn stat_collection(&self) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<Document>(HOURLY_STAT_COLLECTION_NAME)
    }

    async fn insert_run(&self, run: NewRun) -> MongoResult<Uuid> {
        let user_id = run.user_id;
        let document = MongoRunDocument::from_new(run);
        let id = document.id();

        self.run_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertRun { user_id, source })?;

        Ok(id)
    }

    async fn find_run(&self, id: Uuid) -> MongoResult<Option<RunEntity>> {
        let document = self
            .run_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRun { id, source })?;

        Ok(document.map(Into::into))
    }

    async fn finish_run(
        &self,
        id: Uuid,
        user_id: Uuid,
        finished_at: SystemTime,
        outcome: RunOutcome,
    ) -> MongoResult<bool> {
        let outcome_bson =
            mongodb::bson::serialize_to_bson(&outcome).map_err(|source| MongoDaoError::EncodeDocument {
                collection: RUN_COLLECTION_NAME,
                source,
            })?;

        // The null pin on finished_at is the whole race guard: of two
        // concurrent finishes, only one update can match the filter.
        let filter = doc! {
            "_id": uuid_as_binary(id),
            "user_id": uuid_as_binary(user_id),
            "finished_at": Bson::Null,
        };
        let update = doc! {
            "$set": {
                "finished_at": DateTime::from_system_time(finished_at),
                "outcome": outcome_bson,
            }
        };

        let result = self
            .run_collection()
            .await
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::FinishRun { id, source })?;

        Ok(result.modified_count > 0)
    }

    async fn count_runs_started_since(
        &self,
        user_id: Uuid,
        since: SystemTime,
    ) -> MongoResult<u64> {
        let filter = doc! {
            "user_id": uuid_as_binary(user_id),
            "started_at": { "$gte": DateTime::from_system_time(since) },
        };

        self.run_collection()
            .await
            .count_documents(filter)
            .await
            .map_err(|source| MongoDaoError::QueryRecentRuns { user_id, source })
    }

    async fn latest_run_started_since(
        &self,
        user_id: Uuid,
        since: SystemTime,
    ) -> MongoResult<Option<RunEntity>> {
        let filter = doc! {
            "user_id": uuid_as_binary(user_id),
            "started_at": { "$gte": DateTime::from_system_time(since) },
        };

        let document = self
            .run_collection()
            .await
            .find_one(filter)
            .sort(doc! {"started_at": -1})
            .await
            .map_err(|source| MongoDaoError::QueryRecentRuns { user_id, source })?;

        Ok(document.map(Into::into))
    }

    async fn insert_event(&self, event: NewEvent) -> MongoResult<EventEntity> {
        let run_id = event.run_id;
        let document = MongoEventDocument::from_new(event);

        self.event_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertEvent { run_id, source })?;

        Ok(document.into())
    }

    async fn bump_hourly_stat(
        &self,
        user_id: Uuid,
        hour_start: i64,
        delta: HourlyDelta,
    ) -> MongoResult<()> {
        let filter = doc! {
            "user_id": uuid_as_binary(user_id),
            "hour_start": hour_start,
        };
        let update = doc! {
            "$inc": {
                "runs": 1_i64,
                "victories": i64::from(delta.victory),
                "total_damage": i64::from(delta.damage),
                "total_duration_seconds": delta.duration_seconds,
                "total_reward": i64::from(delta.reward),
                "total_dps": delta.dps,
            }
        };

        self.stat_collection()
            .await
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::BumpHourlyStat { user_id, source })?;

        Ok(())
    }
}

impl RunStore for MongoRunStore {
    fn insert_run(&self, run: NewRun) -> BoxFuture<'static, StorageResult<Uuid>> {
        let store = self.clone();
        Box::pin(async move { store.insert_run(run).await.map_err(Into::into) })
    }

    fn find_run(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RunEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_run(id).await.map_err(Into::into) })
    }

    fn finish_run(
        &self,
        id: Uuid,
        user_id: Uuid,
        finished_at: SystemTime,
        outcome: RunOutcome,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .finish_run(id, user_id, finished_at, outcome)
                .await
                .map_err(Into::into)
        })
    }

    fn count_runs_started_since(
        &self,
        user_id: Uuid,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .count_runs_started_since(user_id, since)
                .await
                .map_err(Into::into)
        })
    }

    fn latest_run_started_since(
        &self,
        user_id: Uuid,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RunEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .latest_run_started_since(user_id, since)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_event(&self, event: NewEvent) -> BoxFuture<'static, StorageResult<EventEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_event(event).await.map_err(Into::into) })
    }

    fn bump_hourly_stat(
        &self,
        user_id: Uuid,
        hour_start: i64,
        delta: HourlyDelta,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .bump_hourly_stat(user_id, hour_start, delta)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
