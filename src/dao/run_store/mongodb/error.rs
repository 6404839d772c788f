use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures raised by the MongoDB run store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert run for user `{user_id}`")]
    InsertRun {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load run `{id}`")]
    LoadRun {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to finish run `{id}`")]
    FinishRun {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to query recent runs for user `{user_id}`")]
    QueryRecentRuns {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to append event for run `{run_id}`")]
    InsertEvent {
        run_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to bump hourly stats for user `{user_id}`")]
    BumpHourlyStat {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to encode document for collection `{collection}`")]
    EncodeDocument {
        collection: &'static str,
        #[source]
        source: mongodb::bson::error::Error,
    },
}
