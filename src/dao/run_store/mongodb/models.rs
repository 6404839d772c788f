use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{EventEntity, NewEvent, NewRun, RunEntity, RunOutcome};

/// Run row as stored in the `runs` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRunDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    user_id: Uuid,
    battle_kind: String,
    seed: i64,
    started_at: DateTime,
    finished_at: Option<DateTime>,
    #[serde(default)]
    outcome: Option<RunOutcome>,
}

impl MongoRunDocument {
    /// Materialize a new, unfinished run row with a freshly assigned id.
    pub fn from_new(run: NewRun) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: run.user_id,
            battle_kind: run.battle_kind,
            seed: run.seed,
            started_at: DateTime::from_system_time(run.started_at),
            finished_at: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl From<MongoRunDocument> for RunEntity {
    fn from(value: MongoRunDocument) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            battle_kind: value.battle_kind,
            seed: value.seed,
            started_at: value.started_at.to_system_time(),
            finished_at: value.finished_at.map(|at| at.to_system_time()),
            outcome: value.outcome,
        }
    }
}

/// Event row as stored in the `events` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    run_id: Uuid,
    user_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    created_at: DateTime,
}

impl MongoEventDocument {
    /// Materialize an event row with a freshly assigned id.
    pub fn from_new(event: NewEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id: event.run_id,
            user_id: event.user_id,
            event_type: event.event_type,
            payload: event.payload,
            created_at: DateTime::from_system_time(event.created_at),
        }
    }
}

impl From<MongoEventDocument> for EventEntity {
    fn from(value: MongoEventDocument) -> Self {
        Self {
            id: value.id,
            run_id: value.run_id,
            user_id: value.user_id,
            event_type: value.event_type,
            payload: value.payload,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
