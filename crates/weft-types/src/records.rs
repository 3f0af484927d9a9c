use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{MovieId, PerformerId, SceneId, TagId};

/// Base attributes of a performer, exactly as stored in its own row.
///
/// Relationship data (aliases, tags, external ids) is not part of the row;
/// it lives in association slots on the resolved entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformerRecord {
    pub id: PerformerId,
    pub name: String,
    pub disambiguation: Option<String>,
    pub height_cm: Option<i32>,
    pub birthdate: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    /// Rating on the 0..=100 scale.
    pub rating100: Option<i32>,
    pub favorite: bool,
    /// Last modification time, unix seconds.
    pub updated_at: i64,
}

impl PerformerRecord {
    pub fn new(id: PerformerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            disambiguation: None,
            height_cm: None,
            birthdate: None,
            death_date: None,
            rating100: None,
            favorite: false,
            updated_at: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// A performer's identity in an external metadata source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashId {
    pub endpoint: String,
    pub stash_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub name: String,
}
