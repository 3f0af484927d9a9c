use std::ops::Deref;

use weft_types::{PerformerId, PerformerRecord, StashId, TagId};

use crate::slot::Slot;

/// A performer row plus its lazily loaded relationships.
///
/// Shared read-only (behind an `Arc`) by every field resolution of a request;
/// the slots are the only interior state and each is filled at most once.
#[derive(Debug)]
pub struct Performer {
    record: PerformerRecord,
    aliases: Slot<Vec<String>>,
    tag_ids: Slot<Vec<TagId>>,
    stash_ids: Slot<Vec<StashId>>,
}

impl Performer {
    pub fn new(record: PerformerRecord) -> Self {
        Self {
            record,
            aliases: Slot::new("performer.aliases"),
            tag_ids: Slot::new("performer.tag_ids"),
            stash_ids: Slot::new("performer.stash_ids"),
        }
    }

    pub fn id(&self) -> PerformerId {
        self.record.id
    }

    pub fn record(&self) -> &PerformerRecord {
        &self.record
    }

    pub fn aliases(&self) -> &Slot<Vec<String>> {
        &self.aliases
    }

    pub fn tag_ids(&self) -> &Slot<Vec<TagId>> {
        &self.tag_ids
    }

    pub fn stash_ids(&self) -> &Slot<Vec<StashId>> {
        &self.stash_ids
    }
}

impl Deref for Performer {
    type Target = PerformerRecord;

    fn deref(&self) -> &PerformerRecord {
        &self.record
    }
}

impl From<PerformerRecord> for Performer {
    fn from(record: PerformerRecord) -> Self {
        Self::new(record)
    }
}
