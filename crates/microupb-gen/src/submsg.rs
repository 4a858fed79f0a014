//! Per-message submessage index table.
//!
//! Each message's layout record carries a deduplicated array of the
//! submessage layouts its fields reference; field records index into it.
//! Entries are ordered by the referenced message's full name, so the index
//! assignment is stable across runs.

use indexmap::IndexMap;

use microupb_core::{Field, MessageId, Pool};

use crate::names::sorted_submessages;

#[derive(Debug)]
pub struct SubmsgArray {
    indexes: IndexMap<MessageId, usize>,
}

impl SubmsgArray {
    pub fn new(pool: &Pool, id: MessageId) -> SubmsgArray {
        let msg = pool.message(id);
        let mut indexes = IndexMap::new();
        for field in sorted_submessages(pool, msg) {
            if let Some(target) = field.message_type {
                let next = indexes.len();
                indexes.entry(target).or_insert(next);
            }
        }
        SubmsgArray { indexes }
    }

    /// The deduplicated targets in index order.
    pub fn submsgs(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.indexes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Index of the layout a message-typed field references.
    ///
    /// # Panics
    /// Panics if the field is not message-typed or belongs to another
    /// message.
    pub fn index_of(&self, field: &Field) -> usize {
        let target = field
            .message_type
            .expect("submsg index requested for a non-message field");
        self.indexes[&target]
    }
}
