//! Conversation memory shared by orchestrators.
//!
//! Every prompt and response that crosses a target boundary is appended here,
//! so a run can be replayed and audited after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub conversation_id: Uuid,

    /// Who produced the content: `user`, `assistant`, or `attack_setup`.
    pub role: String,

    pub content: String,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    pub timestamp: DateTime<Utc>,
}

/// Append-only store of [`MemoryEntry`] records.
///
/// The lock is held only for the append or the snapshot copy, never across an
/// await point, so orchestrators can record from concurrent tasks.
#[derive(Default)]
pub struct AttackMemory {
    entries: Mutex<Vec<MemoryEntry>>,
}

impl AttackMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        conversation_id: Uuid,
        role: &str,
        content: &str,
        labels: HashMap<String, String>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let entry = MemoryEntry {
            id,
            conversation_id,
            role: role.to_string(),
            content: content.to_string(),
            labels,
            timestamp: Utc::now(),
        };
        self.entries.lock().expect("memory poisoned").push(entry);
        id
    }

    /// A snapshot of everything recorded so far, in insertion order.
    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.entries.lock().expect("memory poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let memory = AttackMemory::new();
        let conversation = Uuid::new_v4();
        memory.record(conversation, "user", "hello", HashMap::new());
        memory.record(conversation, "assistant", "hi", HashMap::new());

        let entries = memory.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, "user");
        assert_eq!(entries[1].role, "assistant");
        assert_eq!(entries[0].conversation_id, entries[1].conversation_id);
        assert_ne!(entries[0].id, entries[1].id);
    }
}
