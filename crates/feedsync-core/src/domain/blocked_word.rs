//! Blocked word domain entity

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Namespace for blocked word ids
const BLOCKED_WORD_NAMESPACE: Uuid = Uuid::from_u128(0x9c3e_5a7d_2b41_4f0e_8d6a_1f23_4b5c_6d7e);

/// Returns the deterministic id of a blocked word
///
/// The content is trimmed and lowercased before hashing, so the same word
/// typed on two devices always maps to the same entity.
pub fn name_based_uuid(content: &str) -> Uuid {
    Uuid::new_v5(
        &BLOCKED_WORD_NAMESPACE,
        content.trim().to_lowercase().as_bytes(),
    )
}

/// A word that hides matching posts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedWord {
    pub id: String,
    pub content: String,
    pub is_deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl BlockedWord {
    pub fn new(content: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        let content = content.into();
        Self {
            id: name_based_uuid(&content).to_string(),
            content,
            is_deleted: false,
            updated_at,
        }
    }
}
