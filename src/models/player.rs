use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Milliseconds since the Unix epoch, used for join/answer timestamps.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A joined participant. Created on join, removed only by a session reset.
#[derive(Debug)]
pub struct Player {
    pub id: Uuid,
    pub nickname: String,
    /// Join time; ranking ties are broken in favor of the earlier join.
    pub joined_at_ms: u64,
    score: AtomicU32,
}

impl Player {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname: nickname.into(),
            joined_at_ms: unix_millis(),
            score: AtomicU32::new(0),
        }
    }

    pub fn score(&self) -> u32 {
        self.score.load(Ordering::Relaxed)
    }

    /// The score bump and the answer upsert are two independently visible
    /// writes; every correct submission lands its own increment.
    pub fn add_point(&self) {
        let _ = self.score.fetch_add(1, Ordering::Relaxed);
    }
}

/// One recorded answer. At most one per (player, question index); a later
/// submission for the same pair overwrites the earlier one.
#[derive(Debug, Clone)]
pub struct Answer {
    pub player_id: Uuid,
    pub question_index: usize,
    pub choice: usize,
    pub answered_at_ms: u64,
}
