use std::{
    collections::HashMap,
    fmt::Write,
    sync::{Arc, Mutex, PoisonError},
};

use {rand::RngCore, tracing::debug};

use crate::{clock::Clock, types::PendingAuthorization};

/// Pending authorizations older than this are unconsumable.
pub const STATE_TTL_MS: u64 = 10 * 60 * 1000;

/// In-memory, single-use CSRF correlation records. Never persisted: a restart
/// invalidates every in-flight authorization.
pub struct PendingStates {
    entries: Mutex<HashMap<String, PendingAuthorization>>,
    clock: Arc<dyn Clock>,
}

impl PendingStates {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn insert(&self, state: String, entry: PendingAuthorization) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state, entry);
    }

    /// Drop every entry past its TTL.
    pub fn sweep(&self) {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !is_expired(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "swept stale oauth states");
        }
    }

    /// Atomic read-and-delete. Unknown, consumed and expired states all yield `None`.
    pub fn consume(&self, state: &str) -> Option<PendingAuthorization> {
        let entry = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state)?;
        if is_expired(&entry, self.clock.now_ms()) {
            return None;
        }
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_expired(entry: &PendingAuthorization, now_ms: u64) -> bool {
    now_ms.saturating_sub(entry.created_at_ms) > STATE_TTL_MS
}

/// 16 random bytes, hex encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
