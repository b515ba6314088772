//! Deduplication ledger for one database export.
//!
//! Several catalog objects can rewrite to the same final name. The ledger
//! tracks every (schema, final name, type) so that at most one worker
//! materializes it. A key is first claimed, then either marked produced or
//! released again. Produced keys are permanent; a released key can be claimed
//! by the next object that resolves to it.

use crate::source::ObjectType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Membership key. Schema participates and names compare ordinally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub schema: String,
    pub name: String,
    pub object_type: ObjectType,
}

impl LedgerKey {
    pub fn new(schema: &str, name: &str, object_type: ObjectType) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            object_type,
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}].[{}] {}", self.schema, self.name, self.object_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    /// A worker is producing the key.
    Claimed,
    /// Output exists on disk.
    Produced,
}

/// Concurrent map of claimed and produced objects.
#[derive(Debug, Default)]
pub struct Ledger {
    keys: Mutex<HashMap<LedgerKey, KeyState>>,
    settled: Notify,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> std::sync::MutexGuard<'_, HashMap<LedgerKey, KeyState>> {
        // Poisoning is ignored: every update is a single map operation.
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the key has been produced.
    pub fn contains(&self, schema: &str, name: &str, object_type: ObjectType) -> bool {
        self.keys().get(&LedgerKey::new(schema, name, object_type)) == Some(&KeyState::Produced)
    }

    /// Record the key as produced.
    pub fn add(&self, schema: &str, name: &str, object_type: ObjectType) {
        self.keys()
            .insert(LedgerKey::new(schema, name, object_type), KeyState::Produced);
        self.settled.notify_waiters();
    }

    /// Claim the key if nobody holds or produced it. Returns `true` only for
    /// the caller that claimed it.
    pub fn try_claim(&self, schema: &str, name: &str, object_type: ObjectType) -> bool {
        let mut keys = self.keys();
        let key = LedgerKey::new(schema, name, object_type);
        if keys.contains_key(&key) {
            return false;
        }
        keys.insert(key, KeyState::Claimed);
        true
    }

    /// Claim the key, waiting while another caller holds it.
    ///
    /// Returns `false` once the key is produced, `true` when this caller won
    /// it. A caller must settle its claim with [`Ledger::add`] or
    /// [`Ledger::release`] before claiming another key.
    pub async fn claim(&self, schema: &str, name: &str, object_type: ObjectType) -> bool {
        let key = LedgerKey::new(schema, name, object_type);
        loop {
            // Registered before the check so a settle in between is not missed.
            let settled = self.settled.notified();
            {
                let mut keys = self.keys();
                match keys.get(&key).copied() {
                    Some(KeyState::Produced) => return false,
                    Some(KeyState::Claimed) => {}
                    None => {
                        keys.insert(key, KeyState::Claimed);
                        return true;
                    }
                }
            }
            settled.await;
        }
    }

    /// Drop an unfinished claim so another object can produce the key.
    /// Produced keys are left alone.
    pub fn release(&self, schema: &str, name: &str, object_type: ObjectType) {
        let key = LedgerKey::new(schema, name, object_type);
        {
            let mut keys = self.keys();
            if keys.get(&key) == Some(&KeyState::Claimed) {
                keys.remove(&key);
            }
        }
        self.settled.notify_waiters();
    }

    /// Number of claimed or produced keys.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
