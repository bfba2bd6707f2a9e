//! Transactional read/write interface that mutators run against.
//!
//! Both peers execute the same mutator functions, but over different
//! backing state: the client over its database snapshot, the server over
//! its patch log. Each transaction accumulates writes into a fresh
//! [`Patch`] buffer; reads see the buffer first, so a mutator observes its
//! own writes.

use eddy_proto::{MutationId, Patch};
use serde_json::Value;
use std::collections::HashMap;

/// The interface mutators are written against.
///
/// Deletions are intentionally not exposed.
pub trait Transaction {
    /// Read the effective value for `key`: this transaction's own write if
    /// present, otherwise the backing state.
    fn get(&self, key: &str) -> Option<Value>;

    /// Record a write.
    fn set(&mut self, key: &str, value: Value);
}

/// A transaction over a client's database snapshot.
///
/// Generates a fresh [`MutationId`] at construction.
pub struct ClientTransaction<'a> {
    db: &'a HashMap<String, Value>,
    patch: Patch,
    id: MutationId,
}

impl<'a> ClientTransaction<'a> {
    #[must_use]
    pub fn new(db: &'a HashMap<String, Value>) -> Self {
        ClientTransaction {
            db,
            patch: Patch::new(),
            id: MutationId::generate(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &MutationId {
        &self.id
    }

    /// Consume the transaction, yielding its id and accumulated patch.
    #[must_use]
    pub fn into_parts(self) -> (MutationId, Patch) {
        (self.id, self.patch)
    }

    /// Consume the transaction, yielding only the accumulated patch.
    #[must_use]
    pub fn into_patch(self) -> Patch {
        self.patch
    }
}

impl Transaction for ClientTransaction<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        self.patch
            .get(key)
            .cloned()
            .or_else(|| self.db.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) {
        self.patch.set(key, value);
    }
}

/// A transaction over the server's patch log.
///
/// Reads scan the log newest-first; the accumulated patch is appended to
/// the log in one atomic step by the server once the mutator returns.
pub struct ServerTransaction<'a> {
    log: &'a [Patch],
    patch: Patch,
}

impl<'a> ServerTransaction<'a> {
    #[must_use]
    pub fn new(log: &'a [Patch]) -> Self {
        ServerTransaction {
            log,
            patch: Patch::new(),
        }
    }

    #[must_use]
    pub fn into_patch(self) -> Patch {
        self.patch
    }
}

impl Transaction for ServerTransaction<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        self.patch.get(key).cloned().or_else(|| {
            self.log
                .iter()
                .rev()
                .find_map(|patch| patch.get(key).cloned())
        })
    }

    fn set(&mut self, key: &str, value: Value) {
        self.patch.set(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_transaction_reads_snapshot() {
        let mut db = HashMap::new();
        db.insert("value".to_string(), json!(5));
        let tx = ClientTransaction::new(&db);
        assert_eq!(tx.get("value"), Some(json!(5)));
        assert_eq!(tx.get("missing"), None);
    }

    #[test]
    fn test_client_transaction_sees_own_writes() {
        let mut db = HashMap::new();
        db.insert("value".to_string(), json!(5));
        let mut tx = ClientTransaction::new(&db);
        tx.set("value", json!(6));
        assert_eq!(tx.get("value"), Some(json!(6)));

        let (_, patch) = tx.into_parts();
        assert_eq!(patch.get("value"), Some(&json!(6)));
        // The snapshot itself is untouched.
        assert_eq!(db["value"], json!(5));
    }

    #[test]
    fn test_client_transaction_fresh_ids() {
        let db = HashMap::new();
        let a = ClientTransaction::new(&db);
        let b = ClientTransaction::new(&db);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_server_transaction_scans_newest_first() {
        let log = vec![
            Patch::new().with("value", json!(1)).with("old", json!(true)),
            Patch::new().with("value", json!(2)),
        ];
        let tx = ServerTransaction::new(&log);
        assert_eq!(tx.get("value"), Some(json!(2)));
        assert_eq!(tx.get("old"), Some(json!(true)));
        assert_eq!(tx.get("missing"), None);
    }

    #[test]
    fn test_server_transaction_buffer_shadows_log() {
        let log = vec![Patch::new().with("value", json!(1))];
        let mut tx = ServerTransaction::new(&log);
        tx.set("value", json!(10));
        assert_eq!(tx.get("value"), Some(json!(10)));
        assert_eq!(tx.into_patch().get("value"), Some(&json!(10)));
    }
}
