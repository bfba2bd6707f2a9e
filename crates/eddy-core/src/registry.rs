//! Named deterministic mutators shared by client and server.
//!
//! The registry is the sole open extension point of the engine: it maps
//! names to function values that read and write through a [`Transaction`].
//! The same registry (or an identically-populated one) must be installed on
//! both peers, since the server re-executes every pushed mutation and the
//! client re-executes pending mutations during rebase.

use crate::error::{EddyError, Result};
use crate::transaction::Transaction;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A mutator: a deterministic function over a transaction and arguments.
///
/// Mutators must not close over external mutable state, perform I/O, or
/// consult wall-clock time or randomness; the engine re-executes them
/// during rebase and on the server, and divergent outcomes break
/// convergence. Not enforced.
pub type MutatorFn = dyn Fn(&mut dyn Transaction, &[Value]) -> Result<()> + Send + Sync;

/// Registry of named mutators.
#[derive(Clone, Default)]
pub struct MutatorRegistry {
    mutators: HashMap<String, Arc<MutatorFn>>,
}

impl MutatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mutator under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: &str, mutator: F)
    where
        F: Fn(&mut dyn Transaction, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.mutators.insert(name.to_string(), Arc::new(mutator));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<MutatorFn>> {
        self.mutators.get(name).cloned()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.mutators.contains_key(name)
    }

    /// Names of all registered mutators.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.mutators.keys().cloned().collect()
    }

    /// Look up `name` and run it against `tx`.
    ///
    /// An unregistered name is a programming error.
    pub fn run(&self, name: &str, tx: &mut dyn Transaction, args: &[Value]) -> Result<()> {
        let mutator = self
            .get(name)
            .ok_or_else(|| EddyError::UnknownMutator(name.to_string()))?;
        mutator(tx, args)
    }
}

impl fmt::Debug for MutatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutatorRegistry")
            .field("mutators", &self.mutators.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::ServerTransaction;
    use serde_json::json;

    #[test]
    fn test_register_and_run() {
        let mut registry = MutatorRegistry::new();
        registry.register("mark", |tx, _args| {
            tx.set("marked", json!(true));
            Ok(())
        });
        assert!(registry.contains("mark"));

        let log = vec![];
        let mut tx = ServerTransaction::new(&log);
        registry.run("mark", &mut tx, &[]).unwrap();
        assert_eq!(tx.into_patch().get("marked"), Some(&json!(true)));
    }

    #[test]
    fn test_unknown_name_is_error() {
        let registry = MutatorRegistry::new();
        let log = vec![];
        let mut tx = ServerTransaction::new(&log);
        let err = registry.run("missing", &mut tx, &[]).unwrap_err();
        assert!(matches!(err, EddyError::UnknownMutator(name) if name == "missing"));
    }

    #[test]
    fn test_mutator_error_propagates() {
        let mut registry = MutatorRegistry::new();
        registry.register("boom", |_tx, _args| Err(EddyError::mutator("boom")));
        let log = vec![];
        let mut tx = ServerTransaction::new(&log);
        assert!(registry.run("boom", &mut tx, &[]).is_err());
    }

    #[test]
    fn test_clone_shares_mutators() {
        let mut registry = MutatorRegistry::new();
        registry.register("noop", |_tx, _args| Ok(()));
        let cloned = registry.clone();
        assert!(cloned.contains("noop"));
        assert_eq!(cloned.names(), vec!["noop".to_string()]);
    }
}
