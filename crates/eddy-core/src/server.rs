//! Authoritative server: ordered patch log, versioning, push/pull
//! endpoints, and poke fan-out to connected clients.

use crate::error::{EddyError, Result};
use crate::registry::MutatorRegistry;
use crate::transaction::ServerTransaction;
use eddy_proto::{Cookie, MutationId, Patch, PullRequest, PullResponse, PushRequest};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// A contentless server-to-client notification: "there may be news; pull".
///
/// The in-process client implements this by nudging its own poke channel;
/// a transport adapter substitutes whatever wakes its remote peer.
pub trait Poke: Send + Sync {
    fn poke(&self);
}

#[derive(Default)]
struct ServerInner {
    /// Ordered, append-only patch log. The index-after-last is the
    /// server's version and the cookie handed to clients.
    log: Vec<Patch>,
    /// Newest mutation id incorporated per client, pending acknowledgement
    /// in that client's next pull.
    last_mutation_ids: HashMap<String, MutationId>,
    connections: HashMap<u64, Arc<dyn Poke>>,
    next_connection_id: u64,
}

/// The authoritative peer of the replication protocol.
///
/// Holds the full patch history so a pull with any cookie can be served by
/// merging a suffix of the log. Compaction is future work.
pub struct Server {
    registry: MutatorRegistry,
    inner: Arc<Mutex<ServerInner>>,
}

impl Server {
    #[must_use]
    pub fn new(registry: MutatorRegistry) -> Self {
        Server {
            registry,
            inner: Arc::new(Mutex::new(ServerInner::default())),
        }
    }

    /// Create a server whose log starts with `initial` as patch #0.
    #[must_use]
    pub fn with_initial(registry: MutatorRegistry, initial: Patch) -> Self {
        let server = Server::new(registry);
        server.inner.lock().log.push(initial);
        server
    }

    /// Register a client handle to be poked after every push.
    ///
    /// The returned [`Connection`] removes the handle on
    /// [`disconnect`](Connection::disconnect).
    pub fn connect(&self, handle: Arc<dyn Poke>) -> Connection {
        let mut inner = self.inner.lock();
        let id = inner.next_connection_id;
        inner.next_connection_id += 1;
        inner.connections.insert(id, handle);
        tracing::debug!(connection_id = id, "client connected");
        Connection {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Newest-first scan of the patch log.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let inner = self.inner.lock();
        inner
            .log
            .iter()
            .rev()
            .find_map(|patch| patch.get(key).cloned())
    }

    /// Re-execute the pushed mutations authoritatively and poke every
    /// connected client, the sender included.
    ///
    /// Appending each patch and recording the batch's last mutation id
    /// happen atomically before any poke goes out. An unknown mutator name
    /// anywhere in the batch is a programming error and rejects the whole
    /// push; a mutator-authored failure aborts that single mutation and
    /// the rest of the batch proceeds.
    pub async fn push(&self, request: PushRequest) -> Result<()> {
        let PushRequest {
            client_id,
            mutations,
        } = request;
        let Some(last) = mutations.last() else {
            return Err(EddyError::EmptyPush);
        };
        let last_id = last.id.clone();

        let handles: Vec<Arc<dyn Poke>> = {
            let mut inner = self.inner.lock();

            for mutation in &mutations {
                if !self.registry.contains(&mutation.name) {
                    return Err(EddyError::UnknownMutator(mutation.name.clone()));
                }
            }

            for mutation in &mutations {
                let outcome = {
                    let mut tx = ServerTransaction::new(&inner.log);
                    self.registry
                        .run(&mutation.name, &mut tx, &mutation.args)
                        .map(|()| tx.into_patch())
                };
                match outcome {
                    Ok(patch) => inner.log.push(patch),
                    Err(error) => {
                        tracing::warn!(
                            client_id = %client_id,
                            mutation_id = %mutation.id,
                            mutator = %mutation.name,
                            %error,
                            "mutator failed during push, skipping mutation"
                        );
                    }
                }
            }

            inner.last_mutation_ids.insert(client_id.clone(), last_id);
            tracing::debug!(
                client_id = %client_id,
                version = inner.log.len(),
                "push applied"
            );
            inner.connections.values().cloned().collect()
        };

        // Fire-and-forget: a lost poke only delays the pull that the next
        // one triggers anyway.
        for handle in handles {
            handle.poke();
        }
        Ok(())
    }

    /// Merge everything past the request's cookie into one patch and hand
    /// back the current version.
    ///
    /// The pending acknowledgement for this client is consumed: the server
    /// only needs to ack a mutation to its author once. A cookie ahead of
    /// the version is clamped down, yielding an empty patch.
    pub async fn pull(&self, request: PullRequest) -> PullResponse {
        let mut inner = self.inner.lock();
        let version = inner.log.len() as u64;
        let since = request.cookie.min(Cookie(version));
        let patch = Patch::merged(&inner.log[since.as_index()..]);
        let last_mutation_id = inner.last_mutation_ids.remove(&request.client_id);
        tracing::debug!(
            client_id = %request.client_id,
            cookie = %request.cookie,
            version,
            keys = patch.len(),
            acked = last_mutation_id.is_some(),
            "pull serviced"
        );
        PullResponse {
            cookie: Cookie(version),
            patch,
            last_mutation_id,
        }
    }

    /// The count of patches in the log.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.lock().log.len() as u64
    }

    /// The full merged view of the log.
    #[must_use]
    pub fn snapshot(&self) -> Patch {
        let inner = self.inner.lock();
        Patch::merged(&inner.log)
    }

    /// Number of currently connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.inner.lock().connections.len()
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Server")
            .field("version", &inner.log.len())
            .field("connections", &inner.connections.len())
            .finish()
    }
}

/// Registration of one client's poke handle with a server.
pub struct Connection {
    inner: Weak<Mutex<ServerInner>>,
    id: u64,
}

impl Connection {
    /// Remove the handle from the server's registry.
    ///
    /// Disconnecting an already-removed handle (or one whose server is
    /// gone) is a no-op.
    pub fn disconnect(&self) {
        if let Some(inner) = self.inner.upgrade() {
            if inner.lock().connections.remove(&self.id).is_some() {
                tracing::debug!(connection_id = self.id, "client disconnected");
            }
        }
    }
}
