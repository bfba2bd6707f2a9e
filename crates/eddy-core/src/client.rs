//! Client replica: local database, optimistic mutation queue, watcher
//! registry, and the pull/rebase logic at the heart of the protocol.

use crate::error::Result;
use crate::registry::MutatorRegistry;
use crate::server::{Connection, Poke, Server};
use crate::transaction::ClientTransaction;
use crate::watch::{WatchHandle, WatcherRegistry};
use eddy_proto::{Cookie, Mutation, MutationId, Patch, PullRequest, PullResponse, PushRequest};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A pending mutation with its latest recomputed patch.
struct OptimisticRecord {
    id: MutationId,
    name: String,
    args: Vec<Value>,
    patch: Patch,
}

struct ClientState {
    /// Most recent authoritative state known to this client.
    db: HashMap<String, Value>,
    /// Unacknowledged mutations in invocation order. Rebase needs stable
    /// insertion order and position-based discard, so an ordered sequence
    /// rather than a map.
    pending: Vec<OptimisticRecord>,
    /// `None` until the initial pull returns.
    cookie: Option<Cookie>,
    /// A poke arrived while the cookie was still unset; re-pull as soon as
    /// the initial pull lands.
    pull_queued: bool,
}

/// The in-process poke handle registered with the server.
struct ChannelPoke(mpsc::UnboundedSender<()>);

impl Poke for ChannelPoke {
    fn poke(&self) {
        let _ = self.0.send(());
    }
}

/// A client replica of the key-value database.
///
/// Mutations apply optimistically against the local state, push to the
/// server for authoritative re-execution, and converge once the poked
/// pull acknowledges them.
pub struct Client {
    id: String,
    registry: MutatorRegistry,
    server: Arc<Server>,
    state: Mutex<ClientState>,
    watchers: Arc<Mutex<WatcherRegistry>>,
    poke_tx: mpsc::UnboundedSender<()>,
    connection: Connection,
}

impl Client {
    /// Connect with a generated client id.
    ///
    /// Must be called within a tokio runtime: the poke listener and the
    /// initial pull run on spawned tasks.
    #[must_use]
    pub fn connect(server: Arc<Server>, registry: MutatorRegistry) -> Arc<Client> {
        Self::connect_with_id(server, registry, uuid::Uuid::new_v4().to_string())
    }

    /// Connect under a caller-supplied client id.
    #[must_use]
    pub fn connect_with_id(
        server: Arc<Server>,
        registry: MutatorRegistry,
        id: impl Into<String>,
    ) -> Arc<Client> {
        let id = id.into();
        let (poke_tx, poke_rx) = mpsc::unbounded_channel();
        let connection = server.connect(Arc::new(ChannelPoke(poke_tx.clone())));

        let client = Arc::new(Client {
            id,
            registry,
            server,
            state: Mutex::new(ClientState {
                db: HashMap::new(),
                pending: Vec::new(),
                cookie: None,
                pull_queued: false,
            }),
            watchers: Arc::new(Mutex::new(WatcherRegistry::default())),
            poke_tx,
            connection,
        });

        client.spawn_poke_listener(poke_rx);
        client.spawn_initial_pull();
        client
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The cookie of the last successful pull; `None` until the initial
    /// pull returns.
    #[must_use]
    pub fn cookie(&self) -> Option<Cookie> {
        self.state.lock().cookie
    }

    /// Number of mutations not yet acknowledged by the server.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// The effective value for `key`: the newest optimistic write, else
    /// the replicated database, else `None`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let state = self.state.lock();
        effective(&state.pending, &state.db, key)
    }

    /// Run the named mutator optimistically, notify watchers of every key
    /// it wrote, and push it to the server.
    ///
    /// A mutator-authored failure surfaces here and nothing is enqueued.
    pub async fn mutate(&self, name: &str, args: Vec<Value>) -> Result<MutationId> {
        let (mutation, notifications) = {
            let mut state = self.state.lock();
            let ClientState { db, pending, .. } = &mut *state;

            let mut tx = ClientTransaction::new(db);
            self.registry.run(name, &mut tx, &args)?;
            let (id, patch) = tx.into_parts();

            tracing::debug!(
                client_id = %self.id,
                mutation_id = %id,
                mutator = %name,
                keys = patch.len(),
                "applied local mutation"
            );

            let keys: Vec<String> = patch.keys().cloned().collect();
            pending.push(OptimisticRecord {
                id: id.clone(),
                name: name.to_string(),
                args: args.clone(),
                patch,
            });

            let mut notifications: Vec<(String, Value)> = Vec::new();
            for key in keys {
                if let Some(value) = effective(pending, db, &key) {
                    notifications.push((key, value));
                }
            }
            (Mutation::new(id, name, args), notifications)
        };

        for (key, value) in &notifications {
            self.notify(key, value);
        }

        let id = mutation.id.clone();
        self.server
            .push(PushRequest::new(self.id.clone(), vec![mutation]))
            .await?;
        Ok(id)
    }

    /// Register a callback on `key`. Callbacks fire in registration order
    /// with the effective value whenever a mutation or pull writes the
    /// key. No immediate value is delivered; read [`get`](Self::get) for
    /// that.
    pub fn watch(
        &self,
        key: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> WatchHandle {
        let id = self.watchers.lock().subscribe(key, Arc::new(callback));
        WatchHandle::new(Arc::downgrade(&self.watchers), key.to_string(), id)
    }

    /// Inbound notification that the server may have news.
    ///
    /// Wakes the poke listener, which pulls with the current cookie; a
    /// poke landing before the initial pull returns is queued, not
    /// dropped.
    pub fn poke(&self) {
        let _ = self.poke_tx.send(());
    }

    /// Unregister this client's poke handle from the server.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    fn spawn_poke_listener(self: &Arc<Self>, mut poke_rx: mpsc::UnboundedReceiver<()>) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while poke_rx.recv().await.is_some() {
                let Some(client) = weak.upgrade() else { break };
                client.handle_poke().await;
            }
        });
    }

    fn spawn_initial_pull(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(client) = weak.upgrade() else { return };
            let response = client
                .server
                .pull(PullRequest::new(client.id.clone()))
                .await;
            client.on_pull(response);
        });
    }

    /// Inbound poke: pull with the current cookie, or queue the pull if
    /// the initial one has not returned yet.
    async fn handle_poke(&self) {
        let cookie = {
            let mut state = self.state.lock();
            match state.cookie {
                Some(cookie) => cookie,
                None => {
                    state.pull_queued = true;
                    tracing::debug!(client_id = %self.id, "poke before initial pull, queueing");
                    return;
                }
            }
        };
        let response = self
            .server
            .pull(PullRequest::new(self.id.clone()).with_cookie(cookie))
            .await;
        self.on_pull(response);
    }

    /// Apply a pull response: authoritative patch first, then rebase of
    /// the still-pending optimistic records, then notifications.
    fn on_pull(&self, response: PullResponse) {
        let PullResponse {
            cookie,
            patch,
            last_mutation_id,
        } = response;

        let mut repoke = false;
        let notifications: Vec<(String, Value)> = {
            let mut state = self.state.lock();
            let was_initial = state.cookie.is_none();

            let emitted: BTreeSet<String> = match last_mutation_id {
                None => {
                    let mut emitted = BTreeSet::new();
                    for (key, value) in patch {
                        state.db.insert(key.clone(), value);
                        emitted.insert(key);
                    }
                    state.cookie = Some(cookie);
                    emitted
                }
                Some(acked) => {
                    let Some(position) =
                        state.pending.iter().position(|record| record.id == acked)
                    else {
                        tracing::warn!(
                            client_id = %self.id,
                            mutation_id = %acked,
                            "acknowledgement for unknown mutation, ignoring pull"
                        );
                        return;
                    };

                    let ClientState { db, pending, .. } = &mut *state;
                    let mut emitted = BTreeSet::new();
                    for (key, value) in patch {
                        db.insert(key.clone(), value);
                        emitted.insert(key);
                    }

                    // Rebase everything after the acknowledged record onto
                    // the updated database. The record keeps its id; only
                    // its patch is recomputed.
                    for record in pending[position + 1..].iter_mut() {
                        let mut tx = ClientTransaction::new(db);
                        match self.registry.run(&record.name, &mut tx, &record.args) {
                            Ok(()) => {
                                record.patch = tx.into_patch();
                                emitted.extend(record.patch.keys().cloned());
                            }
                            Err(error) => {
                                tracing::warn!(
                                    client_id = %self.id,
                                    mutation_id = %record.id,
                                    mutator = %record.name,
                                    %error,
                                    "mutator failed during rebase, keeping previous patch"
                                );
                            }
                        }
                    }

                    pending.drain(..=position);
                    state.cookie = Some(cookie);
                    emitted
                }
            };

            if was_initial && state.pull_queued {
                state.pull_queued = false;
                repoke = true;
            }

            tracing::debug!(
                client_id = %self.id,
                cookie = %cookie,
                pending = state.pending.len(),
                keys = emitted.len(),
                "pull applied"
            );

            emitted
                .into_iter()
                .filter_map(|key| {
                    effective(&state.pending, &state.db, &key).map(|value| (key, value))
                })
                .collect()
        };

        if repoke {
            self.poke();
        }
        for (key, value) in notifications {
            self.notify(&key, &value);
        }
    }

    fn notify(&self, key: &str, value: &Value) {
        let callbacks = self.watchers.lock().callbacks(key);
        for callback in callbacks {
            callback(value);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}

/// The newest optimistic write wins, else the replicated database.
fn effective(
    pending: &[OptimisticRecord],
    db: &HashMap<String, Value>,
    key: &str,
) -> Option<Value> {
    pending
        .iter()
        .rev()
        .find_map(|record| record.patch.get(key).cloned())
        .or_else(|| db.get(key).cloned())
}
