//! eddy-core: an optimistic client/server replication engine for a JSON
//! key-value store.
//!
//! The engine is split into a handful of components:
//!
//! - **registry**: named deterministic mutators shared by both peers.
//! - **transaction**: the read/write interface mutators run against, over
//!   a client snapshot or the server's patch log.
//! - **server**: the authoritative patch log, versioning, push/pull
//!   endpoints, and poke fan-out.
//! - **client**: the local replica — optimistic mutation queue, watcher
//!   notifications, and pull/rebase.
//! - **watch**: key-scoped subscriptions over the effective merged view.
//!
//! Wire types live in [`eddy_proto`], re-exported here as [`proto`].

pub mod client;
pub mod error;
pub mod registry;
pub mod server;
pub mod transaction;
pub mod watch;

pub use crate::client::Client;
pub use crate::error::{EddyError, Result};
pub use crate::registry::{MutatorFn, MutatorRegistry};
pub use crate::server::{Connection, Poke, Server};
pub use crate::transaction::{ClientTransaction, ServerTransaction, Transaction};
pub use crate::watch::{WatchHandle, WatchId};

pub use eddy_proto as proto;
pub use eddy_proto::{Cookie, Mutation, MutationId, Patch, PullRequest, PullResponse, PushRequest};
