//! eddy-proto: wire types for the eddy replication protocol.
//!
//! Everything a push/pull transport carries between a client replica and
//! the authoritative server lives here: patches, version cookies, mutation
//! descriptors, and the request/response envelopes. All types are owned,
//! `serde`-serializable values, so any request/response channel can move
//! them across a process or network boundary without sharing state.

pub mod cookie;
pub mod mutation;
pub mod patch;
pub mod sync;

pub use cookie::Cookie;
pub use mutation::{Mutation, MutationId};
pub use patch::Patch;
pub use sync::{PullRequest, PullResponse, PushRequest};
