//! Two clients converging on a shared counter.
//!
//! Run with `RUST_LOG=eddy_core=debug cargo run --example counter` to see
//! the push/pull traffic.

use anyhow::Result;
use eddy_core::{Client, EddyError, MutatorRegistry, Server, Transaction};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn registry() -> MutatorRegistry {
    let mut registry = MutatorRegistry::new();
    registry.register("add", |tx, args| {
        let delta = args
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| EddyError::mutator("add requires an integer amount"))?;
        let current = tx.get("value").and_then(|v| v.as_i64()).unwrap_or(0);
        tx.set("value", json!(current + delta));
        Ok(())
    });
    registry
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let server = Arc::new(Server::new(registry()));
    let alice = Client::connect_with_id(server.clone(), registry(), "alice");
    let bob = Client::connect_with_id(server.clone(), registry(), "bob");

    let _watch = alice.watch("value", |value| {
        println!("alice sees value = {value}");
    });

    alice.mutate("add", vec![json!(2)]).await?;
    bob.mutate("add", vec![json!(3)]).await?;

    // Let the pokes and pulls drain.
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("server: {:?}", server.get("value"));
    println!("alice:  {:?}", alice.get("value"));
    println!("bob:    {:?}", bob.get("value"));
    Ok(())
}
