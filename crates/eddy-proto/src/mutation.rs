//! Mutation descriptors: what a client asks the server to re-execute.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier of a single mutation invocation.
///
/// Fresh per local invocation; the server echoes the newest one it has
/// incorporated back to the authoring client as an acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(String);

impl MutationId {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        MutationId(id.into())
    }

    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        MutationId(uuid::Uuid::new_v4().to_string())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MutationId {
    #[inline]
    fn from(s: &str) -> Self {
        MutationId(s.to_string())
    }
}

/// A named mutation with its arguments, as pushed to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub id: MutationId,
    /// Name of the registered mutator to invoke.
    pub name: String,
    pub args: Vec<Value>,
}

impl Mutation {
    #[must_use]
    pub fn new(id: MutationId, name: impl Into<String>, args: Vec<Value>) -> Self {
        Mutation {
            id,
            name: name.into(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(MutationId::generate(), MutationId::generate());
    }

    #[test]
    fn test_display_roundtrip() {
        let id = MutationId::new("m-1");
        assert_eq!(id.to_string(), "m-1");
        assert_eq!(id.as_str(), "m-1");
    }

    #[test]
    fn test_mutation_serde() {
        let mutation = Mutation::new(MutationId::new("m-1"), "add", vec![json!(2)]);
        let encoded = serde_json::to_value(&mutation).unwrap();
        assert_eq!(encoded, json!({"id": "m-1", "name": "add", "args": [2]}));
        let decoded: Mutation = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, mutation);
    }
}
