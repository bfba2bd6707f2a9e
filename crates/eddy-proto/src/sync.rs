//! Request/response envelopes for the push/pull protocol.

use crate::{Cookie, Mutation, MutationId, Patch};
use serde::{Deserialize, Serialize};

/// A client's submission of mutations for authoritative re-execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub client_id: String,
    pub mutations: Vec<Mutation>,
}

impl PushRequest {
    #[must_use]
    pub fn new(client_id: impl Into<String>, mutations: Vec<Mutation>) -> Self {
        PushRequest {
            client_id: client_id.into(),
            mutations,
        }
    }
}

/// A client's request for everything newer than its cookie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub client_id: String,
    #[serde(default)]
    pub cookie: Cookie,
}

impl PullRequest {
    /// Request with `Cookie::ZERO`: "give me everything".
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        PullRequest {
            client_id: client_id.into(),
            cookie: Cookie::ZERO,
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookie = cookie;
        self
    }
}

/// The server's answer to a pull.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// The server's version at the moment the pull was serviced.
    pub cookie: Cookie,
    /// Merge of every patch past the request's cookie, newest-last wins.
    pub patch: Patch,
    /// Acknowledgement of the newest mutation the server has incorporated
    /// from this client, if one is pending. Consumed on read server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mutation_id: Option<MutationId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pull_request_defaults_to_zero() {
        let req = PullRequest::new("c1");
        assert_eq!(req.cookie, Cookie::ZERO);
        let req = req.with_cookie(Cookie(3));
        assert_eq!(req.cookie, Cookie(3));
    }

    #[test]
    fn test_pull_request_cookie_optional_on_wire() {
        let decoded: PullRequest = serde_json::from_value(json!({"clientId": "c1"})).unwrap();
        assert_eq!(decoded.cookie, Cookie::ZERO);
    }

    #[test]
    fn test_pull_response_omits_absent_ack() {
        let response = PullResponse {
            cookie: Cookie(1),
            patch: Patch::new().with("value", json!(2)),
            last_mutation_id: None,
        };
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded, json!({"cookie": 1, "patch": {"value": 2}}));
    }

    #[test]
    fn test_pull_response_carries_ack() {
        let response = PullResponse {
            cookie: Cookie(2),
            patch: Patch::new(),
            last_mutation_id: Some(MutationId::new("m-9")),
        };
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["lastMutationId"], json!("m-9"));
        let decoded: PullResponse = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_push_request_serde() {
        let req = PushRequest::new(
            "c1",
            vec![Mutation::new(MutationId::new("m-1"), "add", vec![json!(2)])],
        );
        let encoded = serde_json::to_value(&req).unwrap();
        assert_eq!(encoded["clientId"], json!("c1"));
        assert_eq!(encoded["mutations"][0]["name"], json!("add"));
    }
}
