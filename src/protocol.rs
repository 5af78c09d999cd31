//! Wire envelope: the JSON layer carried inside each frame's payload.
//!
//! `method` is the discriminator; `params` stays an opaque [`serde_json::Value`]
//! until the handler for that method decodes it, per the dynamic-typed
//! envelope design in the coordinator's notes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request or notification received from (or sent to) a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Nullable for server-initiated notifications (e.g. `job`); mandatory
    /// for client requests.
    pub id: Option<i64>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A response sent back to a client for a request it issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: i64) -> Self {
        Self {
            id,
            result: true,
            error: None,
        }
    }

    pub fn err(id: i64, reason: &str) -> Self {
        Self {
            id,
            result: false,
            error: Some(reason.to_string()),
        }
    }
}

/// `authorize` params: `{ "username": string }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeParams {
    pub username: String,
}

/// `job` notification params: `{ "job_id": int, "server_nonce": hex }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParams {
    pub job_id: u64,
    pub server_nonce: String,
}

/// `submit` params: `{ "job_id": int, "client_nonce": string, "result": hex }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitParams {
    pub job_id: u64,
    pub client_nonce: String,
    pub result: String,
}

/// Method name constants, to avoid stringly-typed comparisons drifting.
pub mod method {
    pub const AUTHORIZE: &str = "authorize";
    pub const JOB: &str = "job";
    pub const SUBMIT: &str = "submit";
}

/// Build the `job` notification envelope for a rotation.
pub fn job_notification(job_id: u64, server_nonce: &str) -> Request {
    Request {
        id: None,
        method: method::JOB.to_string(),
        params: serde_json::to_value(JobParams {
            job_id,
            server_nonce: server_nonce.to_string(),
        })
        .expect("JobParams always serializes"),
    }
}
