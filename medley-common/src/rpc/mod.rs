//! RPC transport boundary
//!
//! The console core never depends on a specific remote action's shape beyond:
//! it is constructible, it can be batched, and each batched response exposes
//! an optional per-item error. Reads and writes go through the [`RemoteClient`]
//! trait; the HTTP implementation lives in [`http`], a scripted test double in
//! [`mock`].

pub mod http;
pub mod mock;

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One remote service operation
///
/// `service` and `name` select the remote endpoint; `params` carries the
/// operation payload as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub service: String,
    pub name: String,
    pub params: Value,
}

impl Action {
    pub fn new(service: impl Into<String>, name: impl Into<String>, params: Value) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            params,
        }
    }
}

/// Error attached to one item of a batched response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl RemoteError {
    pub fn is_permission_denied(&self) -> bool {
        self.code == "FORBIDDEN" || self.code == "PERMISSION_DENIED"
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Error::Remote {
            code: e.code,
            message: e.message,
        }
    }
}

/// Per-item result of a batched multi-request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Option<RemoteError>,
}

impl ActionResult {
    pub fn ok(data: Value) -> Self {
        Self { data, error: None }
    }

    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            data: Value::Null,
            error: Some(RemoteError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Ordered accumulator for one atomic multi-operation write
///
/// Sections append their operations during save preparation; the submission
/// order is the append order, which the coordinator drives in section
/// registration order. Each appended action is tagged with the contributing
/// source so failures can be attributed.
#[derive(Debug, Default)]
pub struct MultiRequest {
    operations: Vec<(String, Action)>,
}

impl MultiRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one operation attributed to `source`
    pub fn add(&mut self, source: impl Into<String>, action: Action) {
        self.operations.push((source.into(), action));
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Sources that contributed at least one operation, in append order
    pub fn sources(&self) -> Vec<&str> {
        self.operations.iter().map(|(s, _)| s.as_str()).collect()
    }

    /// Consume the builder into the ordered action batch
    pub fn into_actions(self) -> Vec<Action> {
        self.operations.into_iter().map(|(_, a)| a).collect()
    }
}

/// Remote service transport boundary
///
/// `request` issues one operation; `multi_request` submits an ordered batch
/// atomically, with the remote service defining all-or-nothing vs.
/// partial-success semantics surfaced through per-item errors.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn request(&self, action: Action) -> Result<Value>;

    async fn multi_request(&self, actions: Vec<Action>) -> Result<Vec<ActionResult>>;
}
