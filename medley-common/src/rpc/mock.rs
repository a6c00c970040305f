//! Scripted transport double for tests
//!
//! Records every issued action and plays back queued responses in order.
//! Optional per-call latency makes supersede/cancellation races reproducible
//! in tests without a network.

use super::{Action, ActionResult, RemoteClient};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted response for a `request` call
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Ok(Value),
    Err(String),
    Remote { code: String, message: String },
}

/// Scripted remote client
///
/// Responses are consumed in FIFO order, independently for single and
/// multi requests. An exhausted script fails the call with a transport
/// error so tests surface missing expectations loudly.
#[derive(Default)]
pub struct MockClient {
    single_responses: Mutex<VecDeque<ScriptedResponse>>,
    multi_responses: Mutex<VecDeque<Result<Vec<ActionResult>>>>,
    issued_single: Mutex<Vec<Action>>,
    issued_multi: Mutex<Vec<Vec<Action>>>,
    latency: Mutex<Option<Duration>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, allowing cancellation to win races
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = Some(latency);
        self
    }

    pub fn queue_response(&self, value: Value) {
        self.single_responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Ok(value));
    }

    pub fn queue_failure(&self, message: impl Into<String>) {
        self.single_responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Err(message.into()));
    }

    pub fn queue_remote_error(&self, code: impl Into<String>, message: impl Into<String>) {
        self.single_responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Remote {
                code: code.into(),
                message: message.into(),
            });
    }

    pub fn queue_multi_response(&self, results: Vec<ActionResult>) {
        self.multi_responses.lock().unwrap().push_back(Ok(results));
    }

    pub fn queue_multi_failure(&self, message: impl Into<String>) {
        self.multi_responses
            .lock()
            .unwrap()
            .push_back(Err(Error::Transport(message.into())));
    }

    /// Actions issued through `request`, in call order
    pub fn issued_single(&self) -> Vec<Action> {
        self.issued_single.lock().unwrap().clone()
    }

    /// Batches issued through `multi_request`, in call order
    pub fn issued_multi(&self) -> Vec<Vec<Action>> {
        self.issued_multi.lock().unwrap().clone()
    }

    pub fn single_count(&self) -> usize {
        self.issued_single.lock().unwrap().len()
    }

    pub fn multi_count(&self) -> usize {
        self.issued_multi.lock().unwrap().len()
    }

    async fn apply_latency(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteClient for MockClient {
    async fn request(&self, action: Action) -> Result<Value> {
        self.issued_single.lock().unwrap().push(action);
        // Consume the scripted response up front: a caller cancelled during
        // the latency window must not leave its response behind for the next
        // request in line
        let scripted = self.single_responses.lock().unwrap().pop_front();
        self.apply_latency().await;

        match scripted {
            Some(ScriptedResponse::Ok(value)) => Ok(value),
            Some(ScriptedResponse::Err(message)) => Err(Error::Transport(message)),
            Some(ScriptedResponse::Remote { code, message }) => {
                Err(Error::Remote { code, message })
            }
            None => Err(Error::Transport(
                "MockClient: no scripted response for request".to_string(),
            )),
        }
    }

    async fn multi_request(&self, actions: Vec<Action>) -> Result<Vec<ActionResult>> {
        self.issued_multi.lock().unwrap().push(actions);
        let scripted = self.multi_responses.lock().unwrap().pop_front();
        self.apply_latency().await;

        match scripted {
            Some(result) => result,
            None => Err(Error::Transport(
                "MockClient: no scripted response for multi_request".to_string(),
            )),
        }
    }
}
