//! Test doubles for the model and the search backend.

use crate::tavily::Transport;
use agent::Result;
use agent::llm::{CompletionRequest, CompletionResponse, LLM, Message, ToolChoice};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

type Responder = Arc<dyn Fn(&str, &Value) -> Result<Value> + Send + Sync>;
type Delay = Arc<dyn Fn(&Value) -> u64 + Send + Sync>;

fn empty_object(_: &str, _: &Value) -> Result<Value> {
    Ok(json!({}))
}

fn no_delay(_: &Value) -> u64 {
    0
}

/// Counts a request as in flight until its future completes or is dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Records every request and answers through a configurable responder.
#[derive(Clone)]
pub struct MockTransport {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    in_flight: Arc<AtomicUsize>,
    respond: Responder,
    delay: Delay,
    barrier: Option<Arc<Barrier>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            respond: Arc::new(empty_object),
            delay: Arc::new(no_delay),
            barrier: None,
        }
    }

    pub fn respond<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.respond = Arc::new(f);
        self
    }

    /// Milliseconds to wait before answering a request.
    pub fn delay<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> u64 + Send + Sync + 'static,
    {
        self.delay = Arc::new(f);
        self
    }

    /// No request is answered until `n` requests are in flight.
    pub fn rendezvous(mut self, n: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(n)));
        self
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests started but neither answered nor cancelled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let _in_flight = InFlight::enter(&self.in_flight);
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        let delay = (self.delay)(&body);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        (self.respond)(path, &body)
    }
}

pub struct SeenRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub tool_choice: ToolChoice,
}

/// Replays a fixed script of replies, recording what it was sent.
pub struct MockLLM {
    replies: Mutex<VecDeque<CompletionResponse>>,
    pub seen: Mutex<Vec<SeenRequest>>,
}

impl MockLLM {
    pub fn new(replies: Vec<CompletionResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LLM for MockLLM {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse> {
        self.seen.lock().unwrap().push(SeenRequest {
            messages: request.messages.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            tool_choice: request.tool_choice,
        });

        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_default())
    }
}
