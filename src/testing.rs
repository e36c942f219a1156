//! Test doubles for the external collaborators.

use crate::error::BenchError;
use crate::llm::CompletionService;
use crate::models::{CandidateUrl, FetchOutcome, FetchStatus, RawRecord};
use crate::registry::RegistrySource;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A planner response with five distinct URLs under `base`.
pub fn plan_response(base: &str) -> String {
    let urls: Vec<String> = [
        "query.term=asthma",
        "query.cond=asthma",
        "query.intr=omalizumab",
        "query.term=bronchial+hyperreactivity",
        "query.cond=asthma&query.intr=biologic",
    ]
    .iter()
    .map(|q| format!("{}/studies?{}&countTotal=true&pageSize=100", base, q))
    .collect();
    json!({ "urls": urls }).to_string()
}

/// A minimal registry study carrying `id`.
pub fn study(id: &str, title: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": {"nctId": id, "briefTitle": title}
        }
    })
}

/// A successful fetch outcome for `url` containing studies with `ids`.
pub fn success(url: &str, ids: &[&str], declared_total: u64) -> FetchOutcome {
    let records = ids
        .iter()
        .map(|id| RawRecord::new(study(id, &format!("Study {}", id))))
        .collect();
    FetchOutcome::success(CandidateUrl::from(url), records, declared_total)
}

/// Completion service replaying a fixed script of replies.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, BenchError>>>,
    fallback: Option<Result<String, BenchError>>,
    calls: AtomicUsize,
    user_prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(script: Vec<Result<String, BenchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            user_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `reply`.
    pub fn repeating(reply: Result<String, BenchError>) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn user_prompts(&self) -> Vec<String> {
        self.user_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, BenchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.user_prompts.lock().unwrap().push(user.to_string());

        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(reply)) => reply.clone(),
            (None, None) => Err(BenchError::Completion("script exhausted".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

type Responder = dyn Fn(&str, &str) -> Result<String, BenchError> + Send + Sync;

/// Completion service answering through a closure over (system, user).
pub struct FnCompletion {
    responder: Box<Responder>,
    calls: AtomicUsize,
}

impl FnCompletion {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, BenchError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FnCompletion {
    async fn complete(&self, system: &str, user: &str) -> Result<String, BenchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        (self.responder)(system, user)
    }

    fn model_name(&self) -> &str {
        "fn-completion"
    }
}

/// Completion service whose calls never resolve.
#[derive(Default)]
pub struct PendingCompletion;

#[async_trait]
impl CompletionService for PendingCompletion {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, BenchError> {
        std::future::pending().await
    }

    fn model_name(&self) -> &str {
        "pending"
    }
}

/// Registry answering from a fixed table; unknown URLs come back `Empty`.
#[derive(Default)]
pub struct StaticRegistry {
    outcomes: HashMap<CandidateUrl, FetchOutcome>,
    calls: AtomicUsize,
}

impl StaticRegistry {
    pub fn new(outcomes: Vec<FetchOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().map(|o| (o.url.clone(), o)).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_empty() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistrySource for StaticRegistry {
    async fn fetch(&self, url: &CandidateUrl) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.outcomes.get(url).cloned().unwrap_or_else(|| {
            FetchOutcome::failed(url.clone(), FetchStatus::Empty, "Empty result (totalCount: 0)")
        })
    }
}
