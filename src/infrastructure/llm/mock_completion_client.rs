use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::application::ports::{
    CompletionClient, CompletionError, CompletionRequest, FragmentStream,
};

pub const MOCK_REPLY: &str = "Mock answer";

/// One scripted answer, consumed in order by either call style.
#[derive(Debug)]
pub enum ScriptedReply {
    Text(String),
    Fragments(Vec<String>),
    /// Streams the fragments, then fails with the error.
    BrokenStream(Vec<String>, CompletionError),
    Error(CompletionError),
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedReply::Text(text.into())
    }

    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedReply::Fragments(fragments.into_iter().map(Into::into).collect())
    }
}

/// Completion client with scripted answers and recorded requests. Once the
/// script runs out every call answers [`MOCK_REPLY`].
#[derive(Default)]
pub struct MockCompletionClient {
    script: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Holds every call until the returned semaphore grants a permit, which
    /// keeps a request in flight for as long as a test needs.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn next_reply(&self, request: &CompletionRequest) -> ScriptedReply {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::text(MOCK_REPLY))
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        match self.next_reply(request).await {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Fragments(fragments) => Ok(fragments.concat()),
            ScriptedReply::BrokenStream(_, error) | ScriptedReply::Error(error) => Err(error),
        }
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, CompletionError> {
        let items: Vec<Result<String, CompletionError>> = match self.next_reply(request).await {
            ScriptedReply::Text(text) => vec![Ok(text)],
            ScriptedReply::Fragments(fragments) => fragments.into_iter().map(Ok).collect(),
            ScriptedReply::BrokenStream(fragments, error) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(error)))
                .collect(),
            ScriptedReply::Error(error) => return Err(error),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}
