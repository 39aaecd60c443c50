//! Shared test doubles for preprocessing and pipeline tests.

use async_trait::async_trait;
use courier_core::{
    ChatTransport, ProviderError, RetrievalError, SearchBackend, SearchHit, TransportReply,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A backend that serves scripted hits per datastore and records each query.
#[derive(Default)]
pub struct ScriptedSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedSearch {
    pub fn with_hits(mut self, datastore: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.insert(datastore.to_string(), hits);
        self
    }

    /// `(datastore_id, page_size)` per search, in call order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for ScriptedSearch {
    async fn search(
        &self,
        datastore_id: &str,
        _query: &str,
        page_size: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        self.calls
            .lock()
            .unwrap()
            .push((datastore_id.to_string(), page_size));
        Ok(self
            .hits
            .get(datastore_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(page_size)
            .collect())
    }
}

pub fn hit(id: &str, snippet: &str) -> SearchHit {
    SearchHit {
        doc_id: Some(id.to_string()),
        title: Some(format!("Title {id}")),
        uri: Some(format!("gs://corpus/{id}.pdf")),
        snippet: Some(snippet.to_string()),
    }
}

/// A gateway transport that replays scripted replies and records bodies.
///
/// Once the script runs out every call fails with a network error.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<TransportReply, ProviderError>>>,
    sent: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<TransportReply, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(vec![ok_text(text)])
    }

    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn endpoint(&self) -> &str {
        "http://bifrost:8080/v1/chat/completions"
    }

    async fn post(&self, body: &serde_json::Value) -> Result<TransportReply, ProviderError> {
        self.sent.lock().unwrap().push(body.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())))
    }
}

pub fn reply(status: u16, body: &str) -> Result<TransportReply, ProviderError> {
    Ok(TransportReply {
        status,
        body: body.to_string(),
    })
}

/// A 200 reply in chat-completions shape.
pub fn ok_text(text: &str) -> Result<TransportReply, ProviderError> {
    reply(
        200,
        &serde_json::json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
            .to_string(),
    )
}
