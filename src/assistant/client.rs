//! AI assistant chat client.
//!
//! Every chat call goes through the assistant's circuit breaker, and inside it
//! through the retrying executor:
//! ```text
//! ChatClient::send
//!     → CircuitBreaker::execute (fail fast while the assistant is down)
//!     → HttpExecutor::execute_json (retry 5xx / timeouts / network errors)
//! ```

use std::sync::Arc;

use reqwest::Method;
use url::Url;

use crate::assistant::types::{ChatMessage, ChatReply, ChatRequest};
use crate::config::AssistantConfig;
use crate::http::{Endpoint, HttpExecutor, RequestError};
use crate::resilience::CircuitBreaker;

/// Client for the assistant chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    url: Url,
    config: AssistantConfig,
    executor: Arc<HttpExecutor>,
    breaker: Arc<CircuitBreaker>,
}

impl ChatClient {
    pub fn new(
        config: AssistantConfig,
        executor: Arc<HttpExecutor>,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, RequestError> {
        let url = chat_url(&config)?;
        tracing::debug!(url = %url, breaker = %breaker.name(), "Assistant client ready");
        Ok(Self {
            url,
            config,
            executor,
            breaker,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Send one chat request and decode the reply.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChatReply, RequestError> {
        let endpoint = self.endpoint(request)?;
        let reply = self
            .breaker
            .execute(|| self.executor.execute_json::<ChatReply>(&endpoint))
            .await?;
        Ok(reply)
    }

    fn endpoint(&self, request: &ChatRequest) -> Result<Endpoint, RequestError> {
        let mut endpoint = Endpoint::new(Method::POST, self.url.as_str())?
            .json(request)?
            .timeout(self.config.timeout());
        if let Some(key) = &self.config.api_key {
            endpoint = endpoint.bearer_auth(key)?;
        }
        Ok(endpoint)
    }
}

fn chat_url(config: &AssistantConfig) -> Result<Url, RequestError> {
    let joined = format!("{}{}", config.base_url.trim_end_matches('/'), config.chat_path);
    Url::parse(&joined)
        .map_err(|e| RequestError::InvalidRequest(format!("invalid assistant URL '{}': {}", joined, e)))
}

/// A conversation that carries its own history between requests.
#[derive(Debug, Clone)]
pub struct Conversation {
    history: Vec<ChatMessage>,
    max_history: usize,
}

impl Conversation {
    /// Default number of messages kept (user and assistant turns both count).
    pub const DEFAULT_MAX_HISTORY: usize = 20;

    pub fn new() -> Self {
        Self::with_max_history(Self::DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            history: Vec::new(),
            max_history,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Ask `message`, sending prior turns as context.
    ///
    /// History only grows when the exchange succeeds.
    pub async fn ask(&mut self, client: &ChatClient, message: &str) -> Result<String, RequestError> {
        let request = ChatRequest {
            message: message.to_string(),
            history: self.history.clone(),
        };
        let reply = client.send(&request).await?;
        self.record_exchange(message, &reply.response);
        Ok(reply.response)
    }

    fn record_exchange(&mut self, message: &str, reply: &str) {
        self.history.push(ChatMessage::user(message));
        self.history.push(ChatMessage::assistant(reply));
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            self.history.drain(0..excess);
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
