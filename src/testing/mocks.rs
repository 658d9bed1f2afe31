//! Mock implementations for testing
//!
//! Provides mock LlmProvider, ObjectStore and TokenProvider implementations
//! so the pipeline and relay can be exercised without Google Cloud.

use crate::auth::{AuthError, TokenProvider};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::storage::{ObjectLocation, ObjectStore, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

/// Scripted model responses, one per call
///
/// A `None` entry produces a response with no text content. Once the script
/// is exhausted every further call fails.
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<Option<String>>,
    pub current_response: Arc<Mutex<usize>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
    pub fail_on_call: Option<usize>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: responses.into_iter().map(Some).collect(),
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Script that may contain empty responses
    pub fn with_script(responses: Vec<Option<String>>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    /// Fail the call with this zero-based index and answer the rest
    pub fn failing_on_call(mut self, index: usize) -> Self {
        self.fail_on_call = Some(index);
        self
    }

    pub async fn get_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        *self.current_response.lock().await
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let model = request.model.clone();
        self.requests.lock().await.push(request);

        let mut current = self.current_response.lock().await;
        let index = *current;
        *current += 1;

        if self.fail_on_call == Some(index) {
            return Err(LlmError::ApiError(format!("Mock failure on call {index}")));
        }

        let content = self.responses.get(index).cloned().ok_or_else(|| {
            LlmError::RequestFailed(format!("No scripted response for call {index}"))
        })?;

        Ok(CompletionResponse {
            content,
            model,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// In-memory object store keyed by location
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ObjectLocation, String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads succeed, every write fails
    pub fn with_write_failure() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn insert(&self, location: &ObjectLocation, content: impl Into<String>) {
        self.write_guard().insert(location.clone(), content.into());
    }

    pub fn get(&self, location: &ObjectLocation) -> Option<String> {
        self.read_guard().get(location).cloned()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, HashMap<ObjectLocation, String>> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<ObjectLocation, String>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read_text(&self, location: &ObjectLocation) -> Result<String, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.get(location)
            .ok_or_else(|| StorageError::NotFound(location.to_uri()))
    }

    async fn write_text(
        &self,
        location: &ObjectLocation,
        content: &str,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StorageError::ApiError("Mock write failure".to_string()));
        }
        self.insert(location, content);
        Ok(())
    }
}

/// Token provider returning a fixed token or a fixed failure
#[derive(Debug)]
pub struct MockTokenProvider {
    token: Option<String>,
    calls: AtomicUsize,
    audiences: Arc<Mutex<Vec<String>>>,
}

impl MockTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            calls: AtomicUsize::new(0),
            audiences: Arc::default(),
        }
    }

    pub fn with_failure() -> Self {
        Self {
            token: None,
            calls: AtomicUsize::new(0),
            audiences: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Audiences requested for identity tokens, in call order
    pub async fn get_audiences(&self) -> Vec<String> {
        self.audiences.lock().await.clone()
    }

    fn token(&self) -> Result<String, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token
            .clone()
            .ok_or_else(|| AuthError::RefreshFailed("Mock token failure".to_string()))
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.token()
    }

    async fn identity_token(&self, audience: &str) -> Result<String, AuthError> {
        self.audiences.lock().await.push(audience.to_string());
        self.token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ContentPart;

    #[tokio::test]
    async fn test_mock_llm_follows_script() {
        let llm = MockLlmProvider::with_script(vec![Some("one".to_string()), None]);
        let request = || CompletionRequest::single_turn("m", vec![ContentPart::text("q")]);

        let first = llm.complete(request()).await.unwrap();
        let second = llm.complete(request()).await.unwrap();
        let third = llm.complete(request()).await;

        assert_eq!(first.content.as_deref(), Some("one"));
        assert_eq!(second.content, None);
        assert!(third.is_err());
        assert_eq!(llm.call_count().await, 3);
        assert_eq!(llm.get_requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_mock_llm_fails_on_selected_call() {
        let llm = MockLlmProvider::new(vec!["a".into(), "b".into()]).failing_on_call(1);
        let request = || CompletionRequest::single_turn("m", vec![ContentPart::text("q")]);

        assert!(llm.complete(request()).await.is_ok());
        assert!(matches!(
            llm.complete(request()).await,
            Err(LlmError::ApiError(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_counts_operations() {
        let store = MemoryObjectStore::new();
        let location = ObjectLocation::new("b", "x.txt");

        assert!(matches!(
            store.read_text(&location).await,
            Err(StorageError::NotFound(_))
        ));
        store.write_text(&location, "hello", "text/plain").await.unwrap();
        assert_eq!(store.read_text(&location).await.unwrap(), "hello");
        assert_eq!(store.read_count(), 2);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_token_provider() {
        let tokens = MockTokenProvider::new("tok");
        assert_eq!(tokens.identity_token("https://svc").await.unwrap(), "tok");
        assert_eq!(tokens.get_audiences().await, vec!["https://svc"]);

        let failing = MockTokenProvider::with_failure();
        assert!(failing.access_token().await.is_err());
        assert_eq!(failing.call_count(), 1);
    }
}
