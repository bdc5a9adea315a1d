/*!
 * Mock text generator for tests.
 *
 * Returns a scripted sequence of outcomes so pipeline behavior (retries,
 * fallback, checkpointing) can be exercised without any network access.
 */

use std::collections::VecDeque;
use std::sync::Mutex;
use async_trait::async_trait;

use crate::errors::ProviderError;
use super::{GenerationRequest, TextGenerator};

/// One scripted outcome for a mock call
#[derive(Debug)]
pub enum MockOutcome {
    /// Return this text
    Text(String),
    /// Fail with a generic API error
    Error,
    /// Fail with a rate-limit error
    RateLimit,
}

/// Record of one request the mock received
#[derive(Debug, Clone)]
pub struct MockCall {
    /// Model the caller asked for
    pub model: String,
    /// System prompt supplied with the request
    pub system_prompt: String,
    /// Payload supplied with the request
    pub prompt: String,
}

/// Scriptable mock implementation of [`TextGenerator`]
#[derive(Debug, Default)]
pub struct MockGenerator {
    script: Mutex<VecDeque<MockOutcome>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockGenerator {
    /// Create an empty mock; calls beyond the script fail with an API error
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock from a list of outcomes
    pub fn with_script(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Append an outcome to the script
    pub fn push(&self, outcome: MockOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of all calls received
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(MockCall {
            model: request.model.clone(),
            system_prompt: request.system_prompt.clone(),
            prompt: request.prompt.clone(),
        });

        match self.script.lock().unwrap().pop_front() {
            Some(MockOutcome::Text(text)) => Ok(text),
            Some(MockOutcome::Error) => Err(ProviderError::ApiError {
                status_code: 500,
                message: "mock error".to_string(),
            }),
            Some(MockOutcome::RateLimit) => {
                Err(ProviderError::RateLimitExceeded("mock rate limit".to_string()))
            }
            None => Err(ProviderError::ApiError {
                status_code: 500,
                message: "mock script exhausted".to_string(),
            }),
        }
    }
}
