//! Narrator doubles for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::narrator::{Narration, NarrationRequest, Narrator, NarratorError};

/// A narrator that answers from a script, in order, and keeps every
/// request it was sent. An exhausted script answers with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedNarrator {
    script: Mutex<VecDeque<Result<Narration, NarratorError>>>,
    requests: Mutex<Vec<NarrationRequest>>,
}

impl ScriptedNarrator {
    /// Creates a narrator with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an answer to the script.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn then(self, answer: Result<Narration, NarratorError>) -> Self {
        self.script.lock().unwrap().push_back(answer);
        self
    }

    /// Returns every request received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<NarrationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn narrate(&self, request: &NarrationRequest) -> Result<Narration, NarratorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(NarratorError::Transport("script exhausted".into())))
    }
}

/// A narrator that never answers within any reasonable timeout.
#[derive(Debug, Clone, Copy)]
pub struct StallingNarrator(pub Duration);

#[async_trait]
impl Narrator for StallingNarrator {
    async fn narrate(&self, _request: &NarrationRequest) -> Result<Narration, NarratorError> {
        tokio::time::sleep(self.0).await;
        Err(NarratorError::Transport("stalled".into()))
    }
}
