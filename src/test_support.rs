use crate::domain::models::{AmbientSound, FocusTechnique, MotivationalMessage, SessionType};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::learning_api_client::{LearningApiClient, RemoteSessionRecord};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Scriptable backend. Feed calls can be held behind a gate until released.
#[derive(Debug, Default)]
pub struct FakeLearningApi {
    pub session_calls: AtomicUsize,
    pub sound_calls: AtomicUsize,
    pub message_calls: AtomicUsize,
    pub technique_calls: AtomicUsize,
    pub fail_sessions: AtomicBool,
    pub fail_feeds: AtomicBool,
    feed_gate: Option<Semaphore>,
}

impl FakeLearningApi {
    pub fn gated() -> Self {
        Self {
            feed_gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release_feeds(&self, permits: usize) {
        if let Some(gate) = &self.feed_gate {
            gate.add_permits(permits);
        }
    }

    async fn feed_call(&self, counter: &AtomicUsize) -> Result<(), InfraError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.feed_gate {
            gate.acquire()
                .await
                .map_err(|error| InfraError::Api(error.to_string()))?
                .forget();
        }
        if self.fail_feeds.load(Ordering::SeqCst) {
            return Err(InfraError::Api("feed unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LearningApiClient for FakeLearningApi {
    async fn start_timer_session(
        &self,
        _session_type: SessionType,
        _duration_minutes: u32,
    ) -> Result<RemoteSessionRecord, InfraError> {
        let call = self.session_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(InfraError::Api("network error during timer session start".to_string()));
        }
        Ok(RemoteSessionRecord {
            id: format!("sess-{call}"),
            started_at: None,
        })
    }

    async fn recommend_ambient_sound(&self, mood: &str) -> Result<AmbientSound, InfraError> {
        self.feed_call(&self.sound_calls).await?;
        Ok(AmbientSound {
            id: format!("sound-{mood}"),
            name: "Rain on leaves".to_string(),
            url: Some(format!("https://cdn.test/{mood}.mp3")),
            mood: Some(mood.to_string()),
        })
    }

    async fn random_motivational_message(
        &self,
        category: &str,
    ) -> Result<MotivationalMessage, InfraError> {
        self.feed_call(&self.message_calls).await?;
        Ok(MotivationalMessage {
            id: Some("msg-1".to_string()),
            message: "Small steps, every day.".to_string(),
            author: None,
            category: Some(category.to_string()),
        })
    }

    async fn list_focus_techniques(&self) -> Result<Vec<FocusTechnique>, InfraError> {
        self.feed_call(&self.technique_calls).await?;
        Ok(["box-breathing", "deep-work", "pomodoro"]
            .into_iter()
            .map(|id| FocusTechnique {
                id: id.to_string(),
                name: id.replace('-', " "),
                description: String::new(),
                steps: Vec::new(),
            })
            .collect())
    }
}
