use crate::domain::models::{Session, SessionOrigin, SessionType};
use crate::infrastructure::learning_api_client::LearningApiClient;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedSession {
    Remote(Session),
    Local(Session),
}

impl CreatedSession {
    pub fn session(&self) -> &Session {
        match self {
            Self::Remote(session) | Self::Local(session) => session,
        }
    }

    pub fn into_session(self) -> Session {
        match self {
            Self::Remote(session) | Self::Local(session) => session,
        }
    }

    pub fn origin(&self) -> SessionOrigin {
        match self {
            Self::Remote(_) => SessionOrigin::Remote,
            Self::Local(_) => SessionOrigin::Local,
        }
    }
}

#[derive(Clone)]
pub struct SessionFactory {
    api: Arc<dyn LearningApiClient>,
    now_provider: NowProvider,
}

impl SessionFactory {
    pub fn new(api: Arc<dyn LearningApiClient>) -> Self {
        Self {
            api,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Never fails: a backend error, or a backend record that does not form
    /// a valid session, yields a locally synthesized session.
    pub async fn create(&self, session_type: SessionType, duration_minutes: u32) -> CreatedSession {
        let failure = match self.api.start_timer_session(session_type, duration_minutes).await {
            Ok(record) => {
                let session = Session {
                    id: record.id,
                    session_type,
                    duration_minutes,
                    started_at: record.started_at.unwrap_or_else(|| (self.now_provider)()),
                    completed_at: None,
                    completed: false,
                };
                match session.validate() {
                    Ok(()) => {
                        debug!(
                            "backend accepted {} session id={}",
                            session_type.as_str(),
                            session.id
                        );
                        return CreatedSession::Remote(session);
                    }
                    Err(message) => format!("invalid session record: {message}"),
                }
            }
            Err(error) => error.to_string(),
        };

        warn!(
            "backend unavailable for {} session, continuing locally: {failure}",
            session_type.as_str()
        );
        CreatedSession::Local(Session::local(
            session_type,
            duration_minutes,
            (self.now_provider)(),
        ))
    }
}
