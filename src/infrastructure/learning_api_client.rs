use crate::domain::models::{AmbientSound, FocusTechnique, MotivationalMessage, SessionType};
use crate::infrastructure::credential_store::ApiTokenStore;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What the backend acknowledges when a timer session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSessionRecord {
    pub id: String,
    pub started_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait LearningApiClient: Send + Sync {
    async fn start_timer_session(
        &self,
        session_type: SessionType,
        duration_minutes: u32,
    ) -> Result<RemoteSessionRecord, InfraError>;

    async fn recommend_ambient_sound(&self, mood: &str) -> Result<AmbientSound, InfraError>;

    async fn random_motivational_message(
        &self,
        category: &str,
    ) -> Result<MotivationalMessage, InfraError>;

    async fn list_focus_techniques(&self) -> Result<Vec<FocusTechnique>, InfraError>;
}

#[derive(Clone)]
pub struct ReqwestLearningApiClient {
    client: Client,
    base_url: Url,
    token_store: Arc<dyn ApiTokenStore>,
}

#[derive(Debug, serde::Serialize)]
struct StartTimerRequest {
    duration: u32,
}

#[derive(Debug, serde::Deserialize)]
struct StartTimerResponse {
    id: Option<serde_json::Value>,
    #[serde(rename = "startedAt")]
    started_at: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct FocusTechniqueDescriptor {
    name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    steps: Vec<String>,
}

impl ReqwestLearningApiClient {
    pub fn new(base_url: Url, token_store: Arc<dyn ApiTokenStore>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url,
            token_store,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| InfraError::Api("api base URL cannot be a base".to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, InfraError> {
        Ok(match self.token_store.load_token()? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    fn http_error(what: &str, status: reqwest::StatusCode, body: &str) -> InfraError {
        if body.trim().is_empty() {
            InfraError::Api(format!("{what} failed: http {}", status.as_u16()))
        } else {
            InfraError::Api(format!("{what} failed: http {}; body={body}", status.as_u16()))
        }
    }

    async fn send_json<T>(&self, what: &str, request: RequestBuilder) -> Result<T, InfraError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .authorize(request)?
            .send()
            .await
            .map_err(|error| InfraError::Api(format!("network error during {what}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Api(format!("failed reading {what} response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(what, status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|error| InfraError::Api(format!("invalid {what} payload: {error}; body={body}")))
    }
}

fn parse_remote_id(value: Option<serde_json::Value>) -> Option<String> {
    let id = match value? {
        serde_json::Value::String(value) => value.trim().to_string(),
        serde_json::Value::Number(value) => value.to_string(),
        _ => return None,
    };
    Some(id).filter(|value| !value.is_empty())
}

#[async_trait]
impl LearningApiClient for ReqwestLearningApiClient {
    async fn start_timer_session(
        &self,
        session_type: SessionType,
        duration_minutes: u32,
    ) -> Result<RemoteSessionRecord, InfraError> {
        let endpoint = self.endpoint(&["timer", session_type.endpoint_segment()])?;
        let request = self.client.post(endpoint).json(&StartTimerRequest {
            duration: duration_minutes,
        });
        let parsed: StartTimerResponse = self.send_json("timer session start", request).await?;

        let id = parse_remote_id(parsed.id).ok_or_else(|| {
            InfraError::Api("timer session response did not include id".to_string())
        })?;
        let started_at = parsed
            .started_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|value| value.with_timezone(&Utc));

        Ok(RemoteSessionRecord { id, started_at })
    }

    async fn recommend_ambient_sound(&self, mood: &str) -> Result<AmbientSound, InfraError> {
        let endpoint = self.endpoint(&["ambient-sounds", "recommend"])?;
        let request = self.client.get(endpoint).query(&[("mood", mood)]);
        self.send_json("ambient sound recommendation", request).await
    }

    async fn random_motivational_message(
        &self,
        category: &str,
    ) -> Result<MotivationalMessage, InfraError> {
        let endpoint = self.endpoint(&["motivational-messages", "random"])?;
        let request = self.client.get(endpoint).query(&[("category", category)]);
        self.send_json("motivational message", request).await
    }

    async fn list_focus_techniques(&self) -> Result<Vec<FocusTechnique>, InfraError> {
        let endpoint = self.endpoint(&["focus-techniques"])?;
        let request = self.client.get(endpoint);
        let parsed: BTreeMap<String, FocusTechniqueDescriptor> =
            self.send_json("focus techniques", request).await?;

        Ok(parsed
            .into_iter()
            .map(|(id, descriptor)| FocusTechnique {
                name: descriptor
                    .name
                    .or(descriptor.title)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| id.clone()),
                description: descriptor.description.unwrap_or_default(),
                steps: descriptor.steps,
                id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credential_store::InMemoryApiTokenStore;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> ReqwestLearningApiClient {
        let base_url = Url::parse(&format!("{}/api/", server.uri())).expect("base url");
        let store: Arc<dyn ApiTokenStore> = match token {
            Some(token) => Arc::new(InMemoryApiTokenStore::with_token(token)),
            None => Arc::new(InMemoryApiTokenStore::default()),
        };
        ReqwestLearningApiClient::new(base_url, store)
    }

    #[tokio::test]
    async fn start_timer_session_posts_duration_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/timer/long-break"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_json(serde_json::json!({ "duration": 15 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "sess-77",
                "type": "long-break",
                "durationMinutes": 15,
                "startedAt": "2026-02-16T09:00:00Z",
                "completed": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = client_for(&server, Some("secret-token"))
            .start_timer_session(SessionType::LongBreak, 15)
            .await
            .expect("remote session");
        assert_eq!(record.id, "sess-77");
        assert_eq!(
            record.started_at.map(|value| value.to_rfc3339()),
            Some("2026-02-16T09:00:00+00:00".to_string())
        );
    }

    #[tokio::test]
    async fn numeric_ids_are_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/timer/focus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 42 })))
            .mount(&server)
            .await;

        let record = client_for(&server, None)
            .start_timer_session(SessionType::Focus, 25)
            .await
            .expect("remote session");
        assert_eq!(record.id, "42");
        assert_eq!(record.started_at, None);
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/timer/break"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let result = client_for(&server, None)
            .start_timer_session(SessionType::ShortBreak, 5)
            .await;
        match result {
            Err(InfraError::Api(message)) => {
                assert!(message.contains("503"));
                assert!(message.contains("maintenance"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_id_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/timer/focus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "  " })))
            .mount(&server)
            .await;

        let result = client_for(&server, None)
            .start_timer_session(SessionType::Focus, 25)
            .await;
        assert!(matches!(result, Err(InfraError::Api(_))));
    }

    #[tokio::test]
    async fn recommendation_feeds_pass_their_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ambient-sounds/recommend"))
            .and(query_param("mood", "focus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "rain",
                "name": "Soft rain",
                "url": "https://cdn.example.com/rain.mp3"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/motivational-messages/random"))
            .and(query_param("category", "relax"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Rest is part of the work.",
                "author": "Coach"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let sound = client.recommend_ambient_sound("focus").await.expect("sound");
        assert_eq!(sound.id, "rain");
        assert_eq!(sound.name, "Soft rain");

        let message = client
            .random_motivational_message("relax")
            .await
            .expect("message");
        assert_eq!(message.message, "Rest is part of the work.");
        assert_eq!(message.author.as_deref(), Some("Coach"));
    }

    #[tokio::test]
    async fn focus_techniques_are_ordered_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/focus-techniques"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pomodoro": { "name": "Pomodoro", "description": "25/5 cycles" },
                "deep-work": { "title": "Deep Work", "steps": ["Block time", "Go offline"] },
                "box-breathing": {}
            })))
            .mount(&server)
            .await;

        let techniques = client_for(&server, None)
            .list_focus_techniques()
            .await
            .expect("techniques");
        let ids = techniques.iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["box-breathing", "deep-work", "pomodoro"]);
        assert_eq!(techniques[0].name, "box-breathing");
        assert_eq!(techniques[1].name, "Deep Work");
        assert_eq!(techniques[1].steps.len(), 2);
        assert_eq!(techniques[2].description, "25/5 cycles");
    }

    #[tokio::test]
    async fn network_failure_is_an_api_error() {
        let base_url = Url::parse("http://127.0.0.1:9/api/").expect("base url");
        let client = ReqwestLearningApiClient::new(base_url, Arc::new(InMemoryApiTokenStore::default()));
        let result = client.list_focus_techniques().await;
        assert!(matches!(result, Err(InfraError::Api(_))));
    }
}
