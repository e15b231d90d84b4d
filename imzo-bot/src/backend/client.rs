//! HTTP implementation of [`Backend`] using reqwest.

use super::types::{
    AskAccepted, AskRejected, AskRequest, FinalAnswer, LoginRequest, LoginResponse,
};
use super::{Backend, JobId, SubmitOutcome};
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult, TransportError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

const LOGIN_PATH: &str = "/users/login";
const ASK_PATH: &str = "/ask";
const FINAL_ANSWER_PATH: &str = "/get/gpt/responce";
const JSON: &str = "application/json";

/// Client for the Imzo AI REST backend.
///
/// Cheap to clone and safe to share between the dispatcher and pollers.
#[derive(Debug, Clone)]
pub struct ImzoClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl ImzoClient {
    /// Create a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Fails when the underlying HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { http, config })
    }

    /// Backend settings this client was built with.
    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    /// Authorization for the polling call.
    fn poll_authorization<'a>(&'a self, user_token: &'a str) -> &'a str {
        self.config
            .poll_auth_override
            .as_deref()
            .unwrap_or(user_token)
    }
}

#[async_trait]
impl Backend for ImzoClient {
    async fn authenticate(&self, login: &str, password: &str) -> BackendResult<String> {
        debug!("authenticating against backend");

        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .header(ACCEPT, JSON)
            .json(&LoginRequest { login, password })
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(BackendError::auth(format!("unexpected status: {status}")));
        }

        let body: LoginResponse = decode(response).await?;
        if body.token.trim().is_empty() {
            return Err(BackendError::auth("empty token in login response"));
        }
        Ok(body.token)
    }

    async fn submit_question(
        &self,
        token: &str,
        room_id: &str,
        question: &str,
    ) -> BackendResult<SubmitOutcome> {
        debug!(room_id, question_len = question.len(), "submitting question");

        let response = self
            .http
            .post(self.endpoint(ASK_PATH))
            .header(ACCEPT, JSON)
            .header(AUTHORIZATION, token)
            .json(&AskRequest {
                chat_room_id: room_id,
                request: question,
            })
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let body = response.bytes().await.map_err(TransportError::from)?;
        Ok(classify_ask(status, &body)?)
    }

    async fn fetch_final(&self, token: &str, job_id: &JobId) -> BackendResult<Option<String>> {
        let url = Url::parse_with_params(
            &self.endpoint(FINAL_ANSWER_PATH),
            &[("id", job_id.as_str())],
        )
        .map_err(|e| TransportError::Malformed(format!("poll url: {e}")))?;

        let response = self
            .http
            .get(url)
            .header(ACCEPT, JSON)
            .header(AUTHORIZATION, self.poll_authorization(token))
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::Status(status).into());
        }

        let body: FinalAnswer = decode(response).await?;
        if body.response.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(body.response))
        }
    }
}

/// Decode a JSON body, keeping read and parse failures apart.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Map an `/ask` response onto the three outcomes.
fn classify_ask(status: StatusCode, body: &[u8]) -> Result<SubmitOutcome, TransportError> {
    match status {
        StatusCode::BAD_REQUEST => {
            let rejected: AskRejected = serde_json::from_slice(body)?;
            debug!(status = %rejected.status, "question rejected by backend");
            Ok(SubmitOutcome::Rejected {
                message: rejected.message,
            })
        }
        StatusCode::OK => {
            let accepted: AskAccepted = serde_json::from_slice(body)?;
            let job_id = Some(accepted.id.trim())
                .filter(|id| !id.is_empty())
                .map(JobId::new);

            if !accepted.message.trim().is_empty() {
                Ok(SubmitOutcome::Answered {
                    answer: accepted.message,
                    job_id,
                })
            } else if let Some(job_id) = job_id {
                Ok(SubmitOutcome::Deferred { job_id })
            } else {
                warn!("ask response carried neither an answer nor a job id");
                Err(TransportError::Malformed(
                    "neither answer nor job id in ask response".to_string(),
                ))
            }
        }
        other => Err(TransportError::Status(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ImzoClient {
        ImzoClient::new(
            BackendConfig::new(server.uri(), "room-7").http_timeout(Duration::from_secs(2)),
        )
        .unwrap()
    }

    #[test]
    fn test_classify_ask() {
        let outcome = classify_ask(StatusCode::OK, br#"{"id":"","message":"hi there"}"#).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Answered {
                answer: "hi there".to_string(),
                job_id: None
            }
        );

        let outcome = classify_ask(StatusCode::OK, br#"{"id":"job1","message":""}"#).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Deferred {
                job_id: JobId::new("job1")
            }
        );

        let outcome = classify_ask(StatusCode::OK, br#"{"id":"job2","message":"draft"}"#).unwrap();
        assert_eq!(outcome.job_id(), Some(&JobId::new("job2")));

        let outcome = classify_ask(
            StatusCode::BAD_REQUEST,
            br#"{"message":"too short","status":"error"}"#,
        )
        .unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                message: "too short".to_string()
            }
        );
    }

    #[test]
    fn test_classify_ask_failures() {
        assert!(matches!(
            classify_ask(StatusCode::OK, br#"{"id":"","message":"  "}"#),
            Err(TransportError::Malformed(_))
        ));
        assert!(matches!(
            classify_ask(StatusCode::OK, b"not json"),
            Err(TransportError::Decode(_))
        ));
        assert!(matches!(
            classify_ask(StatusCode::BAD_REQUEST, b"<html>"),
            Err(TransportError::Decode(_))
        ));
        assert!(matches!(
            classify_ask(StatusCode::UNAUTHORIZED, b"{}"),
            Err(TransportError::Status(StatusCode::UNAUTHORIZED))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .and(body_json(json!({"login": "+998901234567", "password": "secret"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "ok", "token": "tok-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server)
            .authenticate("+998901234567", "secret")
            .await
            .unwrap();
        assert_eq!(token, "tok-1");
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "nope"})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .authenticate("user", "wrongpass")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Auth(_)));
    }

    #[tokio::test]
    async fn test_authenticate_empty_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "ok", "token": ""})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .authenticate("user", "pass")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Auth(_)));
    }

    #[tokio::test]
    async fn test_submit_sends_token_and_room() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .and(header("authorization", "tok-1"))
            .and(body_json(json!({"chat_room_id": "room-7", "request": "explain X"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "job1", "message": ""})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .submit_question("tok-1", "room-7", "explain X")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Deferred {
                job_id: JobId::new("job1")
            }
        );
    }

    #[tokio::test]
    async fn test_submit_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .submit_question("tok", "room-7", "q")
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_fetch_final() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get/gpt/responce"))
            .and(query_param("id", "job1"))
            .and(header("authorization", "tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responce": "final"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get/gpt/responce"))
            .and(query_param("id", "job2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responce": " "})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get/gpt/responce"))
            .and(query_param("id", "job3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(
            client.fetch_final("tok-1", &JobId::new("job1")).await.unwrap(),
            Some("final".to_string())
        );
        assert_eq!(
            client.fetch_final("tok-1", &JobId::new("job2")).await.unwrap(),
            None
        );
        assert!(
            client
                .fetch_final("tok-1", &JobId::new("job3"))
                .await
                .unwrap_err()
                .is_transport()
        );
    }

    #[tokio::test]
    async fn test_fetch_final_uses_override() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get/gpt/responce"))
            .and(header("authorization", "Bearer static"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responce": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ImzoClient::new(
            BackendConfig::new(server.uri(), "room").poll_auth_override("Bearer static"),
        )
        .unwrap();
        let answer = client
            .fetch_final("user-token", &JobId::new("job"))
            .await
            .unwrap();
        assert_eq!(answer.as_deref(), Some("ok"));
    }
}
