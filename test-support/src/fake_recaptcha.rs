use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::{
    borrow::Cow,
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tokio::net::TcpListener;

const VERIFY_PATH: &str = "/recaptcha/api/siteverify";

/// Stands in for the reCAPTCHA `siteverify` endpoint.
///
/// By default every token is accepted exactly once, as the real service does.
#[derive(Clone)]
pub struct FakeRecaptcha {
    required_secret: Cow<'static, str>,
    required_token: Option<String>,
    return_invalid_response: bool,
    return_server_error: bool,
    used_tokens: Arc<Mutex<HashSet<String>>>,
    request_count: Arc<AtomicUsize>,
}

/// A [`FakeRecaptcha`] serving on a local port for the rest of the test.
pub struct RunningFakeRecaptcha {
    verify_url: String,
    request_count: Arc<AtomicUsize>,
}

#[derive(Deserialize)]
struct VerifyRequestParams {
    secret: String,
    response: String,
}

impl FakeRecaptcha {
    pub fn new(required_secret: impl Into<Cow<'static, str>>) -> Self {
        Self {
            required_secret: required_secret.into(),
            required_token: None,
            return_invalid_response: false,
            return_server_error: false,
            used_tokens: Default::default(),
            request_count: Default::default(),
        }
    }

    pub fn require_token(self, required_token: impl AsRef<str>) -> Self {
        Self {
            required_token: Some(required_token.as_ref().into()),
            ..self
        }
    }

    pub fn return_invalid_response(self) -> Self {
        Self {
            return_invalid_response: true,
            ..self
        }
    }

    pub fn return_server_error(self) -> Self {
        Self {
            return_server_error: true,
            ..self
        }
    }

    pub async fn start(self) -> RunningFakeRecaptcha {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let request_count = self.request_count.clone();
        let app = Router::new()
            .route(VERIFY_PATH, post(verify))
            .with_state(self);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        RunningFakeRecaptcha {
            verify_url: format!("http://{address}{VERIFY_PATH}"),
            request_count,
        }
    }
}

impl RunningFakeRecaptcha {
    pub fn verify_url(&self) -> String {
        self.verify_url.clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

async fn verify(
    State(state): State<FakeRecaptcha>,
    Query(params): Query<VerifyRequestParams>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    debug!("Got verification request for token {}", params.response);
    if state.return_server_error {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
    } else if state.return_invalid_response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "Invalid response",
        )
            .into_response()
    } else if params.secret != state.required_secret {
        failure("invalid-input-secret")
    } else if state
        .required_token
        .as_ref()
        .is_some_and(|token| *token != params.response)
    {
        failure("invalid-input-response")
    } else if !state.used_tokens.lock().unwrap().insert(params.response) {
        failure("timeout-or-duplicate")
    } else {
        Json(json!({
            "success": true,
            "challenge_ts": "2024-01-01T00:00:00Z",
            "hostname": "localhost"
        }))
        .into_response()
    }
}

fn failure(error_code: &str) -> Response {
    Json(json!({
        "success": false,
        "error-codes": [error_code]
    }))
    .into_response()
}
