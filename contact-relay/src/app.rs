use crate::handler::{ContactFormError, ContactFormHandler};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const LOCAL_FRONTEND_ORIGIN: &str = "http://localhost:3000";

/// Builds the HTTP surface of the relay.
///
/// With `is_local` set, cross-origin requests from the front end's development server are
/// allowed.
pub fn router(handler: Arc<ContactFormHandler>, is_local: bool) -> Router {
    let router = Router::new()
        .route("/", get(greeting))
        .route("/contact", post(contact))
        .with_state(handler)
        .layer(TraceLayer::new_for_http());
    if is_local {
        router.layer(local_cors_layer())
    } else {
        router
    }
}

fn local_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(HeaderValue::from_static(LOCAL_FRONTEND_ORIGIN))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
}

async fn greeting() -> &'static str {
    "Hello, World!"
}

async fn contact(
    State(handler): State<Arc<ContactFormHandler>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let result = match payload {
        Ok(Json(payload)) => handler.handle(payload).await,
        // A body without a JSON content type is read as an empty form.
        Err(JsonRejection::MissingJsonContentType(_)) => {
            handler.handle(Value::Object(Default::default())).await
        }
        Err(rejection) => Err(ContactFormError::InvalidPayload(rejection.body_text())),
    };
    match result {
        Ok(acknowledgement) => Json(acknowledgement).into_response(),
        Err(error) => {
            error.log();
            error.into_response()
        }
    }
}
