use crate::{
    config::Config,
    mailer::{ContactMailer, MailError},
    recaptcha::{RecaptchaError, RecaptchaVerifier},
    submission::ContactSubmission,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

/// Verifies the reCAPTCHA token of each submission and passes verified submissions on to the
/// operator by email.
pub struct ContactFormHandler {
    recaptcha_verifier: RecaptchaVerifier,
    mailer: Arc<ContactMailer>,
    await_delivery: bool,
}

/// The body of a successful response. Echoes the payload exactly as it was received.
#[derive(Serialize, Debug, PartialEq)]
pub struct ContactAcknowledgement {
    pub message: &'static str,
    pub data: Value,
}

impl ContactFormHandler {
    pub fn new(config: &Config) -> Result<Self, HandlerSetupError> {
        Ok(Self {
            recaptcha_verifier: RecaptchaVerifier::new(config)?,
            mailer: Arc::new(ContactMailer::new(config)?),
            await_delivery: false,
        })
    }

    /// Holds each acknowledgement until the delivery attempt for its email has finished.
    ///
    /// Required on AWS Lambda, which freezes the process as soon as a response is returned.
    /// Delivery failures are still only logged.
    pub fn awaiting_delivery(self) -> Self {
        Self {
            await_delivery: true,
            ..self
        }
    }

    pub async fn handle(&self, payload: Value) -> Result<ContactAcknowledgement, ContactFormError> {
        let submission = ContactSubmission::from_payload(&payload)?;
        self.verify_captcha(submission.recaptcha_token()?).await?;
        let delivery = self.mailer.dispatch(submission);
        if self.await_delivery {
            if let Err(error) = delivery.await {
                error!("Email delivery task failed: {error}");
            }
        }
        Ok(ContactAcknowledgement {
            message: "Data received",
            data: payload,
        })
    }

    async fn verify_captcha(&self, token: &str) -> Result<(), ContactFormError> {
        let result = self
            .recaptcha_verifier
            .verify_token(token)
            .await
            .map_err(|error| {
                ContactFormError::InternalError(format!("Error verifying reCAPTCHA: {error}"))
            })?;
        if result.success {
            Ok(())
        } else {
            Err(ContactFormError::VerificationFailed(result.payload))
        }
    }
}

/// Failure to construct a [`ContactFormHandler`] from the configuration.
#[derive(Debug)]
pub enum HandlerSetupError {
    Recaptcha(RecaptchaError),
    Mail(MailError),
}

impl From<RecaptchaError> for HandlerSetupError {
    fn from(error: RecaptchaError) -> Self {
        HandlerSetupError::Recaptcha(error)
    }
}

impl From<MailError> for HandlerSetupError {
    fn from(error: MailError) -> Self {
        HandlerSetupError::Mail(error)
    }
}

impl std::fmt::Display for HandlerSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerSetupError::Recaptcha(error) => {
                write!(f, "Unable to set up reCAPTCHA verification: {error}")
            }
            HandlerSetupError::Mail(error) => write!(f, "Unable to set up mailer: {error}"),
        }
    }
}

impl std::error::Error for HandlerSetupError {}

#[derive(Debug, PartialEq)]
pub enum ContactFormError {
    InvalidPayload(String),
    MissingToken,
    VerificationFailed(Value),
    InternalError(String),
}

impl ContactFormError {
    pub fn log(&self) {
        match self {
            ContactFormError::InternalError(description) => {
                error!("Internal error processing contact form: {description}");
            }
            ContactFormError::VerificationFailed(details) => {
                warn!("reCAPTCHA verification failed: {details}");
            }
            ContactFormError::InvalidPayload(description) => {
                warn!("Invalid contact form payload: {description}");
            }
            ContactFormError::MissingToken => warn!("Contact form submitted without reCAPTCHA token"),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ContactFormError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ContactFormError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ContactFormError::InvalidPayload(_) => json!({ "error": "Invalid request payload" }),
            ContactFormError::MissingToken => json!({ "error": "reCAPTCHA token is required" }),
            ContactFormError::VerificationFailed(details) => json!({
                "error": "reCAPTCHA verification failed",
                "details": details,
            }),
            // Diagnostics stay in the log.
            ContactFormError::InternalError(_) => json!({ "error": "Internal server error" }),
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::InvalidPayload(description) => {
                write!(f, "Invalid payload: {description}")
            }
            ContactFormError::MissingToken => write!(f, "Missing reCAPTCHA token"),
            ContactFormError::VerificationFailed(details) => {
                write!(f, "reCAPTCHA verification failed: {details}")
            }
            ContactFormError::InternalError(description) => {
                write!(f, "Internal error: {description}")
            }
        }
    }
}

impl std::error::Error for ContactFormError {}
