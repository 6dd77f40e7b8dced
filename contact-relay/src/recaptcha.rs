use crate::config::Config;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Verifies reCAPTCHA tokens against the provider's `siteverify` endpoint.
pub struct RecaptchaVerifier {
    client: Client,
    verify_url: String,
    secret: String,
}

/// The provider's verdict on a token, along with everything else it said about it.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub success: bool,
    pub payload: Value,
}

#[derive(Serialize)]
struct RecaptchaVerifyParams<'a> {
    secret: &'a str,
    response: &'a str,
}

impl RecaptchaVerifier {
    pub fn new(config: &Config) -> Result<Self, RecaptchaError> {
        let client = Client::builder()
            .timeout(config.recaptcha_timeout)
            .build()
            .map_err(RecaptchaError::Transport)?;
        Ok(Self {
            client,
            verify_url: config.recaptcha_verify_url.clone(),
            secret: config.recaptcha_secret.clone(),
        })
    }

    pub async fn verify_token(&self, token: &str) -> Result<VerificationResult, RecaptchaError> {
        let response = self
            .client
            .post(&self.verify_url)
            .query(&RecaptchaVerifyParams {
                secret: &self.secret,
                response: token,
            })
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(RecaptchaError::Transport)?;
        let body = response.text().await.map_err(RecaptchaError::Transport)?;
        let result = VerificationResult::from_body(body);
        info!("reCAPTCHA verification: {}", result.payload);
        Ok(result)
    }
}

impl VerificationResult {
    /// Interprets the provider's reply. A reply which is not JSON is kept verbatim as a string
    /// and never counts as success.
    fn from_body(body: String) -> Self {
        let payload = serde_json::from_str(&body).unwrap_or(Value::String(body));
        let success = payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self { success, payload }
    }
}

#[derive(Debug)]
pub enum RecaptchaError {
    Transport(reqwest::Error),
}

impl std::fmt::Display for RecaptchaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecaptchaError::Transport(error) => write!(f, "Transport error: {error}"),
        }
    }
}

impl std::error::Error for RecaptchaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecaptchaError::Transport(error) => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RecaptchaError, RecaptchaVerifier, VerificationResult};
    use crate::{
        config::test_support::{config_for, UNREACHABLE_URL},
        secrets::test_support::FAKE_RECAPTCHA_SECRET,
    };
    use googletest::prelude::*;
    use serde_json::json;
    use test_support::fake_recaptcha::FakeRecaptcha;

    const CORRECT_TOKEN: &str = "correct token";
    const UNUSED_SMTP_URL: &str = "smtp://localhost:1";

    async fn verifier_for(fake_recaptcha: FakeRecaptcha) -> RecaptchaVerifier {
        let running = fake_recaptcha.start().await;
        RecaptchaVerifier::new(&config_for(running.verify_url(), UNUSED_SMTP_URL)).unwrap()
    }

    #[tokio::test]
    async fn reports_success_for_accepted_token() -> Result<()> {
        let verifier = verifier_for(
            FakeRecaptcha::new(FAKE_RECAPTCHA_SECRET).require_token(CORRECT_TOKEN),
        )
        .await;

        let result = verifier.verify_token(CORRECT_TOKEN).await;

        verify_that!(
            result,
            ok(matches_pattern!(VerificationResult {
                success: eq(true),
                payload: anything(),
            }))
        )
    }

    #[tokio::test]
    async fn passes_provider_payload_through_on_rejected_token() -> Result<()> {
        let verifier = verifier_for(
            FakeRecaptcha::new(FAKE_RECAPTCHA_SECRET).require_token(CORRECT_TOKEN),
        )
        .await;

        let result = verifier.verify_token("incorrect token").await;

        verify_that!(
            result,
            ok(eq(VerificationResult {
                success: false,
                payload: json!({
                    "success": false,
                    "error-codes": ["invalid-input-response"]
                }),
            }))
        )
    }

    #[tokio::test]
    async fn rejects_token_when_secret_is_wrong() -> Result<()> {
        let verifier = verifier_for(FakeRecaptcha::new("a different secret")).await;

        let result = verifier.verify_token(CORRECT_TOKEN).await;

        verify_that!(
            result,
            ok(matches_pattern!(VerificationResult {
                success: eq(false),
                payload: eq(json!({
                    "success": false,
                    "error-codes": ["invalid-input-secret"]
                })),
            }))
        )
    }

    #[tokio::test]
    async fn treats_non_json_reply_as_failed_verification() -> Result<()> {
        let verifier = verifier_for(
            FakeRecaptcha::new(FAKE_RECAPTCHA_SECRET).return_invalid_response(),
        )
        .await;

        let result = verifier.verify_token(CORRECT_TOKEN).await;

        verify_that!(
            result,
            ok(eq(VerificationResult {
                success: false,
                payload: json!("Invalid response"),
            }))
        )
    }

    #[tokio::test]
    async fn returns_transport_error_on_server_error_status() -> Result<()> {
        let verifier =
            verifier_for(FakeRecaptcha::new(FAKE_RECAPTCHA_SECRET).return_server_error()).await;

        let result = verifier.verify_token(CORRECT_TOKEN).await;

        verify_that!(
            result,
            err(matches_pattern!(RecaptchaError::Transport(anything())))
        )
    }

    #[tokio::test]
    async fn returns_transport_error_when_provider_is_unreachable() -> Result<()> {
        let verifier =
            RecaptchaVerifier::new(&config_for(UNREACHABLE_URL, UNUSED_SMTP_URL)).unwrap();

        let result = verifier.verify_token(CORRECT_TOKEN).await;

        verify_that!(
            result,
            err(matches_pattern!(RecaptchaError::Transport(anything())))
        )
    }

    #[tokio::test]
    async fn reports_duplicate_use_of_single_use_token() -> Result<()> {
        let verifier = verifier_for(FakeRecaptcha::new(FAKE_RECAPTCHA_SECRET)).await;
        verifier.verify_token(CORRECT_TOKEN).await.unwrap();

        let result = verifier.verify_token(CORRECT_TOKEN).await;

        verify_that!(
            result,
            ok(matches_pattern!(VerificationResult {
                success: eq(false),
                payload: eq(json!({
                    "success": false,
                    "error-codes": ["timeout-or-duplicate"]
                })),
            }))
        )
    }
}
