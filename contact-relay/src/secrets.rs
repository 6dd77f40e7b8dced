use crate::config::ConfigError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// A source of the credentials the relay needs at startup.
///
/// Each secret is a flat JSON object. Its keys are the names of the environment variables which
/// carry the same values when running outside of AWS.
#[async_trait]
pub trait SecretRepository {
    async fn open() -> Self;

    async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, ConfigError>;
}

/// Reads secrets from the process environment, after loading `.env` if one is present.
pub struct EnvironmentSecretRepository;

#[async_trait]
impl SecretRepository for EnvironmentSecretRepository {
    async fn open() -> Self {
        if let Err(error) = dotenvy::dotenv() {
            debug!("Not loading .env file: {error}");
        }
        Self
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, ConfigError> {
        let environment: Map<String, Value> = std::env::vars_os()
            .filter_map(|(key, value)| {
                Some((key.into_string().ok()?, Value::String(value.into_string().ok()?)))
            })
            .collect();
        serde_json::from_value(Value::Object(environment))
            .map_err(|error| ConfigError::InvalidSecret { name, error })
    }
}

pub struct AwsSecretsManagerSecretRepository(aws_sdk_secretsmanager::Client);

#[async_trait]
impl SecretRepository for AwsSecretsManagerSecretRepository {
    async fn open() -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Ok(url) = std::env::var("AWS_ENDPOINT_URL") {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        Self(aws_sdk_secretsmanager::Client::new(&config))
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, ConfigError> {
        let secret = self
            .0
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|error| ConfigError::SecretBackend {
                name,
                description: DisplayErrorContext(&error).to_string(),
            })?;
        let Some(secret_value) = secret.secret_string() else {
            return Err(ConfigError::MissingSecret(name));
        };
        serde_json::from_str(secret_value).map_err(|error| ConfigError::InvalidSecret { name, error })
    }
}
