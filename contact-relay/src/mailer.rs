use crate::{config::Config, mail_body::render_contact_email, submission::ContactSubmission};
use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        response::Response,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

const FROM_ADDRESS: &str = "Contact form <info@prestonjang.com>";
const EMAIL_SUBJECT: &str = "Contact form Submission";

/// Sends contact form submissions to the operator's mailbox.
pub struct ContactMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl ContactMailer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        info!("Using SMTP server {}", config.smtp_url);
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&config.smtp_url)
            .map_err(MailError::Transport)?
            .authentication(vec![Mechanism::Plain])
            .timeout(Some(config.smtp_timeout));

        // Credentials only ever travel over TLS. A misconfigured plain-text URL makes the server
        // reject the message instead.
        if config.smtp_url.starts_with("smtps://") {
            builder = builder.credentials(Credentials::new(
                config.smtp_credentials.username.clone(),
                config.smtp_credentials.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: FROM_ADDRESS.parse().map_err(MailError::Address)?,
            to: config.operator_mailbox.clone(),
        })
    }

    pub fn build_message(&self, submission: &ContactSubmission) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = submission.reply_to_mailbox() {
            builder = builder.reply_to(reply_to);
        }
        let body = render_contact_email(submission).map_err(MailError::Render)?;
        builder.body(body).map_err(MailError::Build)
    }

    pub async fn send(&self, submission: &ContactSubmission) -> Result<Response, MailError> {
        let message = self.build_message(submission)?;
        self.transport
            .send(message)
            .await
            .map_err(MailError::Transport)
    }

    /// Sends the notification on a detached task. The outcome is only logged.
    pub fn dispatch(self: &Arc<Self>, submission: ContactSubmission) -> JoinHandle<()> {
        let mailer = Arc::clone(self);
        tokio::spawn(async move {
            match mailer.send(&submission).await {
                Ok(response) => info!("Email sent: {}", response.code()),
                Err(error) => error!(
                    "Error sending contact form email from {}: {error}",
                    submission.email.as_deref().unwrap_or("(no address)")
                ),
            }
        })
    }
}

#[derive(Debug)]
pub enum MailError {
    Address(AddressError),
    Render(tinytemplate::error::Error),
    Build(lettre::error::Error),
    Transport(lettre::transport::smtp::Error),
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::Address(error) => write!(f, "Invalid address: {error}"),
            MailError::Render(error) => write!(f, "Error rendering message body: {error}"),
            MailError::Build(error) => write!(f, "Error building message: {error}"),
            MailError::Transport(error) => write!(f, "Error sending message: {error}"),
        }
    }
}

impl std::error::Error for MailError {}
