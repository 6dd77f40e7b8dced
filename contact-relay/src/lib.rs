pub mod app;
pub mod config;
pub mod handler;
pub mod mail_body;
pub mod mailer;
pub mod recaptcha;
pub mod secrets;
pub mod submission;
