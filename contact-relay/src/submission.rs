use crate::handler::ContactFormError;
use lettre::message::Mailbox;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A contact form submission as posted by the front end.
///
/// Every field is optional on the wire and may hold any JSON value. Fields which are absent or
/// `null` render as empty text in the notification email; other non-string values render as JSON.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[serde(default, deserialize_with = "as_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "as_text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "as_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "as_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "as_text")]
    pub subject: Option<String>,
    #[serde(rename = "recaptcha_token", default, deserialize_with = "as_text")]
    pub recaptcha_token: Option<String>,
}

fn as_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

impl ContactSubmission {
    pub fn from_payload(payload: &Value) -> Result<Self, ContactFormError> {
        if !payload.is_object() {
            return Err(ContactFormError::InvalidPayload(
                "Request body is not a JSON object".into(),
            ));
        }
        Self::deserialize(payload)
            .map_err(|error| ContactFormError::InvalidPayload(format!("Bad field: {error}")))
    }

    /// Returns the reCAPTCHA token, failing if it is absent or empty.
    pub fn recaptcha_token(&self) -> Result<&str, ContactFormError> {
        match self.recaptcha_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ContactFormError::MissingToken),
        }
    }

    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    /// The submitter as a mailbox suitable for a `Reply-To` header, if their address parses.
    pub fn reply_to_mailbox(&self) -> Option<Mailbox> {
        let address = self.email.as_deref()?.trim().parse().ok()?;
        let name = self.full_name();
        Some(Mailbox::new(
            (!name.is_empty()).then_some(name),
            address,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::ContactSubmission;
    use crate::handler::ContactFormError;
    use googletest::prelude::*;
    use lettre::message::Mailbox;
    use serde_json::json;

    #[test]
    fn reads_all_fields_from_payload() -> Result<()> {
        let payload = json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "phone": "555",
            "subject": "Engines",
            "recaptcha_token": "token"
        });

        let submission = ContactSubmission::from_payload(&payload).unwrap();

        verify_that!(
            submission,
            matches_pattern!(ContactSubmission {
                first_name: some(eq("Ada")),
                last_name: some(eq("Lovelace")),
                email: some(eq("ada@example.com")),
                phone: some(eq("555")),
                subject: some(eq("Engines")),
                recaptcha_token: some(eq("token")),
            })
        )
    }

    #[test]
    fn accepts_payload_with_missing_fields() -> Result<()> {
        let submission = ContactSubmission::from_payload(&json!({"email": "a@b.com"})).unwrap();

        verify_that!(submission.first_name, none())
    }

    #[test]
    fn rejects_payload_which_is_not_an_object() -> Result<()> {
        verify_that!(
            ContactSubmission::from_payload(&json!(["not", "an", "object"])),
            err(matches_pattern!(ContactFormError::InvalidPayload(anything())))
        )
    }

    #[test]
    fn reads_non_string_fields_as_text() -> Result<()> {
        let payload = json!({
            "phone": 5551234,
            "subject": true,
            "firstName": null,
            "recaptcha_token": "token"
        });

        let submission = ContactSubmission::from_payload(&payload).unwrap();

        verify_that!(
            submission,
            matches_pattern!(ContactSubmission {
                phone: some(eq("5551234")),
                subject: some(eq("true")),
                first_name: none(),
            })
        )
    }

    #[test]
    fn empty_token_counts_as_missing() -> Result<()> {
        let submission = ContactSubmission {
            recaptcha_token: Some("".into()),
            ..Default::default()
        };

        verify_that!(
            submission.recaptcha_token(),
            err(eq(ContactFormError::MissingToken))
        )
    }

    #[test]
    fn reply_to_includes_full_name() -> Result<()> {
        let submission = ContactSubmission {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@example.com".into()),
            ..Default::default()
        };

        let mailbox = submission.reply_to_mailbox();

        verify_that!(
            mailbox,
            some(matches_pattern!(Mailbox {
                name: some(eq("Ada Lovelace")),
                email: displays_as(eq("ada@example.com")),
            }))
        )
    }

    #[test]
    fn reply_to_is_omitted_for_unparsable_address() -> Result<()> {
        let submission = ContactSubmission {
            email: Some("not an address".into()),
            ..Default::default()
        };

        verify_that!(submission.reply_to_mailbox(), none())
    }
}
