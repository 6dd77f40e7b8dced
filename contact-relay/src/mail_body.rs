use crate::submission::ContactSubmission;
use serde::Serialize;
use tinytemplate::{error::Error, format_unescaped, TinyTemplate};

const CONTACT_EMAIL_TEMPLATE_NAME: &str = "contact-email";
const CONTACT_EMAIL_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/contact-email.txt"
));

#[derive(Serialize)]
struct Context<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    phone: &'a str,
    subject: &'a str,
}

/// Renders the plain-text body of the notification email sent to the operator.
pub fn render_contact_email(submission: &ContactSubmission) -> Result<String, Error> {
    let mut tt = TinyTemplate::new();
    // Plain-text body, no HTML escaping.
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(CONTACT_EMAIL_TEMPLATE_NAME, CONTACT_EMAIL_TEMPLATE)?;
    let context = Context {
        first_name: field(&submission.first_name),
        last_name: field(&submission.last_name),
        email: field(&submission.email),
        phone: field(&submission.phone),
        subject: field(&submission.subject),
    };
    tt.render(CONTACT_EMAIL_TEMPLATE_NAME, &context)
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}
