use serde::Serialize;

use crate::args::MailArgs;

/// Outcome of a single mail-send attempt, per the taxonomy in §4.8/§6.
#[derive(Debug, PartialEq, Eq)]
pub enum MailOutcome {
    /// HTTP 200: the notification was accepted and should be dequeued.
    Delivered,
    /// The mail endpoint's "not deliverable to this project" status
    /// (HTTP 418, reused here the way the source API does): terminal,
    /// dequeue without retrying.
    Undeliverable,
    /// Any other error: transient, the caller should reschedule.
    Transient(String),
}

const UNDELIVERABLE_STATUS: u16 = 418;

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    project_id: &'a str,
    subject: &'a str,
    mime_type: &'a str,
    mail_text: &'a str,
}

/// Thin client over the mail endpoint described in §6.
pub struct MailClient {
    http: reqwest::Client,
    endpoint: String,
    from: String,
}

impl MailClient {
    pub fn new(args: &MailArgs) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: args.mail_endpoint.clone(),
            from: args.mail_from.clone(),
        }
    }

    /// Sends one notification. `mail_text` is assumed to already be rendered
    /// HTML (the wire contract fixes `mime_type = "text/html"`, §6).
    pub async fn send(&self, project_id: &str, subject: &str, mail_text: &str) -> MailOutcome {
        let body = SendEmailRequest {
            project_id,
            subject,
            mime_type: "text/html",
            mail_text,
        };

        let response = match self
            .http
            .post(format!("{}/v1/send-email", self.endpoint))
            .query(&[("from", self.from.as_str())])
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => return MailOutcome::Transient(error.to_string()),
        };

        classify_response(response.status().is_success(), response.status().as_u16())
    }
}

/// Maps the mail endpoint's response status to the §4.8/§6 outcome taxonomy.
fn classify_response(is_success: bool, status_code: u16) -> MailOutcome {
    if is_success {
        MailOutcome::Delivered
    } else if status_code == UNDELIVERABLE_STATUS {
        MailOutcome::Undeliverable
    } else {
        MailOutcome::Transient(format!("mail endpoint returned {status_code}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_is_delivered() {
        assert_eq!(classify_response(true, 200), MailOutcome::Delivered);
    }

    #[test]
    fn status_418_is_undeliverable() {
        assert_eq!(classify_response(false, 418), MailOutcome::Undeliverable);
    }

    #[test]
    fn other_error_statuses_are_transient() {
        assert_eq!(
            classify_response(false, 503),
            MailOutcome::Transient("mail endpoint returned 503".to_string())
        );
    }
}
