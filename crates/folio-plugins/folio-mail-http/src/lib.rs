//! Delivers contact-form email through a transactional mail HTTP API
//! (Brevo's `/v3/smtp/email` request shape).

use async_trait::async_trait;
use folio_core::models::OutgoingEmail;
use folio_core::traits::Mailer;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    html_content: String,
    text_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<EmailAddress>,
}

pub struct MailConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub sender_email: String,
    pub sender_name: Option<String>,
    /// Every message goes to the site owner
    pub recipient_email: String,
}

pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn body(&self, email: OutgoingEmail) -> SendEmailBody {
        SendEmailBody {
            sender: EmailAddress {
                email: self.config.sender_email.clone(),
                name: self.config.sender_name.clone(),
            },
            to: vec![EmailAddress {
                email: self.config.recipient_email.clone(),
                name: None,
            }],
            subject: email.subject,
            html_content: email.html_body,
            text_content: email.text_body,
            reply_to: email.reply_to.map(|email| EmailAddress { email, name: None }),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        let body = self.body(email);

        let resp = self
            .client
            .post(&self.config.api_url)
            .header("api-key", self.config.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!(subject = %body.subject, "contact email accepted");
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        warn!(%status, "mail API rejected message");
        anyhow::bail!("mail send failed (status={status}): {text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> HttpMailer {
        HttpMailer::new(MailConfig {
            api_url: "http://127.0.0.1:9/v3/smtp/email".into(),
            api_key: SecretString::from("key"),
            sender_email: "site@example.com".into(),
            sender_name: Some("Portfolio".into()),
            recipient_email: "owner@example.com".into(),
        })
    }

    #[test]
    fn body_matches_the_api_shape() {
        let body = mailer().body(OutgoingEmail {
            subject: "Portfolio".into(),
            html_body: "<p>hi</p>".into(),
            text_body: "hi".into(),
            reply_to: Some("ada@example.com".into()),
        });

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sender"]["email"], "site@example.com");
        assert_eq!(json["sender"]["name"], "Portfolio");
        assert_eq!(json["to"][0]["email"], "owner@example.com");
        assert!(json["to"][0].get("name").is_none());
        assert_eq!(json["htmlContent"], "<p>hi</p>");
        assert_eq!(json["textContent"], "hi");
        assert_eq!(json["replyTo"]["email"], "ada@example.com");
    }

    #[test]
    fn reply_to_is_omitted_when_unknown() {
        let body = mailer().body(OutgoingEmail {
            subject: "s".into(),
            html_body: String::new(),
            text_body: String::new(),
            reply_to: None,
        });
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("replyTo").is_none());
    }
}
