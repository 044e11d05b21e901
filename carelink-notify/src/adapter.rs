use std::collections::HashMap;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use carelink_adapter::{AdapterError, NotifyAdapter};
use carelink_core::{AdapterResponse, NotifyChannel};

use crate::config::NotifyConfig;
use crate::error::NotifyError;
use crate::template::render;

/// Notification adapter over an SMS HTTP gateway and an SMTP server.
pub struct NotifyGateway {
    config: NotifyConfig,
    client: Client,
    smtp: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl NotifyGateway {
    /// Build the adapter, constructing the SMTP transport when configured.
    pub fn new(config: NotifyConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        let smtp = match &config.smtp {
            Some(smtp_config) => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_config.host)
                        .map_err(|e| AdapterError::Configuration(e.to_string()))?
                        .port(smtp_config.port);
                if let (Some(user), Some(pass)) = (&smtp_config.username, &smtp_config.password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                Some(builder.build())
            }
            None => None,
        };

        Ok(Self {
            config,
            client,
            smtp,
        })
    }

    async fn send_sms(
        &self,
        recipient: &str,
        template: &str,
        fields: &HashMap<String, String>,
    ) -> Result<AdapterResponse, NotifyError> {
        let sms = self
            .config
            .sms
            .as_ref()
            .ok_or(NotifyError::ChannelUnconfigured("sms"))?;
        let rendered = render(template, fields);

        debug!(recipient = %recipient, template = %template, "sending SMS");

        let response = self
            .client
            .post(format!("{}/v1/messages", sms.base_url))
            .bearer_auth(&sms.token)
            .json(&json!({
                "to": recipient,
                "from": sms.from,
                "body": rendered.body,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NotifyError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Gateway(format!("HTTP {status}: {text}")));
        }
        Ok(AdapterResponse::success(json!({
            "channel": "sms",
            "to": recipient,
        })))
    }

    async fn send_email(
        &self,
        recipient: &str,
        template: &str,
        fields: &HashMap<String, String>,
    ) -> Result<AdapterResponse, NotifyError> {
        let smtp_config = self
            .config
            .smtp
            .as_ref()
            .ok_or(NotifyError::ChannelUnconfigured("email"))?;
        let transport = self
            .smtp
            .as_ref()
            .ok_or(NotifyError::ChannelUnconfigured("email"))?;
        let rendered = render(template, fields);

        let from: Mailbox = smtp_config
            .from
            .parse()
            .map_err(|_| NotifyError::BadRecipient(smtp_config.from.clone()))?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| NotifyError::BadRecipient(recipient.to_owned()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(rendered.subject)
            .body(rendered.body)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        debug!(recipient = %recipient, template = %template, "sending email");

        transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        Ok(AdapterResponse::success(json!({
            "channel": "email",
            "to": recipient,
        })))
    }
}

#[async_trait]
impl NotifyAdapter for NotifyGateway {
    #[instrument(skip(self, fields), fields(adapter = "notify", channel = ?channel))]
    async fn send(
        &self,
        channel: NotifyChannel,
        recipient: &str,
        template: &str,
        fields: &HashMap<String, String>,
    ) -> Result<AdapterResponse, AdapterError> {
        let result = match channel {
            NotifyChannel::Sms => self.send_sms(recipient, template, fields).await,
            NotifyChannel::Email => self.send_email(recipient, template, fields).await,
        };
        result.map_err(AdapterError::from)
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        if let Some(sms) = &self.config.sms {
            let response = self
                .client
                .get(format!("{}/v1/health", sms.base_url))
                .bearer_auth(&sms.token)
                .send()
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?;
            if !response.status().is_success() {
                return Err(AdapterError::Connection(format!(
                    "HTTP {}",
                    response.status()
                )));
            }
        }
        if let Some(transport) = &self.smtp {
            let ok = transport
                .test_connection()
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?;
            if !ok {
                return Err(AdapterError::Connection("SMTP NOOP failed".into()));
            }
        }
        Ok(())
    }
}
