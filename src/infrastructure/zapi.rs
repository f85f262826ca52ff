use crate::config::ZapiConfig;
use crate::domain::ports::MessageSender;
use crate::error::{CantinaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

/// WhatsApp delivery through a Z-API instance.
#[derive(Clone)]
pub struct ZapiClient {
    client: Client,
    config: ZapiConfig,
}

impl ZapiClient {
    pub fn new(config: ZapiConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/instances/{}/token/{}/message/send-text",
            self.config.base_url.trim_end_matches('/'),
            self.config.instance_id,
            self.config.token
        )
    }
}

#[async_trait]
impl MessageSender for ZapiClient {
    fn is_configured(&self) -> bool {
        !self.config.base_url.is_empty()
            && !self.config.instance_id.is_empty()
            && !self.config.token.is_empty()
            && !self.config.security_token.is_empty()
    }

    async fn send_text(&self, to_phone: &str, message: &str) -> Result<()> {
        if !self.is_configured() {
            return Err(CantinaError::Config(
                "missing Z-API configuration".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("Client-Token", &self.config.security_token)
            .json(&SendTextRequest {
                phone: to_phone,
                message,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(phone = %to_phone, "whatsapp message sent");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(phone = %to_phone, status = status.as_u16(), body = %body, "Z-API rejected message");
            Err(CantinaError::Remote {
                message: format!("Z-API error {}", status.as_u16()),
                code: None,
            })
        }
    }
}
