use crate::config::PagSeguroConfig;
use crate::domain::ports::{ChargeRequest, PixProvider, ProviderCharge};
use crate::error::{CantinaError, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

const DEFAULT_DESCRIPTION: &str = "Cantina Orion";

#[derive(Debug, Serialize, PartialEq)]
struct ChargePayload {
    reference_id: String,
    expiration_date: String,
    value: ChargeValue,
    additional_information: Vec<AdditionalInformation>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChargeValue {
    amount: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct AdditionalInformation {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChargeResponse {
    charge_id: Option<String>,
    txid: Option<String>,
    #[serde(default)]
    qr_codes: Vec<QrCode>,
    #[serde(rename = "brCode")]
    br_code: Option<String>,
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrCode {
    emv: Option<String>,
}

impl From<ChargeResponse> for ProviderCharge {
    fn from(response: ChargeResponse) -> Self {
        let txid = response
            .charge_id
            .or(response.txid)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let br_code = response
            .qr_codes
            .into_iter()
            .next()
            .and_then(|qr| qr.emv)
            .or(response.br_code)
            .or(response.payload)
            .unwrap_or_default();
        Self { txid, br_code }
    }
}

fn charge_payload(request: &ChargeRequest) -> ChargePayload {
    ChargePayload {
        reference_id: request
            .student_id
            .unwrap_or(request.guardian_id)
            .to_string(),
        expiration_date: request
            .expires_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        value: ChargeValue {
            amount: format!("{:.2}", request.amount.round().value()),
        },
        additional_information: vec![AdditionalInformation {
            name: "descricao".to_string(),
            value: request
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        }],
    }
}

/// Pix charges through the PagSeguro API.
#[derive(Clone)]
pub struct PagSeguroClient {
    client: Client,
    config: PagSeguroConfig,
}

impl PagSeguroClient {
    pub fn new(config: PagSeguroConfig, timeout: Duration) -> Result<Self> {
        if config.token.is_empty() {
            return Err(CantinaError::Config("PAGSEGURO_TOKEN missing".to_string()));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            config,
        })
    }
}

#[async_trait]
impl PixProvider for PagSeguroClient {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProviderCharge> {
        let url = format!("{}/charges", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&charge_payload(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %text, "PagSeguro rejected charge");
            return Err(CantinaError::Remote {
                message: format!("PagSeguro error: {text}"),
                code: Some(status.as_u16().to_string()),
            });
        }

        let body: ChargeResponse = response.json().await?;
        Ok(ProviderCharge::from(body))
    }
}
