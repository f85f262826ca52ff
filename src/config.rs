use crate::application::notifications::NotificationSettings;
use crate::application::outbox::DEFAULT_BATCH_SIZE;
use crate::error::{CantinaError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "CANTINA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "cantina.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub zapi: ZapiConfig,
    pub pagseguro: PagSeguroConfig,
    pub outbox: OutboxConfig,
    pub notifications: NotificationsConfig,
}

/// PostgREST-style backend holding the authoritative wallets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub service_key: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.service_key.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZapiConfig {
    pub base_url: String,
    pub instance_id: String,
    pub token: String,
    pub security_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagSeguroConfig {
    pub base_url: String,
    pub token: String,
    pub webhook_secret: Option<String>,
}

impl Default for PagSeguroConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pix.api.pagseguro.com".to_string(),
            token: String::new(),
            webhook_secret: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub batch_size: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub from_name: String,
    pub app_base_url: Option<String>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            from_name: "Cantina Orion".to_string(),
            app_base_url: None,
        }
    }
}

impl From<&NotificationsConfig> for NotificationSettings {
    fn from(config: &NotificationsConfig) -> Self {
        Self {
            from_name: config.from_name.clone(),
            app_base_url: config.app_base_url.clone(),
        }
    }
}

impl Config {
    /// Loads `$CANTINA_CONFIG` (default `cantina.toml`), then applies environment overrides.
    ///
    /// A missing file is not an error; the config is then built from
    /// defaults and the environment alone.
    pub fn load() -> Result<Self> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|name| env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(CantinaError::Config(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CantinaError::Config(format!("invalid config: {e}")))
    }

    /// Overrides file values with whatever `lookup` returns for the known variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BACKEND_URL") {
            self.backend.url = v;
        }
        if let Some(v) = lookup("BACKEND_SERVICE_KEY") {
            self.backend.service_key = v;
        }
        if let Some(v) = lookup("BACKEND_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            self.backend.timeout_secs = secs;
        }

        if let Some(v) = lookup("ZAPI_BASE_URL") {
            self.zapi.base_url = v;
        }
        if let Some(v) = lookup("ZAPI_INSTANCE_ID") {
            self.zapi.instance_id = v;
        }
        if let Some(v) = lookup("ZAPI_TOKEN") {
            self.zapi.token = v;
        }
        if let Some(v) = lookup("ZAPI_SECURITY_TOKEN") {
            self.zapi.security_token = v;
        }

        if let Some(v) = lookup("PAGSEGURO_BASE_URL") {
            self.pagseguro.base_url = v;
        }
        if let Some(v) = lookup("PAGSEGURO_TOKEN") {
            self.pagseguro.token = v;
        }
        if let Some(v) = lookup("PAGSEGURO_WEBHOOK_SECRET") {
            self.pagseguro.webhook_secret = Some(v);
        }

        if let Some(v) = lookup("OUTBOX_BATCH_SIZE")
            && let Ok(n) = v.parse()
        {
            self.outbox.batch_size = n;
        }

        if let Some(v) = lookup("WHATSAPP_FROM_NAME") {
            self.notifications.from_name = v;
        }
        if let Some(v) = lookup("APP_BASE_URL") {
            self.notifications.app_base_url = Some(v);
        }
    }
}
