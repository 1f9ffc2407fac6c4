//! Receiver configuration schema — consumed by the Target Registry (§4.F) and
//! the Publishing Fanout (§4.G), never parsed from YAML/HTTP here (that lives
//! in the external routing config parser, out of scope for this core).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_max_alerts() -> u32 {
    0
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TlsConfig {
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub server_name: Option<String>,
    pub insecure_skip_verify: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ca_file: None,
            cert_file: None,
            key_file: None,
            server_name: None,
            insecure_skip_verify: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct HttpConfigOptions {
    pub proxy_url: Option<String>,
    pub tls_config: TlsConfig,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfigOptions {
    fn default() -> Self {
        Self {
            proxy_url: None,
            tls_config: TlsConfig::default(),
            follow_redirects: true,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// One concrete configured channel within a receiver — the granularity at
/// which retries and circuit breakers apply (a "dispatch unit").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DispatchConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub send_resolved: bool,
    #[serde(default = "default_max_alerts")]
    pub max_alerts: u32,
    #[serde(default)]
    pub http_config: HttpConfigOptions,
}

pub type WebhookConfig = DispatchConfig;
pub type ChatConfig = DispatchConfig;
pub type IncidentConfig = DispatchConfig;
pub type EmailConfig = DispatchConfig;

/// Identity is `name` (1..255, alphanumeric + `-_`). At least one config list
/// must be non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Receiver {
    pub name: String,
    pub webhook_configs: Vec<WebhookConfig>,
    pub chat_configs: Vec<ChatConfig>,
    pub incident_configs: Vec<IncidentConfig>,
    pub email_configs: Vec<EmailConfig>,
}

impl Default for Receiver {
    fn default() -> Self {
        Self {
            name: String::new(),
            webhook_configs: Vec::new(),
            chat_configs: Vec::new(),
            incident_configs: Vec::new(),
            email_configs: Vec::new(),
        }
    }
}

/// The target type a dispatch unit belongs to, used in audit logging and
/// payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Webhook,
    Chat,
    Incident,
    Email,
}

impl Receiver {
    pub fn has_valid_name(&self) -> bool {
        !self.name.is_empty()
            && self.name.len() <= 255
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    pub fn is_non_empty(&self) -> bool {
        !self.webhook_configs.is_empty()
            || !self.chat_configs.is_empty()
            || !self.incident_configs.is_empty()
            || !self.email_configs.is_empty()
    }

    /// Enumerates every concrete dispatch unit this receiver holds, each
    /// tagged with its target type and positional index within that list —
    /// the `config_index` half of the circuit breaker key in §4.G.
    pub fn dispatch_units(&self) -> Vec<(TargetType, usize, &DispatchConfig)> {
        let mut units = Vec::new();
        for (i, c) in self.webhook_configs.iter().enumerate() {
            units.push((TargetType::Webhook, i, c));
        }
        for (i, c) in self.chat_configs.iter().enumerate() {
            units.push((TargetType::Chat, i, c));
        }
        for (i, c) in self.incident_configs.iter().enumerate() {
            units.push((TargetType::Incident, i, c));
        }
        for (i, c) in self.email_configs.iter().enumerate() {
            units.push((TargetType::Email, i, c));
        }
        units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_name_validation() {
        let mut r = Receiver { name: "pagerduty-prod_1".to_string(), ..Default::default() };
        assert!(r.has_valid_name());
        r.name = "bad name!".to_string();
        assert!(!r.has_valid_name());
    }

    #[test]
    fn dispatch_units_enumerate_all_config_lists() {
        let r = Receiver {
            name: "multi".to_string(),
            webhook_configs: vec![DispatchConfig {
                url: "https://example.com/a".to_string(),
                method: "POST".to_string(),
                headers: Default::default(),
                send_resolved: true,
                max_alerts: 0,
                http_config: HttpConfigOptions::default(),
            }],
            chat_configs: vec![DispatchConfig {
                url: "https://example.com/b".to_string(),
                method: "POST".to_string(),
                headers: Default::default(),
                send_resolved: true,
                max_alerts: 0,
                http_config: HttpConfigOptions::default(),
            }],
            incident_configs: vec![],
            email_configs: vec![],
        };
        let units = r.dispatch_units();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].0, TargetType::Webhook);
        assert_eq!(units[1].0, TargetType::Chat);
    }
}
