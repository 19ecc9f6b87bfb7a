use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const EXAMPLE_CONFIG: &str = r#"{
  "services": {
    "AppDashboard": [
      { "port": 8080, "path": "/" }
    ],
    "AdminPanel": [
      { "port": 9090, "path": "/login" }
    ],
    "SecureLogsViewer": [
      { "port": 8443, "path": "/esp" }
    ]
  },
  "hosts": [
    { "address": "192.168.1.10", "services": ["AppDashboard", "AdminPanel"] },
    { "address": "192.168.1.20", "services": ["SecureLogsViewer"] }
  ],
  "webhook_url": "https://example.webhook.office.com/webhookb2/...",
  "mentions": [
    { "name": "Admin", "email": "admin@example.com" }
  ],
  "check_interval_seconds": 30,
  "timeout_seconds": 5
}
"#;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    pub services: HashMap<String, Vec<ServiceEndpoint>>,
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_second_alert_delay")]
    pub second_alert_delay_minutes: u64,
    #[serde(default = "default_subsequent_alert_delay")]
    pub subsequent_alert_delay_minutes: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_check_interval() -> u64 { 30 }
fn default_timeout() -> u64 { 5 }
fn default_retry_count() -> u32 { 3 }
fn default_retry_delay() -> u64 { 2 }
fn default_second_alert_delay() -> u64 { 10 }
fn default_subsequent_alert_delay() -> u64 { 30 }
fn default_max_concurrency() -> usize { 64 }
fn default_state_file() -> PathBuf { PathBuf::from("/etc/service-monitor/last_state.json") }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceEndpoint {
    pub port: u16,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Host {
    pub address: String,
    pub services: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Mention {
    pub name: String,
    pub email: String,
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn second_alert_delay(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.second_alert_delay_minutes as i64)
    }

    pub fn subsequent_alert_delay(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.subsequent_alert_delay_minutes as i64)
    }
}

pub fn load(path: &Path) -> Result<MonitorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: MonitorConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Writes an example config if none exists yet. Returns true when a file was
/// created, in which case the caller should exit and let the operator edit it.
pub fn create_example_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("failed to write example config to {}", path.display()))?;
    Ok(true)
}
