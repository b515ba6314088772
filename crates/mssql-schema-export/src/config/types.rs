//! Configuration type definitions with auto-tuning based on system resources.

use crate::source::ObjectType;
use serde::{Deserialize, Serialize};
use std::fmt;
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();

        Self {
            cpu_cores: sys.cpus().len().max(1),
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!("System resources: {} CPU cores", self.cpu_cores);
    }
}

/// Root configuration structure (the optional YAML file).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export behavior.
    #[serde(default)]
    pub export: ExportSettings,

    /// Rename rule groups, one per object type.
    #[serde(default)]
    pub rules: Vec<RuleGroupConfig>,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.export = self.export.with_auto_tuning(&resources);
        self
    }
}

/// SQL Server connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host.
    pub host: String,

    /// Server port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Encrypt connection (default: "true").
    #[serde(default = "default_true_string")]
    pub encrypt: String,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_mssql_port(),
            user: user.into(),
            password: password.into(),
            encrypt: default_true_string(),
            trust_server_cert: false,
        }
    }

    /// Split a `host,port` server address into host and port.
    pub fn with_server_address(mut self, address: &str) -> Self {
        match address.rsplit_once(',') {
            Some((host, port)) if port.trim().parse::<u16>().is_ok() => {
                self.host = host.trim().to_string();
                self.port = port.trim().parse().unwrap_or(self.port);
            }
            _ => self.host = address.to_string(),
        }
        self
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Export behavior configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Omit the `USE [db]` header from every script.
    #[serde(default)]
    pub skip_use_statement: bool,

    /// Write tables as separate structure, index and constraint scripts.
    #[serde(default)]
    pub split_table_files: bool,

    /// Number of parallel workers per database. Auto-tuned if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Schemas to export. Empty means every non-system schema.
    #[serde(default)]
    pub schemas: Vec<String>,
}

impl ExportSettings {
    /// Apply auto-tuned defaults based on system resources.
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        // Scripting is round-trip bound; one worker per core, capped at 16.
        if self.workers.is_none() {
            self.workers = Some(resources.cpu_cores.clamp(1, 16));
        }

        info!("Auto-tuned config: workers={}", self.get_workers());
        self
    }

    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(4)
    }

    /// Whether a schema passes the include filter.
    pub fn includes_schema(&self, schema: &str) -> bool {
        self.schemas.is_empty() || self.schemas.iter().any(|s| s == schema)
    }
}

/// Rename rules for one object type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleGroupConfig {
    /// Object type the rules apply to.
    #[serde(rename = "type")]
    pub object_type: ObjectType,

    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<NameRuleConfig>,
}

/// A single rename rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRuleConfig {
    /// Regular expression searched in the object name.
    pub pattern: String,

    /// Replacement template; `$1` / `${name}` reference capture groups.
    pub replacement: String,

    /// Content rewrites applied, in order, to every script of a renamed object.
    #[serde(default)]
    pub content: Vec<ContentRuleConfig>,
}

/// A content rewrite attached to a rename rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRuleConfig {
    pub pattern: String,
    pub replacement: String,
}

// Default value functions for serde
fn default_mssql_port() -> u16 {
    1433
}

fn default_true_string() -> String {
    "true".to_string()
}
