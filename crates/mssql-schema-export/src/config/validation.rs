//! Configuration validation.

use super::{Config, ServerConfig};
use crate::error::{ExportError, Result};
use std::collections::HashSet;

/// Validate the export configuration.
pub fn validate(config: &Config) -> Result<()> {
    if let Some(0) = config.export.workers {
        return Err(ExportError::Config(
            "export.workers must be at least 1".into(),
        ));
    }

    if config.export.schemas.iter().any(|s| s.trim().is_empty()) {
        return Err(ExportError::Config(
            "export.schemas must not contain empty names".into(),
        ));
    }

    // Groups are keyed by type; a second group would silently reorder rules.
    let mut seen = HashSet::new();
    for group in &config.rules {
        if !seen.insert(group.object_type) {
            return Err(ExportError::Config(format!(
                "rules: duplicate group for type {}",
                group.object_type
            )));
        }

        for (idx, rule) in group.rules.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(ExportError::Config(format!(
                    "rules[{}][{}].pattern is required",
                    group.object_type, idx
                )));
            }
            if rule.content.iter().any(|c| c.pattern.is_empty()) {
                return Err(ExportError::Config(format!(
                    "rules[{}][{}].content pattern is required",
                    group.object_type, idx
                )));
            }
        }
    }

    Ok(())
}

/// Validate server connection settings.
pub fn validate_server(server: &ServerConfig) -> Result<()> {
    if server.host.is_empty() {
        return Err(ExportError::Config("server host is required".into()));
    }
    if server.user.is_empty() {
        return Err(ExportError::Config("server user is required".into()));
    }
    if server.port == 0 {
        return Err(ExportError::Config("server port must be non-zero".into()));
    }
    Ok(())
}
