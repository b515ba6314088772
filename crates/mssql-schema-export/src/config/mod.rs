//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use crate::rules::RuleTable;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compile the configured rename rules.
    pub fn rule_table(&self) -> Result<RuleTable> {
        RuleTable::from_config(&self.rules)
    }
}

impl ServerConfig {
    /// Validate connection settings.
    pub fn validate(&self) -> Result<()> {
        validation::validate_server(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ObjectType;

    const SAMPLE: &str = r#"
export:
  skip_use_statement: true
  split_table_files: true
  workers: 2
  schemas: [dbo, sales]
rules:
  - type: table
    rules:
      - pattern: "^tbl_(.*)$"
        replacement: "$1"
        content:
          - pattern: "\\[tbl_"
            replacement: "["
  - type: procedure
    rules:
      - pattern: "^sp_"
        replacement: "usp_"
"#;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert!(config.export.skip_use_statement);
        assert!(config.export.split_table_files);
        assert_eq!(config.export.get_workers(), 2);
        assert!(config.export.includes_schema("sales"));
        assert!(!config.export.includes_schema("audit"));
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].object_type, ObjectType::StoredProcedure);
    }

    #[test]
    fn test_rule_table_from_yaml() {
        let table = Config::from_yaml(SAMPLE).unwrap().rule_table().unwrap();
        let result = table.resolve("tbl_Orders", ObjectType::Table);
        assert_eq!(result.new_name, "Orders");
        assert_eq!(
            result.rewrite_content("CREATE TABLE [dbo].[tbl_Orders]"),
            "CREATE TABLE [dbo].[Orders]"
        );
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(!config.export.skip_use_statement);
        assert!(config.export.workers.is_none());
        assert!(config.rules.is_empty());
        assert!(config.export.includes_schema("anything"));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Config::from_yaml("export: [").is_err());
    }

    #[test]
    fn test_unknown_object_type_rejected() {
        let yaml = "rules:\n  - type: sequence\n    rules: []\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_auto_tuning_keeps_explicit_workers() {
        let resources = SystemResources { cpu_cores: 32 };
        let settings = ExportSettings {
            workers: Some(3),
            ..Default::default()
        }
        .with_auto_tuning(&resources);
        assert_eq!(settings.get_workers(), 3);

        let settings = ExportSettings::default().with_auto_tuning(&resources);
        assert_eq!(settings.get_workers(), 16);
    }

    #[test]
    fn test_server_address_with_port() {
        let server = ServerConfig::new("x", "sa", "pw").with_server_address("db01,14330");
        assert_eq!(server.host, "db01");
        assert_eq!(server.port, 14330);

        let server = ServerConfig::new("x", "sa", "pw").with_server_address("db01\\SQLEXPRESS");
        assert_eq!(server.host, "db01\\SQLEXPRESS");
        assert_eq!(server.port, 1433);
    }
}
