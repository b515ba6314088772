//! # mssql-schema-export
//!
//! Exports the schema objects of SQL Server databases into a tree of
//! `.sql` scripts.
//!
//! - **Rename rules** per object type, first match wins, with content
//!   rewrites applied to the generated script
//! - **Deduplication** of objects that rename to the same target
//! - **Parallel export** with one scripting session per worker
//! - **Split table scripts** into structure, index and constraint files
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_schema_export::{Config, Exporter, MssqlServer, ServerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mssql_schema_export::Result<()> {
//!     let config = Config::load("export.yaml")?.with_auto_tuning();
//!     let server = MssqlServer::new(ServerConfig::new("db01", "sa", "secret"));
//!     let exporter = Exporter::new(config.export.clone(), config.rule_table()?, "out");
//!     let summary = exporter
//!         .run(&server, &["Sales".to_string()], CancellationToken::new())
//!         .await?;
//!     println!("Wrote {} objects", summary.objects_written());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod rules;
pub mod script;
pub mod source;

// Re-exports for convenient access
pub use config::{Config, ExportSettings, ServerConfig};
pub use error::{ExportError, Result};
pub use ledger::{Ledger, LedgerKey};
pub use orchestrator::{DatabaseSummary, ExportSummary, Exporter};
pub use rules::{RewriteResult, RuleTable};
pub use script::{assemble, classify, ScriptWriter, SplitMode, StatementKind};
pub use source::{CatalogObject, MssqlServer, ObjectType, ScriptingSession, SessionProvider};
