//! Catalog enumeration and object scripting.
//!
//! The orchestrator only talks to the [`SessionProvider`] and
//! [`ScriptingSession`] traits. The SQL Server implementation lives in
//! [`mssql`]; tests substitute in-memory sessions.

pub mod ddl;
mod mssql;
mod types;

pub use mssql::{MssqlServer, MssqlSession, MssqlSessionProvider};
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// One scripting context. A session is owned by exactly one worker.
#[async_trait]
pub trait ScriptingSession: Send {
    /// Enumerate exportable objects (tables, views, procedures, functions)
    /// outside the system schemas. Triggers are reached through their tables.
    async fn list_objects(&mut self) -> Result<Vec<CatalogObject>>;

    /// Generate the ordered raw statements that recreate an object.
    async fn script(&mut self, id: ObjectId) -> Result<Vec<String>>;

    /// Implementation kind of a stored procedure, `None` if it no longer exists.
    async fn procedure_kind(&mut self, id: ObjectId) -> Result<Option<ProcedureKind>>;

    /// Triggers defined on a table, in catalog order.
    async fn triggers(&mut self, table: ObjectId) -> Result<Vec<TriggerRef>>;
}

/// Opens independent sessions against one database.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: ScriptingSession + 'static;

    /// Open a new session. Each call yields a session no other worker shares.
    async fn open(&self) -> Result<Self::Session>;
}
