//! SQL Server catalog access and scripting over tiberius.

use super::ddl;
use super::types::*;
use super::{ScriptingSession, SessionProvider};
use crate::config::ServerConfig;
use crate::error::{ExportError, Result};
use async_trait::async_trait;
use bb8::{ManageConnection, Pool, PooledConnection};
use std::collections::HashMap;
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: ServerConfig,
    database: String,
}

impl TiberiusConnectionManager {
    fn new(config: ServerConfig, database: impl Into<String>) -> Self {
        Self {
            config,
            database: database.into(),
        }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.config.user, &self.config.password));

        // Encryption settings
        match self.config.encrypt.to_lowercase().as_str() {
            "false" | "no" | "0" | "disable" => {
                config.encryption(EncryptionLevel::NotSupported);
            }
            _ => {
                if self.config.trust_server_cert {
                    config.trust_cert();
                }
                config.encryption(EncryptionLevel::Required);
            }
        }

        config
    }
}

#[async_trait]
impl ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Entry point for one SQL Server instance.
#[derive(Debug, Clone)]
pub struct MssqlServer {
    config: ServerConfig,
}

impl MssqlServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Check `sys.databases` for a database, connecting through `master`.
    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        let manager = TiberiusConnectionManager::new(self.config.clone(), "master");
        let mut client = manager.connect().await?;

        let mut query = Query::new("SELECT CAST(COUNT(*) AS INT) FROM sys.databases WHERE name = @P1");
        query.bind(name);

        let row = query.query(&mut client).await?.into_row().await?;
        let count = row.and_then(|r| r.get::<i32, _>(0)).unwrap_or(0);

        debug!("Database {} present: {}", name, count > 0);
        Ok(count > 0)
    }

    /// Build a session provider for one database, pooled to `workers`
    /// connections. Connections are opened lazily by each worker.
    pub fn session_provider(&self, database: &str, workers: usize) -> MssqlSessionProvider {
        let manager = TiberiusConnectionManager::new(self.config.clone(), database);
        let pool = Pool::builder()
            .max_size(workers.max(1) as u32)
            .min_idle(None)
            .connection_timeout(Duration::from_secs(30))
            .build_unchecked(manager);

        info!(
            "Session pool for {}:{}/{} (pool_size={})",
            self.config.host, self.config.port, database, workers
        );

        MssqlSessionProvider {
            pool,
            database: database.to_string(),
        }
    }
}

/// Hands each worker its own pooled connection.
#[derive(Clone)]
pub struct MssqlSessionProvider {
    pool: Pool<TiberiusConnectionManager>,
    database: String,
}

#[async_trait]
impl SessionProvider for MssqlSessionProvider {
    type Session = MssqlSession;

    async fn open(&self) -> Result<MssqlSession> {
        let conn = self.pool.get_owned().await.map_err(|e| {
            ExportError::pool(e, format!("opening session on database {}", self.database))
        })?;
        Ok(MssqlSession { conn })
    }
}

/// A worker-owned connection. Returned to the pool on drop.
pub struct MssqlSession {
    conn: PooledConnection<'static, TiberiusConnectionManager>,
}

impl MssqlSession {
    fn client(&mut self) -> &mut Client<Compat<TcpStream>> {
        &mut self.conn
    }

    /// Run a query bound to one object id and collect its first result set.
    async fn rows_for(&mut self, sql: &str, id: ObjectId) -> Result<Vec<Row>> {
        let mut query = Query::new(sql);
        query.bind(id.0);
        let stream = query.query(self.client()).await?;
        Ok(stream.into_first_result().await?)
    }

    async fn object_header(&mut self, id: ObjectId) -> Result<Option<(String, String, String)>> {
        let rows = self
            .rows_for(
                r#"
            SELECT s.name, o.name, o.type
            FROM sys.objects o
            JOIN sys.schemas s ON o.schema_id = s.schema_id
            WHERE o.object_id = @P1
        "#,
                id,
            )
            .await?;

        Ok(rows
            .first()
            .map(|row| (text(row, 0), text(row, 1), text(row, 2).trim().to_string())))
    }

    async fn script_module(&mut self, id: ObjectId, label: &str, sys_type: &str) -> Result<Vec<String>> {
        let rows = self
            .rows_for(
                r#"
            SELECT
                m.definition,
                CAST(m.uses_ansi_nulls AS INT),
                CAST(m.uses_quoted_identifier AS INT)
            FROM sys.sql_modules m
            WHERE m.object_id = @P1
        "#,
                id,
            )
            .await?;

        let Some(row) = rows.first() else {
            return Err(match sys_type {
                "PC" | "X" | "FS" | "FT" | "TA" => {
                    ExportError::unscriptable(label, "implemented outside T-SQL")
                }
                _ => ExportError::ObjectNotFound(label.to_string()),
            });
        };

        let Some(definition) = row.get::<&str, _>(0) else {
            return Err(ExportError::unscriptable(label, "definition is encrypted"));
        };

        Ok(ddl::module_statements(flag(row, 1), flag(row, 2), definition))
    }

    async fn script_table(&mut self, id: ObjectId, schema: String, name: String) -> Result<Vec<String>> {
        let uses_ansi_nulls = self
            .rows_for(
                "SELECT CAST(uses_ansi_nulls AS INT) FROM sys.tables WHERE object_id = @P1",
                id,
            )
            .await?
            .first()
            .map(|row| flag(row, 0))
            .unwrap_or(true);

        let mut table = TableDefinition {
            schema,
            name,
            ..Default::default()
        };
        self.load_columns(id, &mut table).await?;
        self.load_indexes(id, &mut table).await?;
        self.load_default_constraints(id, &mut table).await?;
        self.load_foreign_keys(id, &mut table).await?;
        self.load_check_constraints(id, &mut table).await?;

        debug!(
            "Loaded [{}].[{}]: {} columns, {} indexes, {} foreign keys",
            table.schema,
            table.name,
            table.columns.len(),
            table.indexes.len(),
            table.foreign_keys.len()
        );

        Ok(ddl::table_statements(&table, uses_ansi_nulls))
    }

    async fn load_columns(&mut self, id: ObjectId, table: &mut TableDefinition) -> Result<()> {
        let query = r#"
            SELECT
                c.name,
                t.name,
                CAST(c.max_length AS INT),
                CAST(c.precision AS INT),
                CAST(c.scale AS INT),
                CAST(c.is_nullable AS INT),
                CAST(ic.seed_value AS BIGINT),
                CAST(ic.increment_value AS BIGINT),
                cc.definition,
                CASE
                    WHEN c.collation_name <> CAST(DATABASEPROPERTYEX(DB_NAME(), 'Collation') AS NVARCHAR(128))
                    THEN c.collation_name
                END
            FROM sys.columns c
            JOIN sys.types t ON c.user_type_id = t.user_type_id
            LEFT JOIN sys.identity_columns ic ON c.object_id = ic.object_id AND c.column_id = ic.column_id
            LEFT JOIN sys.computed_columns cc ON c.object_id = cc.object_id AND c.column_id = cc.column_id
            WHERE c.object_id = @P1
            ORDER BY c.column_id
        "#;

        for row in self.rows_for(query, id).await? {
            let identity = match (row.get::<i64, _>(6), row.get::<i64, _>(7)) {
                (Some(seed), Some(increment)) => Some((seed, increment)),
                _ => None,
            };
            table.columns.push(Column {
                name: text(&row, 0),
                data_type: text(&row, 1),
                max_length: row.get::<i32, _>(2).unwrap_or(0),
                precision: row.get::<i32, _>(3).unwrap_or(0),
                scale: row.get::<i32, _>(4).unwrap_or(0),
                is_nullable: flag(&row, 5),
                identity,
                computed: row.get::<&str, _>(8).map(str::to_string),
                collation: row.get::<&str, _>(9).map(str::to_string),
            });
        }
        Ok(())
    }

    /// Load the primary key and rowstore indexes. XML, spatial and
    /// columnstore indexes are skipped.
    async fn load_indexes(&mut self, id: ObjectId, table: &mut TableDefinition) -> Result<()> {
        let columns_query = r#"
            SELECT CAST(ic.index_id AS INT), c.name, CAST(ic.is_included_column AS INT)
            FROM sys.index_columns ic
            JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id
            WHERE ic.object_id = @P1
            ORDER BY ic.index_id, ic.key_ordinal, ic.index_column_id
        "#;
        let mut columns = group_by_owner(self.rows_for(columns_query, id).await?.iter().filter_map(
            |row| Some((row.get::<i32, _>(0)?, (text(row, 1), flag(row, 2)))),
        ));

        let query = r#"
            SELECT
                CAST(i.index_id AS INT),
                i.name,
                CAST(i.is_primary_key AS INT),
                CAST(i.is_unique AS INT),
                CAST(CASE WHEN i.type = 1 THEN 1 ELSE 0 END AS INT)
            FROM sys.indexes i
            WHERE i.object_id = @P1
              AND i.is_hypothetical = 0
              AND i.type IN (1, 2)
            ORDER BY i.index_id
        "#;

        for row in self.rows_for(query, id).await? {
            let (keys, included): (Vec<_>, Vec<_>) = row
                .get::<i32, _>(0)
                .and_then(|index_id| columns.remove(&index_id))
                .unwrap_or_default()
                .into_iter()
                .partition(|(_, is_included)| !is_included);
            let keys: Vec<String> = keys.into_iter().map(|(name, _)| name).collect();

            if flag(&row, 2) {
                table.primary_key = Some(PrimaryKey {
                    name: text(&row, 1),
                    is_clustered: flag(&row, 4),
                    columns: keys,
                });
            } else {
                table.indexes.push(Index {
                    name: text(&row, 1),
                    is_unique: flag(&row, 3),
                    is_clustered: flag(&row, 4),
                    columns: keys,
                    include_cols: included.into_iter().map(|(name, _)| name).collect(),
                });
            }
        }
        Ok(())
    }

    async fn load_default_constraints(&mut self, id: ObjectId, table: &mut TableDefinition) -> Result<()> {
        let query = r#"
            SELECT dc.name, c.name, dc.definition
            FROM sys.default_constraints dc
            JOIN sys.columns c ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id
            WHERE dc.parent_object_id = @P1
            ORDER BY c.column_id
        "#;

        for row in self.rows_for(query, id).await? {
            table.default_constraints.push(DefaultConstraint {
                name: text(&row, 0),
                column: text(&row, 1),
                definition: text(&row, 2),
            });
        }
        Ok(())
    }

    async fn load_foreign_keys(&mut self, id: ObjectId, table: &mut TableDefinition) -> Result<()> {
        let columns_query = r#"
            SELECT fkc.constraint_object_id, pc.name, rc.name
            FROM sys.foreign_key_columns fkc
            JOIN sys.columns pc ON fkc.parent_object_id = pc.object_id AND fkc.parent_column_id = pc.column_id
            JOIN sys.columns rc ON fkc.referenced_object_id = rc.object_id AND fkc.referenced_column_id = rc.column_id
            WHERE fkc.parent_object_id = @P1
            ORDER BY fkc.constraint_object_id, fkc.constraint_column_id
        "#;
        let mut columns = group_by_owner(self.rows_for(columns_query, id).await?.iter().filter_map(
            |row| Some((row.get::<i32, _>(0)?, (text(row, 1), text(row, 2)))),
        ));

        let query = r#"
            SELECT
                fk.object_id,
                fk.name,
                SCHEMA_NAME(rt.schema_id),
                rt.name,
                fk.delete_referential_action_desc,
                fk.update_referential_action_desc
            FROM sys.foreign_keys fk
            JOIN sys.tables rt ON fk.referenced_object_id = rt.object_id
            WHERE fk.parent_object_id = @P1
            ORDER BY fk.name
        "#;

        for row in self.rows_for(query, id).await? {
            let (parent, referenced): (Vec<String>, Vec<String>) = row
                .get::<i32, _>(0)
                .and_then(|fk_id| columns.remove(&fk_id))
                .unwrap_or_default()
                .into_iter()
                .unzip();
            table.foreign_keys.push(ForeignKey {
                name: text(&row, 1),
                ref_schema: text(&row, 2),
                ref_table: text(&row, 3),
                columns: parent,
                ref_columns: referenced,
                on_delete: text(&row, 4),
                on_update: text(&row, 5),
            });
        }
        Ok(())
    }

    async fn load_check_constraints(&mut self, id: ObjectId, table: &mut TableDefinition) -> Result<()> {
        let query = r#"
            SELECT name, definition
            FROM sys.check_constraints
            WHERE parent_object_id = @P1
            ORDER BY name
        "#;

        for row in self.rows_for(query, id).await? {
            table.check_constraints.push(CheckConstraint {
                name: text(&row, 0),
                definition: text(&row, 1),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ScriptingSession for MssqlSession {
    async fn list_objects(&mut self) -> Result<Vec<CatalogObject>> {
        let query = r#"
            SELECT s.name, o.name, o.type, o.object_id
            FROM sys.objects o
            JOIN sys.schemas s ON o.schema_id = s.schema_id
            WHERE o.is_ms_shipped = 0
              AND o.type IN ('U', 'V', 'P', 'PC', 'X', 'FN', 'IF', 'TF', 'FS', 'FT')
              AND s.name NOT IN ('sys', 'INFORMATION_SCHEMA')
            ORDER BY s.name, o.name
        "#;

        let rows = self.client().simple_query(query).await?.into_first_result().await?;

        let objects: Vec<CatalogObject> = rows
            .iter()
            .filter_map(|row| {
                let object_type = ObjectType::from_sys_type(row.get::<&str, _>(2)?)?;
                Some(CatalogObject::new(
                    text(row, 0),
                    text(row, 1),
                    object_type,
                    ObjectId(row.get::<i32, _>(3)?),
                ))
            })
            .collect();

        info!("Enumerated {} objects", objects.len());
        Ok(objects)
    }

    async fn script(&mut self, id: ObjectId) -> Result<Vec<String>> {
        let Some((schema, name, sys_type)) = self.object_header(id).await? else {
            return Err(ExportError::ObjectNotFound(format!("object id {}", id)));
        };

        if sys_type == "U" {
            self.script_table(id, schema, name).await
        } else {
            let label = format!("[{}].[{}]", schema, name);
            self.script_module(id, &label, &sys_type).await
        }
    }

    async fn procedure_kind(&mut self, id: ObjectId) -> Result<Option<ProcedureKind>> {
        Ok(self
            .object_header(id)
            .await?
            .and_then(|(_, _, sys_type)| ProcedureKind::from_sys_type(&sys_type)))
    }

    async fn triggers(&mut self, table: ObjectId) -> Result<Vec<TriggerRef>> {
        let query = "SELECT name, object_id FROM sys.triggers WHERE parent_id = @P1 ORDER BY name";
        Ok(self
            .rows_for(query, table)
            .await?
            .iter()
            .filter_map(|row| {
                Some(TriggerRef {
                    name: clean_object_name(row.get::<&str, _>(0)?),
                    id: ObjectId(row.get::<i32, _>(1)?),
                })
            })
            .collect())
    }
}

fn text(row: &Row, idx: usize) -> String {
    row.get::<&str, _>(idx).unwrap_or_default().to_string()
}

fn flag(row: &Row, idx: usize) -> bool {
    row.get::<i32, _>(idx).unwrap_or(0) == 1
}

/// Collect per-owner column rows into ordered lists, keeping row order.
fn group_by_owner<T>(rows: impl IntoIterator<Item = (i32, T)>) -> HashMap<i32, Vec<T>> {
    let mut groups: HashMap<i32, Vec<T>> = HashMap::new();
    for (owner, item) in rows {
        groups.entry(owner).or_default().push(item);
    }
    groups
}
