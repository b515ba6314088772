//! Catalog and schema metadata types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of schema object handled by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Table,
    View,
    #[serde(alias = "procedure")]
    StoredProcedure,
    #[serde(alias = "function")]
    UserDefinedFunction,
    Trigger,
}

impl ObjectType {
    /// Map a `sys.objects.type` code to an object type.
    ///
    /// Procedures of every implementation kind map to `StoredProcedure`; the
    /// orchestrator decides later whether the body is scriptable.
    pub fn from_sys_type(code: &str) -> Option<Self> {
        match code.trim() {
            "U" => Some(Self::Table),
            "V" => Some(Self::View),
            "P" | "PC" | "X" => Some(Self::StoredProcedure),
            "FN" | "IF" | "TF" | "FS" | "FT" => Some(Self::UserDefinedFunction),
            "TR" | "TA" => Some(Self::Trigger),
            _ => None,
        }
    }

    /// Output subdirectory for scripts of this type.
    pub fn folder_code(&self) -> &'static str {
        match self {
            Self::Table => "T",
            Self::View => "V",
            Self::StoredProcedure => "P",
            Self::UserDefinedFunction => "F",
            Self::Trigger => "Tr",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "Table",
            Self::View => "View",
            Self::StoredProcedure => "StoredProcedure",
            Self::UserDefinedFunction => "UserDefinedFunction",
            Self::Trigger => "Trigger",
        };
        f.write_str(name)
    }
}

/// Opaque scripting identifier (`sys.objects.object_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub i32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A schema object discovered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObject {
    /// Schema name.
    pub schema: String,

    /// Object name, with embedded line breaks removed.
    pub name: String,

    /// Declared object type.
    pub object_type: ObjectType,

    /// Identifier passed back to the scripting engine.
    pub id: ObjectId,
}

impl CatalogObject {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        object_type: ObjectType,
        id: ObjectId,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: clean_object_name(&name.into()),
            object_type,
            id,
        }
    }

    /// Get the bracket-quoted two-part name.
    pub fn full_name(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }
}

/// Remove CR/LF pairs some catalogs leave inside object names.
pub fn clean_object_name(name: &str) -> String {
    name.replace("\r\n", "")
}

/// A trigger attached to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRef {
    pub name: String,
    pub id: ObjectId,
}

/// Implementation kind of a stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    /// Plain T-SQL body, scriptable as text.
    TransactSql,
    /// CLR assembly procedure.
    Clr,
    /// Extended stored procedure (DLL entry point).
    Extended,
}

impl ProcedureKind {
    pub fn from_sys_type(code: &str) -> Option<Self> {
        match code.trim() {
            "P" => Some(Self::TransactSql),
            "PC" => Some(Self::Clr),
            "X" => Some(Self::Extended),
            _ => None,
        }
    }

    pub fn is_scriptable(&self) -> bool {
        matches!(self, Self::TransactSql)
    }
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TransactSql => "TransactSql",
            Self::Clr => "SqlClr",
            Self::Extended => "Extended",
        };
        f.write_str(name)
    }
}

/// Full table definition used to generate CREATE TABLE scripts.
#[derive(Debug, Clone, Default)]
pub struct TableDefinition {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Primary key, if any.
    pub primary_key: Option<PrimaryKey>,

    /// Non-primary key indexes.
    pub indexes: Vec<Index>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,

    /// Check constraints.
    pub check_constraints: Vec<CheckConstraint>,

    /// Default constraints.
    pub default_constraints: Vec<DefaultConstraint>,
}

/// Column metadata.
#[derive(Debug, Clone, Default)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type (e.g., "int", "varchar", "datetime2").
    pub data_type: String,

    /// Maximum length in bytes for string/binary types (-1 for max).
    pub max_length: i32,

    /// Numeric precision.
    pub precision: i32,

    /// Numeric scale.
    pub scale: i32,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Identity seed and increment, when the column is an identity column.
    pub identity: Option<(i64, i64)>,

    /// Computed column expression.
    pub computed: Option<String>,

    /// Explicit collation for character columns.
    pub collation: Option<String>,
}

/// Primary key constraint.
#[derive(Debug, Clone)]
pub struct PrimaryKey {
    pub name: String,
    pub columns: Vec<String>,
    pub is_clustered: bool,
}

/// Index metadata.
#[derive(Debug, Clone)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Indexed column names.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,

    /// Whether the index is clustered.
    pub is_clustered: bool,

    /// Included columns (non-key).
    pub include_cols: Vec<String>,
}

/// Foreign key metadata.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Source column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced schema name.
    pub ref_schema: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,

    /// ON DELETE action (`sys.foreign_keys` description, e.g. `NO_ACTION`).
    pub on_delete: String,

    /// ON UPDATE action.
    pub on_update: String,
}

/// Check constraint metadata.
#[derive(Debug, Clone)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,

    /// Constraint definition (SQL expression).
    pub definition: String,
}

/// Default constraint metadata.
#[derive(Debug, Clone)]
pub struct DefaultConstraint {
    pub name: String,
    pub column: String,
    pub definition: String,
}
