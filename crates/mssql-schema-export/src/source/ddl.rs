//! T-SQL statement generation from catalog metadata.
//!
//! Produces the same statement sequence shape that SQL Server's own
//! scripting tools emit: the `SET` preamble, the object body, then one
//! statement per index and constraint.

use super::types::{Column, TableDefinition};

/// Quote an MSSQL identifier with brackets.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// Statements for a SQL module (view, procedure, function, trigger).
pub fn module_statements(uses_ansi_nulls: bool, uses_quoted_identifier: bool, definition: &str) -> Vec<String> {
    vec![
        format!("SET ANSI_NULLS {}", on_off(uses_ansi_nulls)),
        format!("SET QUOTED_IDENTIFIER {}", on_off(uses_quoted_identifier)),
        definition.to_string(),
    ]
}

/// Format an MSSQL type with proper length/precision, bracketed.
pub fn format_column_type(data_type: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let lower = data_type.to_lowercase();
    let base = quote_ident(data_type);
    match lower.as_str() {
        "float" => {
            if precision > 0 && precision != 53 {
                format!("{}({})", base, precision)
            } else {
                base
            }
        }

        "decimal" | "numeric" => format!("{}({}, {})", base, precision, scale),

        "datetime2" | "time" | "datetimeoffset" => format!("{}({})", base, scale),

        "char" | "varchar" | "nchar" | "nvarchar" => {
            if max_length == -1 {
                format!("{}(max)", base)
            } else {
                // sys.columns reports bytes; n-types store two bytes per character.
                let len = if lower.starts_with('n') {
                    max_length / 2
                } else {
                    max_length
                };
                format!("{}({})", base, len)
            }
        }

        "binary" | "varbinary" => {
            if max_length == -1 {
                format!("{}(max)", base)
            } else {
                format!("{}({})", base, max_length)
            }
        }

        _ => base,
    }
}

fn column_definition(column: &Column) -> String {
    let name = quote_ident(&column.name);

    if let Some(expr) = &column.computed {
        return format!("{} AS {}", name, expr);
    }

    let mut def = format!(
        "{} {}",
        name,
        format_column_type(&column.data_type, column.max_length, column.precision, column.scale)
    );
    if let Some(collation) = &column.collation {
        def.push_str(&format!(" COLLATE {}", collation));
    }
    if let Some((seed, increment)) = column.identity {
        def.push_str(&format!(" IDENTITY({},{})", seed, increment));
    }
    def.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
    def
}

fn key_column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("\t{} ASC", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(",\n")
}

fn referential_action(clause: &str, action: &str) -> Option<String> {
    match action {
        "" | "NO_ACTION" => None,
        other => Some(format!("\n{} {}", clause, other.replace('_', " "))),
    }
}

/// Statements for a table: preamble, CREATE TABLE, indexes, defaults,
/// foreign keys and check constraints.
pub fn table_statements(table: &TableDefinition, uses_ansi_nulls: bool) -> Vec<String> {
    let target = qualified(&table.schema, &table.name);
    let mut statements = vec![
        format!("SET ANSI_NULLS {}", on_off(uses_ansi_nulls)),
        "SET QUOTED_IDENTIFIER ON".to_string(),
    ];

    let mut body: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("\t{}", column_definition(c)))
        .collect();

    if let Some(pk) = &table.primary_key {
        body.push(format!(
            " CONSTRAINT {} PRIMARY KEY {} \n(\n{}\n)",
            quote_ident(&pk.name),
            if pk.is_clustered { "CLUSTERED" } else { "NONCLUSTERED" },
            key_column_list(&pk.columns)
        ));
    }

    statements.push(format!("CREATE TABLE {}(\n{}\n)", target, body.join(",\n")));

    for idx in &table.indexes {
        let mut stmt = format!(
            "CREATE {}{} INDEX {} ON {}\n(\n{}\n)",
            if idx.is_unique { "UNIQUE " } else { "" },
            if idx.is_clustered { "CLUSTERED" } else { "NONCLUSTERED" },
            quote_ident(&idx.name),
            target,
            key_column_list(&idx.columns)
        );
        if !idx.include_cols.is_empty() {
            let include: Vec<String> = idx.include_cols.iter().map(|c| quote_ident(c)).collect();
            stmt.push_str(&format!("\nINCLUDE({})", include.join(",")));
        }
        statements.push(stmt);
    }

    for df in &table.default_constraints {
        statements.push(format!(
            "ALTER TABLE {} ADD  CONSTRAINT {}  DEFAULT {} FOR {}",
            target,
            quote_ident(&df.name),
            df.definition,
            quote_ident(&df.column)
        ));
    }

    for fk in &table.foreign_keys {
        let cols: Vec<String> = fk.columns.iter().map(|c| quote_ident(c)).collect();
        let ref_cols: Vec<String> = fk.ref_columns.iter().map(|c| quote_ident(c)).collect();
        let mut stmt = format!(
            "ALTER TABLE {}  WITH CHECK ADD  CONSTRAINT {} FOREIGN KEY({})\nREFERENCES {} ({})",
            target,
            quote_ident(&fk.name),
            cols.join(", "),
            qualified(&fk.ref_schema, &fk.ref_table),
            ref_cols.join(", ")
        );
        if let Some(clause) = referential_action("ON UPDATE", &fk.on_update) {
            stmt.push_str(&clause);
        }
        if let Some(clause) = referential_action("ON DELETE", &fk.on_delete) {
            stmt.push_str(&clause);
        }
        statements.push(stmt);
        statements.push(format!(
            "ALTER TABLE {} CHECK CONSTRAINT {}",
            target,
            quote_ident(&fk.name)
        ));
    }

    for chk in &table.check_constraints {
        statements.push(format!(
            "ALTER TABLE {}  WITH CHECK ADD  CONSTRAINT {} CHECK  ({})",
            target,
            quote_ident(&chk.name),
            chk.definition
        ));
        statements.push(format!(
            "ALTER TABLE {} CHECK CONSTRAINT {}",
            target,
            quote_ident(&chk.name)
        ));
    }

    statements
}
