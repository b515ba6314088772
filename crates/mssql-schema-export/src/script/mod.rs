//! Statement classification and script assembly.
//!
//! The scripting engine hands back an ordered list of raw statements per
//! object. This module turns that list into complete batch scripts: an
//! optional `USE [db]` header, the statement bodies, and a trailing batch
//! separator. Tables can be split into three scripts (structure, indexes,
//! constraints) by filtering the body on each statement's kind.
//!
//! Classification is prefix/substring inspection only; nothing here parses
//! SQL.

mod writer;

pub use writer::ScriptWriter;

use crate::rules::RewriteResult;
use crate::source::ObjectType;

/// Batch separator understood by SQL Server tooling.
pub const BATCH_SEPARATOR: &str = "GO";

/// Line ending used in every generated script.
pub const LINE_ENDING: &str = "\r\n";

/// File extension of generated scripts.
pub const SCRIPT_EXTENSION: &str = "sql";

/// Coarse kind of a raw DDL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `SET QUOTED_IDENTIFIER ...` / `SET ANSI_NULLS ...`, emitted everywhere.
    Set,
    /// `CREATE TABLE ...`
    Structural,
    /// Any statement mentioning both `CREATE` and `INDEX`.
    Index,
    /// `ALTER TABLE ... CHECK ...`. Primary keys and defaults do not match.
    Constraint,
    Other,
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Classify a raw (un-normalized, un-rewritten) statement.
pub fn classify(statement: &str) -> StatementKind {
    if statement.starts_with("SET QUOTED_IDENTIFIER") || statement.starts_with("SET ANSI_NULLS") {
        StatementKind::Set
    } else if starts_with_ignore_case(statement, "CREATE TABLE") {
        StatementKind::Structural
    } else if statement.contains("CREATE") && statement.contains("INDEX") {
        StatementKind::Index
    } else if starts_with_ignore_case(statement, "ALTER TABLE") && statement.contains("CHECK ") {
        StatementKind::Constraint
    } else {
        StatementKind::Other
    }
}

/// Normalize line endings and whitespace of one statement body.
///
/// Carriage returns are dropped, line feeds become CRLF, tabs expand to four
/// spaces and trailing spaces/tabs at the very end are trimmed.
pub fn normalize(statement: &str) -> String {
    statement
        .replace('\r', "")
        .replace('\n', LINE_ENDING)
        .replace('\t', "    ")
        .trim_end_matches([' ', '\t'])
        .to_string()
}

/// Whether a table is written as one script or split into three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    #[default]
    Single,
    Split,
}

impl SplitMode {
    /// Only tables are ever split.
    pub fn for_object(object_type: ObjectType, split_tables: bool) -> Self {
        if object_type == ObjectType::Table && split_tables {
            SplitMode::Split
        } else {
            SplitMode::Single
        }
    }
}

/// Which slice of an object's statements a script holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPart {
    All,
    Structure,
    Indexes,
    Constraints,
}

impl ScriptPart {
    /// File name suffix placed between the object name and the extension.
    pub fn suffix(&self) -> &'static str {
        match self {
            ScriptPart::All | ScriptPart::Structure => "",
            ScriptPart::Indexes => "_Ind",
            ScriptPart::Constraints => "_Con",
        }
    }

    fn includes(&self, kind: StatementKind) -> bool {
        match self {
            ScriptPart::All => true,
            ScriptPart::Structure => kind == StatementKind::Structural,
            ScriptPart::Indexes => kind == StatementKind::Index,
            ScriptPart::Constraints => kind == StatementKind::Constraint,
        }
    }
}

/// One assembled script, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub part: ScriptPart,
    pub contents: String,
}

/// Script layout settings shared by every object of an export.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptOptions {
    /// Emit `USE [db]` + `GO` at the top of every script.
    pub include_use_header: bool,
    /// Split tables into structure / index / constraint scripts.
    pub split_tables: bool,
}

/// Assemble one script per part for an object's raw statements.
///
/// Returns one file in [`SplitMode::Single`] and exactly three (structure,
/// indexes, constraints, in that order) in [`SplitMode::Split`].
pub fn assemble(
    statements: &[String],
    db_name: &str,
    include_use_header: bool,
    mode: SplitMode,
    rewrite: &RewriteResult<'_>,
) -> Vec<ScriptFile> {
    let prepared: Vec<(StatementKind, String)> = statements
        .iter()
        .map(|raw| (classify(raw), rewrite.rewrite_content(&normalize(raw))))
        .collect();

    let parts: &[ScriptPart] = match mode {
        SplitMode::Single => &[ScriptPart::All],
        SplitMode::Split => &[
            ScriptPart::Structure,
            ScriptPart::Indexes,
            ScriptPart::Constraints,
        ],
    };

    parts
        .iter()
        .map(|&part| ScriptFile {
            part,
            contents: assemble_part(&prepared, db_name, include_use_header, part),
        })
        .collect()
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(LINE_ENDING);
}

fn assemble_part(
    prepared: &[(StatementKind, String)],
    db_name: &str,
    include_use_header: bool,
    part: ScriptPart,
) -> String {
    let mut out = String::new();

    if include_use_header {
        push_line(&mut out, &format!("USE [{}]", db_name));
        push_line(&mut out, BATCH_SEPARATOR);
    }

    for (kind, body) in prepared {
        if *kind == StatementKind::Set {
            push_line(&mut out, body);
            push_line(&mut out, BATCH_SEPARATOR);
        } else if part.includes(*kind) {
            push_line(&mut out, body);
        }
    }

    push_line(&mut out, BATCH_SEPARATOR);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ContentRule, RenameRule, RuleTable};

    fn statements(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn table_statements() -> Vec<String> {
        statements(&[
            "SET ANSI_NULLS ON",
            "SET QUOTED_IDENTIFIER ON",
            "CREATE TABLE [dbo].[Orders](\n\t[Id] [int] NOT NULL\n)",
            "CREATE NONCLUSTERED INDEX [IX_Orders] ON [dbo].[Orders] ([Id])",
            "ALTER TABLE [dbo].[Orders]  WITH CHECK ADD  CONSTRAINT [CK_Orders] CHECK  (([Id]>(0)))",
        ])
    }

    #[test]
    fn test_classify_kinds() {
        assert_eq!(classify("SET ANSI_NULLS ON"), StatementKind::Set);
        assert_eq!(classify("SET QUOTED_IDENTIFIER OFF"), StatementKind::Set);
        assert_eq!(classify("create table t (a int)"), StatementKind::Structural);
        assert_eq!(
            classify("CREATE UNIQUE INDEX IX ON t (a)"),
            StatementKind::Index
        );
        assert_eq!(
            classify("alter table t WITH CHECK ADD CONSTRAINT c CHECK (a > 0)"),
            StatementKind::Constraint
        );
        assert_eq!(classify("CREATE VIEW v AS SELECT 1"), StatementKind::Other);
    }

    #[test]
    fn test_classify_set_is_case_sensitive() {
        assert_eq!(classify("set ansi_nulls on"), StatementKind::Other);
    }

    #[test]
    fn test_classify_index_heuristic_is_unanchored_and_case_sensitive() {
        assert_eq!(
            classify("IF NOT EXISTS (...) CREATE CLUSTERED INDEX x ON t(a)"),
            StatementKind::Index
        );
        assert_eq!(classify("create index x on t(a)"), StatementKind::Other);
    }

    #[test]
    fn test_classify_primary_and_default_constraints_are_other() {
        assert_eq!(
            classify("ALTER TABLE t ADD CONSTRAINT PK_t PRIMARY KEY (a)"),
            StatementKind::Other
        );
        assert_eq!(
            classify("ALTER TABLE t ADD  CONSTRAINT DF_t DEFAULT ((0)) FOR [a]"),
            StatementKind::Other
        );
    }

    #[test]
    fn test_classify_is_idempotent() {
        let s = "CREATE TABLE [dbo].[T]([a] int)";
        assert_eq!(classify(s), classify(s));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize("a\r\nb\n\tc \t "), "a\r\nb\r\n    c");
        assert_eq!(normalize("  leading kept"), "  leading kept");
        assert_eq!(normalize("x\r"), "x");
    }

    #[test]
    fn test_single_mode_layout() {
        let files = assemble(
            &statements(&["SET ANSI_NULLS ON", "CREATE VIEW v AS\nSELECT 1"]),
            "Sales",
            true,
            SplitMode::Single,
            &RewriteResult::identity("v"),
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].part, ScriptPart::All);
        assert_eq!(
            files[0].contents,
            "USE [Sales]\r\nGO\r\nSET ANSI_NULLS ON\r\nGO\r\nCREATE VIEW v AS\r\nSELECT 1\r\nGO\r\n"
        );
    }

    #[test]
    fn test_single_mode_without_use_header() {
        let files = assemble(
            &table_statements(),
            "Sales",
            false,
            SplitMode::Single,
            &RewriteResult::identity("Orders"),
        );
        assert!(!files[0].contents.contains("USE ["));
        assert!(files[0].contents.starts_with("SET ANSI_NULLS ON\r\nGO\r\n"));
        assert!(files[0].contents.ends_with("GO\r\n"));
    }

    #[test]
    fn test_single_mode_keeps_every_statement_in_order() {
        let files = assemble(
            &table_statements(),
            "Sales",
            true,
            SplitMode::Single,
            &RewriteResult::identity("Orders"),
        );
        let text = &files[0].contents;
        let create = text.find("CREATE TABLE").unwrap();
        let index = text.find("CREATE NONCLUSTERED INDEX").unwrap();
        let check = text.find("CONSTRAINT [CK_Orders]").unwrap();
        assert!(create < index && index < check);
    }

    #[test]
    fn test_split_mode_three_files() {
        let files = assemble(
            &table_statements(),
            "Sales",
            true,
            SplitMode::Split,
            &RewriteResult::identity("Orders"),
        );
        assert_eq!(files.len(), 3);

        let header = "USE [Sales]\r\nGO\r\nSET ANSI_NULLS ON\r\nGO\r\nSET QUOTED_IDENTIFIER ON\r\nGO\r\n";

        assert_eq!(files[0].part, ScriptPart::Structure);
        assert_eq!(
            files[0].contents,
            format!(
                "{}CREATE TABLE [dbo].[Orders](\r\n    [Id] [int] NOT NULL\r\n)\r\nGO\r\n",
                header
            )
        );

        assert_eq!(files[1].part, ScriptPart::Indexes);
        assert_eq!(
            files[1].contents,
            format!(
                "{}CREATE NONCLUSTERED INDEX [IX_Orders] ON [dbo].[Orders] ([Id])\r\nGO\r\n",
                header
            )
        );

        assert_eq!(files[2].part, ScriptPart::Constraints);
        assert!(files[2].contents.starts_with(header));
        assert!(files[2].contents.contains("CONSTRAINT [CK_Orders] CHECK"));
        assert!(!files[2].contents.contains("CREATE TABLE"));
        assert!(!files[2].contents.contains("INDEX"));
    }

    #[test]
    fn test_create_table_only_in_structure_part() {
        let files = assemble(
            &table_statements(),
            "Sales",
            false,
            SplitMode::Split,
            &RewriteResult::identity("Orders"),
        );
        assert!(files[0].contents.contains("CREATE TABLE"));
        assert!(!files[1].contents.contains("CREATE TABLE"));
        assert!(!files[2].contents.contains("CREATE TABLE"));
    }

    #[test]
    fn test_split_mode_only_for_tables() {
        assert_eq!(SplitMode::for_object(ObjectType::Table, true), SplitMode::Split);
        assert_eq!(SplitMode::for_object(ObjectType::Table, false), SplitMode::Single);
        assert_eq!(SplitMode::for_object(ObjectType::View, true), SplitMode::Single);
        assert_eq!(SplitMode::for_object(ObjectType::Trigger, true), SplitMode::Single);
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(ScriptPart::All.suffix(), "");
        assert_eq!(ScriptPart::Structure.suffix(), "");
        assert_eq!(ScriptPart::Indexes.suffix(), "_Ind");
        assert_eq!(ScriptPart::Constraints.suffix(), "_Con");
    }

    #[test]
    fn test_content_rewrite_applies_after_normalization() {
        let table = RuleTable::empty().with_rule(
            ObjectType::View,
            RenameRule::new(
                "^v_(.*)$",
                "$1",
                vec![ContentRule::new(r"\[v_Orders\]", "[Orders]").unwrap()],
            )
            .unwrap(),
        );
        let rewrite = table.resolve("v_Orders", ObjectType::View);
        let files = assemble(
            &statements(&["CREATE VIEW [dbo].[v_Orders]\nAS SELECT 1"]),
            "Sales",
            false,
            SplitMode::Single,
            &rewrite,
        );
        assert_eq!(
            files[0].contents,
            "CREATE VIEW [dbo].[Orders]\r\nAS SELECT 1\r\nGO\r\n"
        );
    }

    #[test]
    fn test_classification_uses_raw_text_not_rewritten() {
        // The rewrite turns the statement into something that looks like an
        // index, but classification already happened on the raw text.
        let table = RuleTable::empty().with_rule(
            ObjectType::Table,
            RenameRule::new(
                "Orders",
                "Orders",
                vec![ContentRule::new("^CREATE TABLE", "CREATE INDEX").unwrap()],
            )
            .unwrap(),
        );
        let rewrite = table.resolve("Orders", ObjectType::Table);
        let files = assemble(
            &statements(&["CREATE TABLE [dbo].[Orders]([Id] int)"]),
            "Sales",
            false,
            SplitMode::Split,
            &rewrite,
        );
        assert!(files[0].contents.contains("CREATE INDEX [dbo].[Orders]"));
        assert_eq!(files[1].contents, "GO\r\n");
    }
}
