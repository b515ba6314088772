//! Rename and content-rewrite rules.
//!
//! Rules are bucketed by [`ObjectType`] and evaluated in configured order.
//! Name resolution is first-match: the first rename rule whose pattern
//! matches the object name produces the final name, and later rules are
//! never consulted. Content rewriting is cumulative: every content rule
//! attached to the matched rename rule runs, in order, each over the output
//! of the previous one.
//!
//! The table is compiled once from configuration and never mutated; workers
//! share it behind an `Arc`.

use crate::config::RuleGroupConfig;
use crate::error::{ExportError, Result};
use crate::source::ObjectType;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ExportError::RulePattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// A text substitution applied to generated script bodies.
#[derive(Debug, Clone)]
pub struct ContentRule {
    pattern: Regex,
    replacement: String,
}

impl ContentRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: compile(pattern)?,
            replacement: replacement.into(),
        })
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

/// A rename rule: pattern, name template and attached content rules.
#[derive(Debug, Clone)]
pub struct RenameRule {
    pattern: Regex,
    replacement: String,
    content_rules: Vec<ContentRule>,
}

impl RenameRule {
    pub fn new(
        pattern: &str,
        replacement: impl Into<String>,
        content_rules: Vec<ContentRule>,
    ) -> Result<Self> {
        Ok(Self {
            pattern: compile(pattern)?,
            replacement: replacement.into(),
            content_rules,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Outcome of name resolution for one object.
#[derive(Debug, Clone)]
pub struct RewriteResult<'a> {
    /// Name as found in the catalog.
    pub old_name: String,

    /// Name after the matched rename rule (or the old name).
    pub new_name: String,

    content_rules: Option<&'a [ContentRule]>,
}

impl<'a> RewriteResult<'a> {
    /// Result that keeps the name and rewrites nothing.
    pub fn identity(name: &str) -> Self {
        Self {
            old_name: name.to_string(),
            new_name: name.to_string(),
            content_rules: None,
        }
    }

    pub fn is_renamed(&self) -> bool {
        self.old_name != self.new_name
    }

    /// Whether a rename rule matched (even if it left the name unchanged).
    pub fn has_match(&self) -> bool {
        self.content_rules.is_some()
    }

    /// Apply every attached content rule in order, each over the previous output.
    pub fn rewrite_content(&self, text: &str) -> String {
        match self.content_rules {
            Some(rules) if !rules.is_empty() => rules
                .iter()
                .fold(text.to_string(), |acc, rule| rule.apply(&acc)),
            _ => text.to_string(),
        }
    }
}

/// Immutable, pre-compiled rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    buckets: HashMap<ObjectType, Vec<RenameRule>>,
}

impl RuleTable {
    /// Table with no rules: every lookup is the identity transform.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile the rule groups from configuration.
    ///
    /// Fails on the first malformed pattern so the error surfaces before any
    /// export starts.
    pub fn from_config(groups: &[RuleGroupConfig]) -> Result<Self> {
        let mut buckets: HashMap<ObjectType, Vec<RenameRule>> = HashMap::new();

        for group in groups {
            let bucket = buckets.entry(group.object_type).or_default();
            for def in &group.rules {
                let content = def
                    .content
                    .iter()
                    .map(|c| ContentRule::new(&c.pattern, c.replacement.clone()))
                    .collect::<Result<Vec<_>>>()?;
                bucket.push(RenameRule::new(&def.pattern, def.replacement.clone(), content)?);
            }
            debug!(
                "Loaded {} rename rules for {}",
                group.rules.len(),
                group.object_type
            );
        }

        Ok(Self { buckets })
    }

    /// Append a rule to the end of a bucket.
    pub fn with_rule(mut self, object_type: ObjectType, rule: RenameRule) -> Self {
        self.buckets.entry(object_type).or_default().push(rule);
        self
    }

    /// Number of rules across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the final name of an object using the first matching rule.
    pub fn resolve(&self, name: &str, object_type: ObjectType) -> RewriteResult<'_> {
        let Some(rules) = self.buckets.get(&object_type) else {
            return RewriteResult::identity(name);
        };

        for rule in rules {
            if rule.pattern.is_match(name) {
                let new_name = rule
                    .pattern
                    .replace_all(name, rule.replacement.as_str())
                    .into_owned();
                return RewriteResult {
                    old_name: name.to_string(),
                    new_name,
                    content_rules: Some(&rule.content_rules),
                };
            }
        }

        RewriteResult::identity(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContentRuleConfig, NameRuleConfig};

    fn rule(pattern: &str, replacement: &str) -> RenameRule {
        RenameRule::new(pattern, replacement, Vec::new()).unwrap()
    }

    #[test]
    fn test_no_rules_is_identity() {
        let table = RuleTable::empty();
        let result = table.resolve("Customers", ObjectType::Table);
        assert_eq!(result.new_name, "Customers");
        assert!(!result.is_renamed());
        assert!(!result.has_match());
        assert_eq!(result.rewrite_content("CREATE TABLE x"), "CREATE TABLE x");
    }

    #[test]
    fn test_no_match_in_bucket_is_identity() {
        let table = RuleTable::empty().with_rule(ObjectType::Table, rule("^tmp_", "zz_"));
        let result = table.resolve("Customers", ObjectType::Table);
        assert_eq!(result.new_name, "Customers");
        assert!(!result.has_match());
    }

    #[test]
    fn test_rules_are_bucketed_by_type() {
        let table = RuleTable::empty().with_rule(ObjectType::View, rule("^v_", "vw_"));
        assert_eq!(table.resolve("v_Orders", ObjectType::Table).new_name, "v_Orders");
        assert_eq!(table.resolve("v_Orders", ObjectType::View).new_name, "vw_Orders");
    }

    #[test]
    fn test_first_match_wins() {
        let table = RuleTable::empty()
            .with_rule(ObjectType::Table, rule("^Sales_(.*)$", "S_$1"))
            .with_rule(ObjectType::Table, rule("Sales", "Never"));
        let result = table.resolve("Sales_Orders", ObjectType::Table);
        assert_eq!(result.new_name, "S_Orders");
        assert_eq!(result.old_name, "Sales_Orders");
        assert!(result.is_renamed());
    }

    #[test]
    fn test_later_rule_applies_when_earlier_misses() {
        let table = RuleTable::empty()
            .with_rule(ObjectType::Table, rule("^Archive_", "A_"))
            .with_rule(ObjectType::Table, rule("_\\d{8}$", ""));
        assert_eq!(
            table.resolve("Orders_20240101", ObjectType::Table).new_name,
            "Orders"
        );
    }

    #[test]
    fn test_unanchored_search_replaces_every_match() {
        let table = RuleTable::empty().with_rule(ObjectType::View, rule("x", "y"));
        assert_eq!(table.resolve("axbxc", ObjectType::View).new_name, "aybyc");
    }

    #[test]
    fn test_named_capture_groups() {
        let table = RuleTable::empty().with_rule(
            ObjectType::StoredProcedure,
            rule("^usp_(?P<area>[a-z]+)_(?P<verb>.*)$", "${verb}_${area}"),
        );
        assert_eq!(
            table
                .resolve("usp_billing_Recalculate", ObjectType::StoredProcedure)
                .new_name,
            "Recalculate_billing"
        );
    }

    #[test]
    fn test_content_rules_are_cumulative() {
        // The second rule only matches text introduced by the first.
        let content = vec![
            ContentRule::new("OldDb", "StagingDb").unwrap(),
            ContentRule::new("StagingDb", "ProdDb").unwrap(),
        ];
        let table = RuleTable::empty().with_rule(
            ObjectType::View,
            RenameRule::new("^v_Report$", "Report", content).unwrap(),
        );
        let result = table.resolve("v_Report", ObjectType::View);
        assert_eq!(
            result.rewrite_content("SELECT * FROM OldDb.dbo.T"),
            "SELECT * FROM ProdDb.dbo.T"
        );
    }

    #[test]
    fn test_only_matched_rule_content_applies() {
        let first = RenameRule::new(
            "^a",
            "a",
            vec![ContentRule::new("foo", "bar").unwrap()],
        )
        .unwrap();
        let second = RenameRule::new(
            "^b",
            "b",
            vec![ContentRule::new("foo", "baz").unwrap()],
        )
        .unwrap();
        let table = RuleTable::empty()
            .with_rule(ObjectType::View, first)
            .with_rule(ObjectType::View, second);
        assert_eq!(
            table.resolve("bview", ObjectType::View).rewrite_content("foo"),
            "baz"
        );
    }

    #[test]
    fn test_from_config_preserves_order() {
        let groups = vec![RuleGroupConfig {
            object_type: ObjectType::Table,
            rules: vec![
                NameRuleConfig {
                    pattern: "^T".into(),
                    replacement: "First".into(),
                    content: vec![ContentRuleConfig {
                        pattern: "a".into(),
                        replacement: "b".into(),
                    }],
                },
                NameRuleConfig {
                    pattern: "^T".into(),
                    replacement: "Second".into(),
                    content: Vec::new(),
                },
            ],
        }];
        let table = RuleTable::from_config(&groups).unwrap();
        assert_eq!(table.len(), 2);
        let result = table.resolve("T", ObjectType::Table);
        assert_eq!(result.new_name, "First");
        assert_eq!(result.rewrite_content("aaa"), "bbb");
    }

    #[test]
    fn test_malformed_pattern_is_config_error() {
        let groups = vec![RuleGroupConfig {
            object_type: ObjectType::View,
            rules: vec![NameRuleConfig {
                pattern: "([unclosed".into(),
                replacement: "x".into(),
                content: Vec::new(),
            }],
        }];
        let err = RuleTable::from_config(&groups).unwrap_err();
        assert!(matches!(err, ExportError::RulePattern { .. }));
    }

    #[test]
    fn test_malformed_content_pattern_is_config_error() {
        let err = ContentRule::new("*", "x").unwrap_err();
        assert!(matches!(err, ExportError::RulePattern { ref pattern, .. } if pattern == "*"));
    }
}
