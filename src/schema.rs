//! Field discovery and cross-version field aliasing.
//!
//! A [`SchemaSnapshot`] is fetched once per run from `fields_get` and every
//! question about field presence is answered from it without further calls.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

use crate::types::Record;

pub const TASK_MODEL: &str = "project.task";
pub const PROJECT_MODEL: &str = "project.project";

const TASK_ALIASES: &[(&str, &[&str])] = &[
    ("planned_date_begin", &["date_planned_start"]),
    ("planned_date_end", &["date_planned_end"]),
    ("date_planned_start", &["planned_date_begin"]),
    ("date_planned_end", &["planned_date_end"]),
    ("allocated_hours", &["planned_hours"]),
    ("planned_hours", &["allocated_hours"]),
];

/// Names the same field goes by in other Odoo versions
pub fn aliases(model: &str, field: &str) -> &'static [&'static str] {
    let table = match model {
        TASK_MODEL => TASK_ALIASES,
        _ => return &[],
    };
    table
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, alias)| *alias)
        .unwrap_or(&[])
}

/// Odoo field type, as far as value handling cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Many2one,
    Many2many,
    One2many,
    Boolean,
    Other(String),
}

impl FieldType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "many2one" => FieldType::Many2one,
            "many2many" => FieldType::Many2many,
            "one2many" => FieldType::One2many,
            "boolean" => FieldType::Boolean,
            other => FieldType::Other(other.to_string()),
        }
    }

    pub fn is_x2many(&self) -> bool {
        matches!(self, FieldType::Many2many | FieldType::One2many)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub field_type: FieldType,
    pub label: Option<String>,
}

#[derive(Deserialize)]
struct RawFieldInfo {
    #[serde(rename = "type")]
    field_type: Option<String>,
    string: Option<String>,
}

/// Fields exposed by one model on the live server
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    model: String,
    fields: BTreeMap<String, FieldInfo>,
}

/// Outcome of resolving a candidate list against a snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFields {
    /// Field names to request, in candidate order
    pub fields: Vec<String>,
    /// Candidate name to the alias that replaced it
    pub aliases: BTreeMap<String, String>,
}

impl SchemaSnapshot {
    pub fn new(model: impl Into<String>, fields: BTreeMap<String, FieldInfo>) -> Self {
        Self {
            model: model.into(),
            fields,
        }
    }

    /// Build a snapshot from a `fields_get` response
    pub fn from_fields_get(model: impl Into<String>, response: &Record) -> Self {
        let fields = response
            .iter()
            .map(|(name, raw)| {
                let info = serde_json::from_value::<RawFieldInfo>(raw.clone()).ok();
                let field_type = info
                    .as_ref()
                    .and_then(|i| i.field_type.as_deref())
                    .map(FieldType::parse)
                    .unwrap_or_else(|| FieldType::Other(String::new()));
                let label = info.and_then(|i| i.string);
                (name.clone(), FieldInfo { field_type, label })
            })
            .collect();
        Self::new(model, fields)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field_type(&self, field: &str) -> Option<&FieldType> {
        self.fields.get(field).map(|info| &info.field_type)
    }

    pub fn label(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|info| info.label.as_deref())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Name under which `field` exists here: itself, else its first present alias
    pub fn map_field<'a>(&'a self, field: &'a str) -> Option<&'a str> {
        if self.contains(field) {
            return Some(field);
        }
        aliases(&self.model, field)
            .iter()
            .copied()
            .find(|alias| self.contains(alias))
    }

    /// Keep the candidates that exist, alias-substituted, in order and without duplicates
    pub fn resolve<S: AsRef<str>>(&self, candidates: &[S]) -> ResolvedFields {
        let mut resolved = ResolvedFields::default();
        let mut seen = HashSet::new();

        for candidate in candidates {
            let candidate = candidate.as_ref();
            let Some(mapped) = self.map_field(candidate) else {
                continue;
            };
            if !seen.insert(mapped) {
                continue;
            }
            resolved.fields.push(mapped.to_string());
            if mapped != candidate {
                resolved
                    .aliases
                    .insert(candidate.to_string(), mapped.to_string());
            }
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_schema(names: &[&str]) -> SchemaSnapshot {
        let fields = names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    FieldInfo {
                        field_type: FieldType::Other("char".into()),
                        label: None,
                    },
                )
            })
            .collect();
        SchemaSnapshot::new(TASK_MODEL, fields)
    }

    #[test]
    fn test_exact_name_wins_over_alias() {
        let schema = task_schema(&["planned_hours", "allocated_hours"]);
        assert_eq!(schema.map_field("planned_hours"), Some("planned_hours"));
        assert_eq!(schema.map_field("allocated_hours"), Some("allocated_hours"));
    }

    #[test]
    fn test_alias_used_when_exact_missing() {
        let schema = task_schema(&["id", "allocated_hours", "date_planned_start"]);
        let resolved = schema.resolve(&["id", "planned_hours", "planned_date_begin"]);

        assert_eq!(
            resolved.fields,
            vec!["id", "allocated_hours", "date_planned_start"]
        );
        assert_eq!(resolved.aliases.get("planned_hours").map(String::as_str), Some("allocated_hours"));
        assert_eq!(
            resolved.aliases.get("planned_date_begin").map(String::as_str),
            Some("date_planned_start")
        );
    }

    #[test]
    fn test_unknown_fields_are_dropped() {
        let schema = task_schema(&["id", "name"]);
        let resolved = schema.resolve(&["kanban_state", "id", "planned_hours", "name"]);
        assert_eq!(resolved.fields, vec!["id", "name"]);
        assert!(resolved.aliases.is_empty());
    }

    #[test]
    fn test_duplicates_collapse_to_first_occurrence() {
        // planned_hours and allocated_hours both land on allocated_hours
        let schema = task_schema(&["allocated_hours", "name"]);
        let resolved = schema.resolve(&["planned_hours", "name", "allocated_hours", "name"]);
        assert_eq!(resolved.fields, vec!["allocated_hours", "name"]);
    }

    #[test]
    fn test_resolved_is_ordered_subset_without_duplicates() {
        let schema = task_schema(&["id", "name", "tag_ids", "allocated_hours", "date_planned_end"]);
        let candidate_lists: Vec<Vec<&str>> = vec![
            vec![],
            vec!["nothing", "here"],
            vec!["tag_ids", "id", "name"],
            vec!["planned_hours", "allocated_hours", "planned_date_end", "date_planned_end"],
            vec!["name", "name", "id", "stage_id", "id"],
        ];

        for candidates in candidate_lists {
            let resolved = schema.resolve(&candidates);
            let mut seen = HashSet::new();
            for field in &resolved.fields {
                assert!(schema.contains(field), "{field} not in schema");
                assert!(seen.insert(field.clone()), "{field} duplicated");
            }

            let positions: Vec<usize> = resolved
                .fields
                .iter()
                .map(|field| {
                    candidates
                        .iter()
                        .position(|c| schema.map_field(c) == Some(field.as_str()))
                        .unwrap()
                })
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_other_models_have_no_aliases() {
        assert!(aliases(PROJECT_MODEL, "planned_hours").is_empty());
        assert_eq!(aliases(TASK_MODEL, "planned_hours"), &["allocated_hours"]);
    }

    #[test]
    fn test_from_fields_get_reads_types_and_labels() {
        let response = json!({
            "tag_ids": {"type": "many2many", "string": "Tags"},
            "project_id": {"type": "many2one", "string": "Project"},
            "active": {"type": "boolean"},
            "odd": {}
        });
        let schema = SchemaSnapshot::from_fields_get(TASK_MODEL, response.as_object().unwrap());

        assert_eq!(schema.len(), 4);
        assert_eq!(schema.field_type("tag_ids"), Some(&FieldType::Many2many));
        assert_eq!(schema.field_type("project_id"), Some(&FieldType::Many2one));
        assert_eq!(schema.field_type("active"), Some(&FieldType::Boolean));
        assert_eq!(schema.label("tag_ids"), Some("Tags"));
        assert!(schema.contains("odd"));
        assert_eq!(schema.field_type("missing"), None);
    }
}
