use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A record as returned by `search_read`: field name to raw value
pub type Record = serde_json::Map<String, Value>;

/// Selects the project(s) whose tasks are exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ProjectFilter {
    /// Case-insensitive substring match on the project name
    Name(String),
    /// Exact project id
    Id(i64),
}

impl ProjectFilter {
    /// Odoo search domain selecting the matching projects
    pub fn domain(&self) -> Value {
        match self {
            ProjectFilter::Name(name) => json!([["name", "ilike", name]]),
            ProjectFilter::Id(id) => json!([["id", "=", id]]),
        }
    }
}

impl fmt::Display for ProjectFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectFilter::Name(name) => write!(f, "{{type: name, value: {name:?}}}"),
            ProjectFilter::Id(id) => write!(f, "{{type: id, value: {id}}}"),
        }
    }
}

/// Payload of `common.version()`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerVersion {
    #[serde(default)]
    pub server_version: String,
    #[serde(default)]
    pub server_serie: String,
    #[serde(default)]
    pub server_version_info: Vec<Value>,
}

impl ServerVersion {
    /// Major version number, or 0 when the server does not report one we can read
    pub fn major(&self) -> u32 {
        match self.server_version_info.first() {
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
            Some(Value::String(s)) => s
                .trim_start_matches("saas~")
                .split('.')
                .next()
                .and_then(|major| major.parse().ok())
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Human readable label used in error messages
    pub fn label(&self) -> String {
        if !self.server_serie.is_empty() {
            return self.server_serie.clone();
        }
        let parts: Vec<String> = self
            .server_version_info
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        format!("({})", parts.join(", "))
    }
}

/// Metadata block of an export document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMeta {
    pub exported_at: String,
    pub odoo_url: String,
    pub db: String,
    pub server_serie: String,
    pub server_version_info: Vec<Value>,
    pub field_aliases: BTreeMap<String, String>,
    pub project_ids: Vec<i64>,
    pub task_fields: Vec<String>,
}

/// The complete JSON export: metadata plus raw project and task records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub meta: ExportMeta,
    pub projects: Vec<Record>,
    pub tasks: Vec<Record>,
}
