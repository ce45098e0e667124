//! Update payloads and the per-item write plan derived from them.

use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Result, SyncError};
use crate::schema::{FieldType, SchemaSnapshot};
use crate::types::Record;

/// Fields an import may write when the caller gives no allow-list
pub const DEFAULT_ALLOWED_FIELDS: &[&str] = &[
    "description",
    "date_deadline",
    "planned_date_begin",
    "planned_date_end",
    "date_planned_start",
    "date_planned_end",
    "date_start",
    "date_end",
    "planned_hours",
    "allocated_hours",
    "priority",
    "allow_billable",
    "milestone_id",
];

/// Extra fields accepted when creating a task
pub const CREATE_FIELDS: &[&str] = &["name", "project_id", "stage_id", "tag_ids", "parent_id"];

/// Task items to apply, with the project used for creations that name none
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePayload {
    pub items: Vec<Record>,
    pub default_project_id: Option<i64>,
}

impl UpdatePayload {
    /// Accept a list of tasks, an object with a `tasks` list, or a single task object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(entries) => Ok(Self {
                items: into_records(entries)?,
                default_project_id: None,
            }),
            Value::Object(mut object) => match object.remove("tasks") {
                Some(Value::Array(entries)) => Ok(Self {
                    items: into_records(entries)?,
                    default_project_id: default_project(&object),
                }),
                Some(tasks) => {
                    // not a task list, so the whole object is a single task
                    object.insert("tasks".to_string(), tasks);
                    Ok(Self {
                        default_project_id: default_project(&object),
                        items: vec![object],
                    })
                }
                None => Ok(Self {
                    default_project_id: default_project(&object),
                    items: vec![object],
                }),
            },
            _ => Err(SyncError::InvalidPayload(
                "expected a list of task objects or an object containing a 'tasks' list".into(),
            )),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(content)?)
    }
}

fn into_records(entries: Vec<Value>) -> Result<Vec<Record>> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(record) => Ok(record),
            other => Err(SyncError::InvalidPayload(format!(
                "task #{} is not an object: {other}",
                index + 1
            ))),
        })
        .collect()
}

/// First integer of `meta.project_ids`
fn default_project(object: &Record) -> Option<i64> {
    object
        .get("meta")?
        .get("project_ids")?
        .as_array()?
        .iter()
        .find_map(|id| id.as_i64())
}

/// Identity carried by an item's `id` key
#[derive(Debug, Clone, PartialEq)]
pub enum ItemId {
    Existing(i64),
    New,
    Invalid(Value),
}

impl ItemId {
    pub fn of(item: &Record) -> Self {
        match item.get("id") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => ItemId::New,
            Some(value) => match value.as_i64() {
                Some(id) if id > 0 => ItemId::Existing(id),
                _ => ItemId::Invalid(value.clone()),
            },
        }
    }
}

/// Coerce a value to the shape Odoo expects when writing a field of this type
///
/// `None` means the field should be left out of the write.
pub fn normalize_value(field_type: Option<&FieldType>, value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Bool(false) if field_type.is_some_and(FieldType::is_x2many) => None,
        Value::Array(items) => match field_type {
            Some(FieldType::Many2one) => Some(items.first().cloned().unwrap_or(Value::Bool(false))),
            Some(t) if t.is_x2many() => replace_links(items),
            _ => Some(value.clone()),
        },
        other => Some(other.clone()),
    }
}

/// `(6, 0, ids)`: replace every linked record with `ids`
fn replace_links(items: &[Value]) -> Option<Value> {
    if items.is_empty() {
        return Some(json!([[6, 0, []]]));
    }

    let ids: Vec<i64> = if items.iter().all(Value::is_i64) {
        items.iter().filter_map(Value::as_i64).collect()
    } else {
        items
            .iter()
            .filter_map(|item| item.as_array()?.first()?.as_i64())
            .collect()
    };
    if ids.is_empty() {
        return None;
    }

    let mut seen = HashSet::new();
    let unique: Vec<i64> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
    Some(json!([[6, 0, unique]]))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(true) => true,
    }
}

/// What to do with one payload item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemPlan {
    Update { id: i64, values: Record },
    /// Update carrying no writable field
    Skip { id: i64 },
    Create { values: Record },
    Reject { reason: String },
}

/// Field sets an import writes, resolved once against the task schema
pub struct ImportPlanner<'a> {
    schema: &'a SchemaSnapshot,
    editable: HashSet<String>,
    creatable: HashSet<String>,
    name_field: String,
    project_field: Option<String>,
    default_project_id: Option<i64>,
}

impl<'a> ImportPlanner<'a> {
    pub fn new<S: AsRef<str>>(
        schema: &'a SchemaSnapshot,
        allowed: &[S],
        default_project_id: Option<i64>,
    ) -> Self {
        let editable = schema.resolve(allowed).fields;

        let mut create_candidates: Vec<&str> = allowed.iter().map(|field| field.as_ref()).collect();
        create_candidates.extend(CREATE_FIELDS.iter().copied());
        let creatable = schema.resolve(&create_candidates).fields;

        Self {
            schema,
            editable: editable.into_iter().collect(),
            creatable: creatable.into_iter().collect(),
            name_field: schema.map_field("name").unwrap_or("name").to_string(),
            project_field: schema.map_field("project_id").map(str::to_string),
            default_project_id,
        }
    }

    pub fn editable(&self) -> &HashSet<String> {
        &self.editable
    }

    fn collect_values(&self, item: &Record, targets: &HashSet<String>) -> Record {
        let mut values = Record::new();
        for (key, value) in item {
            if key == "id" {
                continue;
            }
            let Some(mapped) = self.schema.map_field(key) else {
                continue;
            };
            if !targets.contains(mapped) {
                continue;
            }
            if let Some(normalized) = normalize_value(self.schema.field_type(mapped), value) {
                values.insert(mapped.to_string(), normalized);
            }
        }
        values
    }

    fn normalized_raw(&self, field: &str, item: &Record, key: &str) -> Option<Value> {
        item.get(key)
            .and_then(|raw| normalize_value(self.schema.field_type(field), raw))
            .filter(is_truthy)
    }

    /// Turn one payload item into an update, a creation or a rejection
    pub fn plan(&self, item: &Record) -> ItemPlan {
        match ItemId::of(item) {
            ItemId::Invalid(value) => ItemPlan::Reject {
                reason: format!("invalid id {value}"),
            },
            ItemId::Existing(id) => {
                let values = self.collect_values(item, &self.editable);
                if values.is_empty() {
                    ItemPlan::Skip { id }
                } else {
                    ItemPlan::Update { id, values }
                }
            }
            ItemId::New => self.plan_create(item),
        }
    }

    fn plan_create(&self, item: &Record) -> ItemPlan {
        let mut values = self.collect_values(item, &self.creatable);

        if !values.get(&self.name_field).is_some_and(is_truthy) {
            match self.normalized_raw(&self.name_field, item, "name") {
                Some(name) => {
                    values.insert(self.name_field.clone(), name);
                }
                None => {
                    let mut keys: Vec<&str> = item.keys().map(String::as_str).collect();
                    keys.sort_unstable();
                    return ItemPlan::Reject {
                        reason: format!("missing name (payload keys: {keys:?})"),
                    };
                }
            }
        }

        if let Some(project_field) = &self.project_field {
            if !values.get(project_field).is_some_and(is_truthy) {
                let project = self
                    .normalized_raw(project_field, item, "project_id")
                    .or_else(|| self.default_project_id.map(Value::from))
                    .filter(is_truthy);
                match project {
                    Some(project) => {
                        values.insert(project_field.clone(), project);
                    }
                    None => {
                        return ItemPlan::Reject {
                            reason: format!("missing {project_field} for task {}", values[&self.name_field]),
                        };
                    }
                }
            }
        }

        ItemPlan::Create { values }
    }
}

impl fmt::Display for ItemPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemPlan::Update { id, values } => {
                let keys: Vec<&str> = values.keys().map(String::as_str).collect();
                write!(f, "update #{id} ({})", keys.join(", "))
            }
            ItemPlan::Skip { id } => write!(f, "skip #{id} (nothing to write)"),
            ItemPlan::Create { values } => write!(f, "create {}", values.get("name").unwrap_or(&Value::Null)),
            ItemPlan::Reject { reason } => write!(f, "reject: {reason}"),
        }
    }
}
