use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::schema::{FieldType, SchemaSnapshot};
use crate::types::{ExportDocument, Record};

/// Task fields requested on export when the caller gives none
pub const DEFAULT_TASK_FIELDS: &[&str] = &[
    "id",
    "name",
    "user_id",
    "project_id",
    "stage_id",
    "task_type_id",
    "priority",
    "kanban_state",
    "kanban_state_label",
    "description",
    "tag_ids",
    "milestone_id",
    "parent_id",
    "date_deadline",
    "date_assign",
    "date_start",
    "date_end",
    "planned_hours",
    "allocated_hours",
    "remaining_hours",
    "progress",
    "planned_date_begin",
    "planned_date_end",
    "date_planned_start",
    "date_planned_end",
    "create_date",
    "write_date",
];

/// Project fields read alongside the tasks
pub const PROJECT_FIELDS: &[&str] = &["id", "name", "partner_id", "company_id", "active"];

/// Export document plus the task schema it was read with
#[derive(Debug, Clone)]
pub struct TaskExport {
    pub document: ExportDocument,
    pub task_schema: SchemaSnapshot,
}

impl TaskExport {
    pub fn task_count(&self) -> usize {
        self.document.tasks.len()
    }

    /// Write the JSON document and the CSV table
    pub fn write_files(&self, json_path: &Path, csv_path: &Path) -> Result<()> {
        write_json(json_path, &self.document)?;
        let file = fs::File::create(csv_path)?;
        write_csv(
            file,
            &self.document.meta.task_fields,
            &self.document.tasks,
            Some(&self.task_schema),
        )
    }
}

/// `[id, "Label"]`, the shape Odoo uses for many2one values
fn is_reference_pair(items: &[Value]) -> bool {
    matches!(items, [Value::Number(id), Value::String(_)] if id.is_i64() || id.is_u64())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render one field value as a CSV cell
///
/// Lists of ids are joined with `,`, reference pairs are reduced to their id.
/// Odoo sends `false` for empty non-boolean fields, which becomes an empty cell.
pub fn flatten_value(value: Option<&Value>, field_type: Option<&FieldType>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    match value {
        Value::Array(items) => {
            let reference = matches!(field_type, Some(FieldType::Many2one)) || is_reference_pair(items);
            if reference {
                items.first().map(scalar_text).unwrap_or_default()
            } else {
                items.iter().map(scalar_text).collect::<Vec<_>>().join(",")
            }
        }
        Value::Bool(false) => match field_type {
            Some(FieldType::Boolean) => "false".to_string(),
            _ => String::new(),
        },
        other => scalar_text(other),
    }
}

/// Write one row per task with the given columns
pub fn write_csv<W: Write>(
    writer: W,
    fields: &[String],
    tasks: &[Record],
    schema: Option<&SchemaSnapshot>,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(fields)?;

    for task in tasks {
        let row: Vec<String> = fields
            .iter()
            .map(|field| {
                let field_type = schema.and_then(|s| s.field_type(field));
                flatten_value(task.get(field), field_type)
            })
            .collect();
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_json(path: &Path, document: &ExportDocument) -> Result<()> {
    let content = serde_json::to_string_pretty(document)?;
    fs::write(path, content)?;
    Ok(())
}
