use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::backend::{Backend, Session};
use crate::config::OdooConfig;
use crate::error::{Result, SyncError};
use crate::export::{TaskExport, PROJECT_FIELDS};
use crate::import::{ImportPlanner, ItemPlan, UpdatePayload};
use crate::schema::{ResolvedFields, SchemaSnapshot, PROJECT_MODEL, TASK_MODEL};
use crate::types::{ExportDocument, ExportMeta, ProjectFilter, Record, ServerVersion};

/// Oldest Odoo major version the field handling is written for
pub const MINIMUM_SUPPORTED_MAJOR: u32 = 18;

/// Authenticated client moving tasks between Odoo and local files
pub struct TaskSync<B: Backend> {
    backend: B,
    session: Session,
    url: String,
    server: ServerVersion,
}

impl<B: Backend> TaskSync<B> {
    /// Check the server version and log in
    pub async fn connect(backend: B, config: &OdooConfig) -> Result<Self> {
        let server = backend.version().await?;
        let major = server.major();
        if major != 0 && major < MINIMUM_SUPPORTED_MAJOR {
            return Err(SyncError::UnsupportedVersion {
                found: server.label(),
                minimum: MINIMUM_SUPPORTED_MAJOR,
            });
        }

        let uid = backend
            .authenticate(&config.db, &config.user, &config.password)
            .await?
            .ok_or_else(|| SyncError::AuthenticationFailed {
                user: config.user.clone(),
                db: config.db.clone(),
            })?;

        info!(uid, server = %server.label(), "connected to {}", config.url);

        Ok(Self {
            backend,
            session: Session {
                db: config.db.clone(),
                uid,
                password: config.password.clone(),
            },
            url: config.url.clone(),
            server,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn server(&self) -> &ServerVersion {
        &self.server
    }

    pub fn uid(&self) -> i64 {
        self.session.uid
    }

    async fn execute(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: serde_json::Map<String, Value>,
    ) -> Result<Value> {
        debug!(model, method, "execute_kw");
        self.backend
            .execute_kw(&self.session, model, method, args, kwargs)
            .await
    }

    /// Fetch the fields a model exposes on this server
    pub async fn schema(&self, model: &str) -> Result<SchemaSnapshot> {
        let mut kwargs = serde_json::Map::new();
        kwargs.insert("attributes".into(), json!(["string", "type"]));

        let value = self.execute(model, "fields_get", Vec::new(), kwargs).await?;
        let fields = value
            .as_object()
            .ok_or_else(|| SyncError::Protocol(format!("fields_get on {model} did not return an object")))?;

        Ok(SchemaSnapshot::from_fields_get(model, fields))
    }

    /// Resolve `candidates` against the live schema of `model`
    pub async fn resolve_fields<S: AsRef<str>>(&self, model: &str, candidates: &[S]) -> Result<ResolvedFields> {
        Ok(self.schema(model).await?.resolve(candidates))
    }

    pub async fn search_read<S: AsRef<str>>(&self, model: &str, domain: Value, fields: &[S]) -> Result<Vec<Record>> {
        let fields: Vec<&str> = fields.iter().map(|f| f.as_ref()).collect();
        let mut kwargs = serde_json::Map::new();
        kwargs.insert("fields".into(), json!(fields));
        kwargs.insert("limit".into(), json!(0));

        let value = self.execute(model, "search_read", vec![domain], kwargs).await?;
        match value {
            Value::Array(rows) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(record) => Ok(record),
                    other => Err(SyncError::Protocol(format!("search_read returned a non-record: {other}"))),
                })
                .collect(),
            other => Err(SyncError::Protocol(format!("search_read on {model} returned {other}"))),
        }
    }

    /// Read the projects matching `filter` and all of their tasks
    pub async fn fetch_export<S: AsRef<str>>(&self, filter: &ProjectFilter, candidates: &[S]) -> Result<TaskExport> {
        let task_schema = self.schema(TASK_MODEL).await?;
        let resolved = task_schema.resolve(candidates);
        if resolved.fields.is_empty() {
            return Err(SyncError::NoFields(TASK_MODEL.to_string()));
        }
        for (candidate, alias) in &resolved.aliases {
            info!("field {candidate} read as {alias}");
        }

        let project_fields = self.resolve_fields(PROJECT_MODEL, PROJECT_FIELDS).await?.fields;
        let projects = self
            .search_read(PROJECT_MODEL, filter.domain(), &project_fields)
            .await?;
        if projects.is_empty() {
            return Err(SyncError::NoProject(filter.to_string()));
        }

        let project_ids: Vec<i64> = projects
            .iter()
            .filter_map(|p| p.get("id").and_then(Value::as_i64))
            .collect();
        info!(?project_ids, "matched {} project(s)", projects.len());

        let tasks = self
            .search_read(
                TASK_MODEL,
                json!([["project_id", "in", &project_ids]]),
                &resolved.fields,
            )
            .await?;

        let document = ExportDocument {
            meta: ExportMeta {
                exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
                odoo_url: self.url.clone(),
                db: self.session.db.clone(),
                server_serie: self.server.server_serie.clone(),
                server_version_info: self.server.server_version_info.clone(),
                field_aliases: resolved.aliases,
                project_ids,
                task_fields: resolved.fields,
            },
            projects,
            tasks,
        };

        Ok(TaskExport {
            document,
            task_schema,
        })
    }

    /// Export matching tasks to a JSON document and a CSV table
    pub async fn export<S: AsRef<str>>(
        &self,
        filter: &ProjectFilter,
        candidates: &[S],
        json_path: &Path,
        csv_path: &Path,
    ) -> Result<TaskExport> {
        let export = self.fetch_export(filter, candidates).await?;
        export.write_files(json_path, csv_path)?;
        info!(
            "exported {} task(s) to {} and {}",
            export.task_count(),
            json_path.display(),
            csv_path.display()
        );
        Ok(export)
    }

    /// Apply updates and creations from `payload`, one request per item
    pub async fn import<S: AsRef<str>>(
        &self,
        payload: &UpdatePayload,
        allowed: &[S],
        dry_run: bool,
    ) -> Result<ImportReport> {
        let schema = self.schema(TASK_MODEL).await?;
        let planner = ImportPlanner::new(&schema, allowed, payload.default_project_id);
        debug!(editable = ?planner.editable(), "import field sets resolved");

        let mut report = ImportReport::default();

        for (index, item) in payload.items.iter().enumerate() {
            let index = index + 1;
            let plan = planner.plan(item);

            if dry_run {
                println!("  [{index}] {plan}");
                report.record_planned(index, plan);
                continue;
            }

            match plan {
                ItemPlan::Skip { id } => {
                    debug!(id, "nothing to write");
                    report.skipped.push(id);
                }
                ItemPlan::Reject { reason } => {
                    warn!("KO item {index}: {reason}");
                    report.failed.push((index, reason));
                }
                ItemPlan::Update { id, values } => {
                    let args = vec![json!([id]), Value::Object(values)];
                    match self.execute(TASK_MODEL, "write", args, Default::default()).await {
                        Ok(_) => report.updated.push(id),
                        Err(e) => {
                            warn!("KO update id={id}: {e}");
                            report.failed.push((index, format!("update id={id}: {e}")));
                        }
                    }
                }
                ItemPlan::Create { values } => {
                    let name = values.get("name").cloned().unwrap_or(Value::Null);
                    let args = vec![Value::Object(values)];
                    match self.execute(TASK_MODEL, "create", args, Default::default()).await {
                        Ok(Value::Array(ids)) => {
                            report.created.extend(ids.iter().filter_map(Value::as_i64));
                        }
                        Ok(Value::Number(id)) if id.is_i64() => {
                            report.created.extend(id.as_i64());
                        }
                        Ok(other) => {
                            warn!("KO create name={name}: unexpected result {other}");
                            report
                                .failed
                                .push((index, format!("create name={name}: unexpected result {other}")));
                        }
                        Err(e) => {
                            warn!("KO create name={name}: {e}");
                            report.failed.push((index, format!("create name={name}: {e}")));
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}

/// Outcome of an import run
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Ids of tasks written
    pub updated: Vec<i64>,
    /// Ids of tasks created
    pub created: Vec<i64>,
    /// Ids a dry run would have written
    pub planned_updates: Vec<i64>,
    /// Creations a dry run would have sent
    pub planned_creations: usize,
    /// Updates with nothing to write
    pub skipped: Vec<i64>,
    /// 1-based payload index and reason
    pub failed: Vec<(usize, String)>,
}

impl ImportReport {
    fn record_planned(&mut self, index: usize, plan: ItemPlan) {
        match plan {
            ItemPlan::Update { id, .. } => self.planned_updates.push(id),
            ItemPlan::Create { .. } => self.planned_creations += 1,
            ItemPlan::Skip { id } => self.skipped.push(id),
            ItemPlan::Reject { reason } => self.failed.push((index, reason)),
        }
    }

    pub fn success(&self) -> usize {
        self.updated.len() + self.created.len() + self.planned_updates.len() + self.planned_creations
    }

    pub fn failure(&self) -> usize {
        self.failed.len()
    }

    pub fn print_summary(&self) {
        println!("\n=== Import Summary ===");

        if !self.updated.is_empty() {
            println!("\nUpdated ({}):", self.updated.len());
            for id in &self.updated {
                println!("  - task #{id}");
            }
        }

        if !self.created.is_empty() {
            println!("\nCreated ({}):", self.created.len());
            for id in &self.created {
                println!("  - task #{id}");
            }
        }

        if !self.planned_updates.is_empty() {
            println!("\nWould update ({}):", self.planned_updates.len());
            for id in &self.planned_updates {
                println!("  - task #{id}");
            }
        }

        if self.planned_creations > 0 {
            println!("\nWould create: {}", self.planned_creations);
        }

        if !self.skipped.is_empty() {
            println!("\nSkipped (nothing to write) ({}):", self.skipped.len());
            for id in &self.skipped {
                println!("  ✓ task #{id}");
            }
        }

        if !self.failed.is_empty() {
            println!("\nErrors ({}):", self.failed.len());
            for (index, error) in &self.failed {
                println!("  - item {index}: {error}");
            }
        }

        println!("\nOK={} KO={}", self.success(), self.failure());
    }
}
