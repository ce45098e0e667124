use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use odoo_task_sync::backend::jsonrpc::JsonRpcBackend;
use odoo_task_sync::export::DEFAULT_TASK_FIELDS;
use odoo_task_sync::import::{UpdatePayload, DEFAULT_ALLOWED_FIELDS};
use odoo_task_sync::schema::TASK_MODEL;
use odoo_task_sync::{OdooConfig, ProjectFilter, TaskSync};

use crate::cli::ExportArgs;

async fn connect(config: &OdooConfig) -> Result<TaskSync<JsonRpcBackend>> {
    let backend = JsonRpcBackend::new(&config.url).context("Failed to create Odoo client")?;
    TaskSync::connect(backend, config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.url))
}

/// Execute the export command
pub async fn export(config: &OdooConfig, args: &ExportArgs) -> Result<()> {
    let filter = match (&args.project_name, args.project_id) {
        (_, Some(id)) => ProjectFilter::Id(id),
        (Some(name), None) => ProjectFilter::Name(name.clone()),
        (None, None) => anyhow::bail!("Either --project-name or --project-id is required"),
    };

    let candidates: Vec<String> = if args.fields.is_empty() {
        DEFAULT_TASK_FIELDS.iter().map(|f| f.to_string()).collect()
    } else {
        args.fields.clone()
    };

    let client = connect(config).await?;
    let export = client
        .export(&filter, &candidates, &args.json, &args.csv)
        .await
        .context("Export failed")?;

    println!(
        "Export OK: {} tasks -> {} & {}",
        export.task_count(),
        args.json.display(),
        args.csv.display()
    );

    Ok(())
}

/// Execute the import command
pub async fn import(config: &OdooConfig, input: &Path, allow: &[String], dry_run: bool) -> Result<()> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read update file {}", input.display()))?;
    let payload = UpdatePayload::parse(&content).context("Failed to parse update file")?;

    let allowed: Vec<String> = if allow.is_empty() {
        DEFAULT_ALLOWED_FIELDS.iter().map(|f| f.to_string()).collect()
    } else {
        allow.to_vec()
    };

    if dry_run {
        println!("DRY RUN: No changes will be made\n");
        println!("Would apply {} item(s) from {}\n", payload.items.len(), input.display());
    }

    let client = connect(config).await?;
    let report = client.import(&payload, &allowed, dry_run).await?;

    report.print_summary();

    if report.failure() > 0 {
        anyhow::bail!("Import completed with {} failure(s)", report.failure());
    }

    Ok(())
}

/// Execute the status command
pub async fn status(config: &OdooConfig, long: bool) -> Result<()> {
    let client = connect(config).await?;
    let server = client.server();

    println!("Server: {}", config.url);
    println!("Database: {}", config.db);
    println!("Version: {} {:?}", server.server_version, server.server_version_info);
    println!("User id: {}", client.uid());

    let schema = client.schema(TASK_MODEL).await?;
    let resolved = schema.resolve(DEFAULT_TASK_FIELDS);

    println!("\nTask fields ({} of {} candidates):\n", resolved.fields.len(), DEFAULT_TASK_FIELDS.len());
    if long {
        for field in &resolved.fields {
            println!("  {:<24} {}", field, schema.label(field).unwrap_or(""));
        }
    } else {
        println!("  {}", resolved.fields.join(", "));
    }

    if !resolved.aliases.is_empty() {
        println!("\nAliases:");
        for (candidate, alias) in &resolved.aliases {
            println!("  {candidate} -> {alias}");
        }
    }

    Ok(())
}
