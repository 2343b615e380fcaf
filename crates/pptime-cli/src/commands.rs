//! Subcommand implementations

use anyhow::{Context, Result};
use pptime_core::config::PartialConfig;
use pptime_core::{
    generate_report, FetchError, ReportComment, ReportMaterializer, ReportOptions, ReportStore,
    TimeSource,
};
use pptime_remote::{ProjectPlaceClient, SnapshotSource};
use pptime_render::ExcelWriter;
use pptime_store::SqliteReportStore;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::info;
use url::Url;

fn open_store(database: &Path) -> Result<SqliteReportStore> {
    if let Some(parent) = database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SqliteReportStore::open(database)
        .with_context(|| format!("Failed to open report registry {}", database.display()))
}

pub fn generate(config: &PartialConfig, comment: Option<&str>, from_json: Option<&Path>) -> Result<()> {
    // checked before any remote call
    let comment = ReportComment::new(comment.unwrap_or_default())?;
    let report = config.resolve_report();

    let source: Box<dyn TimeSource> = match from_json {
        Some(path) => Box::new(SnapshotSource::load(path)?),
        None => {
            let service = config.resolve_service()?;
            Box::new(
                ProjectPlaceClient::connect(&service)
                    .context("Failed to connect to the time-report service")?,
            )
        }
    };

    let store = open_store(&report.database)?;
    let mut materializer = ReportMaterializer::new(ExcelWriter::new(), store, &report.output_dir)
        .prefix(&report.file_prefix);
    let options = ReportOptions {
        yearly_sheets: report.yearly_sheets,
    };

    let artifact = generate_report(&*source, &mut materializer, &options, &comment)
        .context("Report generation failed")?;

    info!(report_id = artifact.id, "done");
    println!("{}", artifact.file_path);
    Ok(())
}

pub fn list(config: &PartialConfig, json: bool) -> Result<()> {
    let report = config.resolve_report();
    let store = open_store(&report.database)?;
    let artifacts = store.list()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &artifacts)?;
        writeln!(out)?;
        return Ok(());
    }

    if artifacts.is_empty() {
        eprintln!("No reports yet");
        return Ok(());
    }
    for artifact in &artifacts {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            artifact.id,
            artifact.created_at.format("%Y-%m-%d %H:%M:%S"),
            artifact.file_path,
            artifact.comment
        )?;
    }
    Ok(())
}

fn prompt_verifier(authorization_url: &Url) -> Result<String, FetchError> {
    eprintln!("Open this URL, approve access and paste the verifier code:");
    eprintln!("  {authorization_url}");
    eprint!("Verifier: ");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| FetchError::Authentication(format!("cannot read verifier: {e}")))?;
    Ok(line.trim().to_string())
}

pub fn authorize(config: &PartialConfig) -> Result<()> {
    let client = config.resolve_client()?;
    let token = pptime_remote::authorize(&client, &prompt_verifier)?;

    println!("PP_ACCESS_TOKEN_KEY={}", token.key);
    println!("PP_ACCESS_TOKEN_SECRET={}", token.secret);
    Ok(())
}
