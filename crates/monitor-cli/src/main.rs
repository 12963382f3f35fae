//! Operator-facing uploader for source-code and source-map archives
//! (spec.md §6). A thin `reqwest` multipart client over the upload
//! endpoints `monitor-api` exposes — grounded in the teacher's
//! pairing of `clap`-derived subcommands with an `anyhow`-bounded
//! `main`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "monitor-cli", about = "Upload source archives to the ingestion service")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a source-code archive and its matching source-map archive
    /// for one `(projectId, version)`.
    UploadSourceCodeSourcemap {
        project_id: String,
        version: String,
        source_archive: PathBuf,
        sourcemap_archive: PathBuf,
    },
}

async fn upload_archive(
    client: &reqwest::Client,
    api_url: &str,
    endpoint: &str,
    project_id: &str,
    version: &str,
    archive_path: &PathBuf,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(archive_path).await?;
    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive.zip".to_string());

    let form = reqwest::multipart::Form::new()
        .text("projectId", project_id.to_string())
        .text("version", version.to_string())
        .text("archiveType", "zip")
        .part("archive", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

    let url = format!("{api_url}{endpoint}");
    let response = client.post(&url).multipart(form).send().await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.is_success() {
        tracing::info!(endpoint, %status, "upload succeeded");
        println!("{body}");
        Ok(())
    } else {
        anyhow::bail!("upload to {endpoint} failed: {status} {body}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Command::UploadSourceCodeSourcemap {
            project_id,
            version,
            source_archive,
            sourcemap_archive,
        } => {
            upload_archive(
                &client,
                &cli.api_url,
                "/api/monitor/source",
                &project_id,
                &version,
                &source_archive,
            )
            .await?;
            upload_archive(
                &client,
                &cli.api_url,
                "/api/monitor/sourcemap",
                &project_id,
                &version,
                &sourcemap_archive,
            )
            .await?;
        }
    }

    Ok(())
}
