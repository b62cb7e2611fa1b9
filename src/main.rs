use crate::cli::{Cli, Source};
use crate::progress::{ProgressState, Stage, describe_outputs, run_with_spinner};
use anyhow::Result;
use chrono::Local;
use clap::Parser;
use meshtable::etx::EtxIndex;
use meshtable::export::save_rows_csv;
use meshtable::report::{HtmlReportContext, save_html_report};
use meshtable::sources::{
    NodeSnapshot, build_client, fetch_etx, fetch_hosts, load_etx_file, load_hosts_file,
};
use meshtable::summary::{SummaryContext, SummaryPaths, print_summary};
use meshtable::table::build_rows;
use rustc_hash::FxHashMap;
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cli;
mod progress;

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    if let Some(command) = cli.command.take() {
        crate::cli::handle_command(command)?;
        return Ok(());
    }

    init_tracing(cli.log_level);

    let use_color = std::io::stdout().is_terminal();
    colored::control::set_override(use_color);

    let source = cli.take_source()?;
    let Cli {
        page_size,
        save_csv,
        save_html,
        archive_csv,
        full_output,
        no_progress,
        ..
    } = cli;

    let run_started_at = Local::now();
    let progress = ProgressState::new(!no_progress, use_color);

    let (source, snapshot, metrics) = match source {
        Source::Server(base) => {
            let client = build_client()?;
            let (snapshot, metrics) = run_with_spinner(
                &progress,
                Stage::Fetch,
                base.as_str(),
                async {
                    tokio::try_join!(
                        fetch_hosts(&client, &base, page_size),
                        fetch_etx(&client, &base)
                    )
                },
                describe_fetch,
            )
            .await?;
            (base, snapshot, metrics)
        }
        Source::Files { hosts, etx } => {
            let label = hosts.display().to_string();
            let (snapshot, metrics) = run_with_spinner(
                &progress,
                Stage::Fetch,
                &label,
                async {
                    let snapshot = load_hosts_file(&hosts).await?;
                    let metrics = match etx.as_deref() {
                        Some(path) => load_etx_file(path).await?,
                        None => FxHashMap::default(),
                    };
                    Ok::<_, anyhow::Error>((snapshot, metrics))
                },
                describe_fetch,
            )
            .await?;
            (label, snapshot, metrics)
        }
    };

    let index = EtxIndex::from_prefixes(&metrics);
    let rows = build_rows(&snapshot.hosts, &index);
    tracing::info!(
        nodes = rows.len(),
        with_etx = rows.iter().filter(|row| row.etx.is_some()).count(),
        "built node table"
    );

    let csv_path = run_with_spinner(
        &progress,
        Stage::Render,
        "outputs",
        async {
            let csv_path = match save_csv.as_deref() {
                Some(path) => Some(save_rows_csv(&rows, path, archive_csv).await?),
                None => None,
            };
            if let Some(path) = save_html.as_deref() {
                save_html_report(&HtmlReportContext {
                    source: &source,
                    total_hosts: snapshot.total,
                    run_started_at: &run_started_at,
                    rows: &rows,
                    csv_path: csv_path.as_deref(),
                    output_path: path,
                })
                .await?;
            }
            Ok::<_, anyhow::Error>(csv_path)
        },
        |csv_path| describe_outputs(csv_path.as_deref(), save_html.as_deref()),
    )
    .await?;

    progress.clear();

    print_summary(&SummaryContext {
        source: &source,
        total_hosts: snapshot.total,
        etx_prefixes: index.len(),
        run_started_at: &run_started_at,
        paths: SummaryPaths {
            csv: csv_path.as_deref(),
            html: save_html.as_deref(),
        },
        rows: &rows,
        full_output,
    });

    Ok(())
}

fn describe_fetch((snapshot, metrics): &(NodeSnapshot, FxHashMap<String, i64>)) -> Option<String> {
    Some(format!(
        "{} nodes, {} ETX prefixes",
        snapshot.hosts.len(),
        metrics.len()
    ))
}

fn init_tracing(level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
