use crate::table::NodeRow;
use anyhow::{Context, Result};
use csv::Writer;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    hostname: &'a str,
    ip: IpAddr,
    etx: Option<i64>,
    services: usize,
    children: usize,
}

pub async fn write_output_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote output file");
    Ok(())
}

fn finalize_writer(mut writer: Writer<Vec<u8>>, label: &str) -> Result<Vec<u8>> {
    writer
        .flush()
        .with_context(|| format!("failed to flush {label}"))?;
    writer
        .into_inner()
        .with_context(|| format!("failed to finalize {label}"))
}

pub fn serialize_rows(rows: &[NodeRow]) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    for row in rows {
        let record = CsvRecord {
            hostname: row.hostname.as_str(),
            ip: row.ip,
            etx: row.etx,
            services: row.services,
            children: row.children,
        };
        writer
            .serialize(record)
            .context("failed to serialize node record")?;
    }
    finalize_writer(writer, "node CSV writer")
}

pub fn gzip_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .context("failed to compress CSV output")?;
    encoder.finish().context("failed to finish gzip stream")
}

pub fn archive_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Writes the node CSV and returns the path actually written.
pub async fn save_rows_csv(rows: &[NodeRow], path: &Path, archive: bool) -> Result<PathBuf> {
    let serialized = serialize_rows(rows)?;
    if archive {
        let target = archive_path(path);
        write_output_file(&target, &gzip_bytes(&serialized)?).await?;
        Ok(target)
    } else {
        write_output_file(path, &serialized).await?;
        Ok(path.to_path_buf())
    }
}
