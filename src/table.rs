use crate::etx::EtxIndex;
use crate::formatting::{format_count, format_etx};
use crate::model::Host;
use std::net::IpAddr;

pub const COMPACT_ROW_LIMIT: usize = 20;
const MIN_HOSTNAME_WIDTH: usize = 8;
const MAX_HOSTNAME_WIDTH: usize = 40;
const MIN_IP_WIDTH: usize = 15;
const MIN_ETX_WIDTH: usize = 6;
const COUNT_WIDTH: usize = 8;
pub const EMPTY_TABLE_MESSAGE: &str = "No nodes available.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub hostname: String,
    pub ip: IpAddr,
    pub etx: Option<i64>,
    pub services: usize,
    pub children: usize,
    pub child_hosts: Vec<(String, IpAddr)>,
}

impl NodeRow {
    pub fn etx_cell(&self) -> String {
        format_etx(self.etx)
    }
}

/// One row per node, in the order the upstream returned them.
pub fn build_rows(hosts: &[Host], etx: &EtxIndex) -> Vec<NodeRow> {
    hosts
        .iter()
        .map(|host| NodeRow {
            hostname: host.hostname.clone(),
            ip: host.ip,
            etx: etx.lookup(host.ip),
            services: host.services.len()
                + host
                    .children
                    .iter()
                    .map(|child| child.services.len())
                    .sum::<usize>(),
            children: host.children.len(),
            child_hosts: host
                .children
                .iter()
                .map(|child| (child.hostname.clone(), child.ip))
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableLine {
    Header(String),
    Separator(String),
    Row(String),
    Child(String),
    Hint(String),
}

impl TableLine {
    pub fn text(&self) -> &str {
        match self {
            Self::Header(text)
            | Self::Separator(text)
            | Self::Row(text)
            | Self::Child(text)
            | Self::Hint(text) => text,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderedTable {
    pub lines: Vec<TableLine>,
}

impl RenderedTable {
    pub fn width(&self) -> usize {
        self.lines
            .iter()
            .map(|line| line.text().chars().count())
            .max()
            .unwrap_or(0)
    }
}

pub fn render_table(rows: &[NodeRow], full_output: bool) -> RenderedTable {
    if rows.is_empty() {
        return RenderedTable {
            lines: vec![TableLine::Hint(EMPTY_TABLE_MESSAGE.to_string())],
        };
    }

    let name_width = rows
        .iter()
        .map(|row| row.hostname.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(MIN_HOSTNAME_WIDTH, MAX_HOSTNAME_WIDTH);
    let ip_width = column_width(rows, MIN_IP_WIDTH, |row| row.ip.to_string());
    let etx_width = column_width(rows, MIN_ETX_WIDTH, NodeRow::etx_cell);

    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(TableLine::Header(format!(
        "{:>4} | {:<name_width$} | {:<ip_width$} | {:>etx_width$} | {:>COUNT_WIDTH$} | {:>COUNT_WIDTH$}",
        "#", "Hostname", "IP", "ETX", "Services", "Children"
    )));
    lines.push(TableLine::Separator(format!(
        "-----+-{}-+-{}-+-{}-+-{}-+-{}",
        "-".repeat(name_width),
        "-".repeat(ip_width),
        "-".repeat(etx_width),
        "-".repeat(COUNT_WIDTH),
        "-".repeat(COUNT_WIDTH)
    )));

    let limit = if full_output {
        rows.len()
    } else {
        COMPACT_ROW_LIMIT
    };
    for (position, row) in rows.iter().take(limit).enumerate() {
        lines.push(TableLine::Row(format!(
            "{:>4} | {:<name_width$} | {:<ip_width$} | {:>etx_width$} | {:>COUNT_WIDTH$} | {:>COUNT_WIDTH$}",
            position + 1,
            truncate(&row.hostname, name_width),
            row.ip.to_string(),
            row.etx_cell(),
            format_count(row.services),
            format_count(row.children)
        )));
        if full_output {
            for (hostname, ip) in &row.child_hosts {
                lines.push(TableLine::Child(format!("     |   \u{2514} {hostname} ({ip})")));
            }
        }
    }

    if rows.len() > limit {
        lines.push(TableLine::Hint(format!(
            "... {} more nodes (use --full-output to display all).",
            rows.len() - limit
        )));
    }

    RenderedTable { lines }
}

fn column_width<F>(rows: &[NodeRow], min: usize, cell: F) -> usize
where
    F: Fn(&NodeRow) -> String,
{
    rows.iter()
        .map(|row| cell(row).chars().count())
        .max()
        .unwrap_or(0)
        .max(min)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}
