use crate::export::write_output_file;
use crate::formatting::format_count;
use crate::table::NodeRow;
use anyhow::Result;
use chrono::{DateTime, Local};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use minify_html::{Cfg, minify};
use std::path::Path;

pub struct HtmlReportContext<'a> {
    pub source: &'a str,
    pub total_hosts: usize,
    pub run_started_at: &'a DateTime<Local>,
    pub rows: &'a [NodeRow],
    pub csv_path: Option<&'a Path>,
    pub output_path: &'a Path,
}

pub async fn save_html_report(context: &HtmlReportContext<'_>) -> Result<()> {
    let html = render_html_report(context);
    write_output_file(context.output_path, html.as_bytes()).await
}

pub fn render_html_report(context: &HtmlReportContext<'_>) -> String {
    let markup = render_markup(context).into_string();
    let cfg = Cfg {
        minify_css: true,
        ..Cfg::default()
    };
    String::from_utf8_lossy(&minify(markup.as_bytes(), &cfg)).into_owned()
}

fn render_markup(context: &HtmlReportContext<'_>) -> Markup {
    let generated_at = context
        .run_started_at
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    let with_etx = context.rows.iter().filter(|row| row.etx.is_some()).count();
    let services: usize = context.rows.iter().map(|row| row.services).sum();
    let title = format!(
        "Mesh Nodes - {}",
        context.run_started_at.format("%Y-%m-%d")
    );

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(REPORT_STYLE)) }
            }
            body {
                div.page {
                    header.hero {
                        div.pill { "meshtable v" (env!("CARGO_PKG_VERSION")) }
                        h1 { "Mesh Nodes" }
                        div.meta {
                            div { span.label { "Generated" } span.value.mono { (generated_at) } }
                            div { span.label { "Source" } span.value.mono { (context.source) } }
                        }
                    }
                    section.cards {
                        (card("Nodes", context.rows.len()))
                        (card("Total hosts", context.total_hosts))
                        (card("With ETX", with_etx))
                        (card("Services", services))
                    }
                    section.table-section {
                        h2 { "Nodes" }
                        (render_table(context.rows))
                    }
                    (render_downloads(context))
                    footer.footer {
                        "ETX is the Babel route metric as reported by the mesh manager."
                    }
                }
            }
        }
    }
}

fn card(label: &str, value: usize) -> Markup {
    html! {
        div.card {
            div.card-label { (label) }
            div.card-value { (value) }
        }
    }
}

fn render_table(rows: &[NodeRow]) -> Markup {
    html! {
        @if rows.is_empty() {
            p.muted { "No nodes available." }
        } @else {
            div.table-wrap {
                table {
                    thead {
                        tr {
                            th { "#" }
                            th { "Hostname" }
                            th { "IP" }
                            th.num { "ETX" }
                            th.num { "Services" }
                            th.num { "Children" }
                        }
                    }
                    tbody {
                        @for (position, row) in rows.iter().enumerate() {
                            tr {
                                td.num { (position + 1) }
                                td.host { (row.hostname) }
                                td.mono { (row.ip.to_string()) }
                                td.num.etx { (row.etx_cell()) }
                                td.num { (format_count(row.services)) }
                                td.num { (format_count(row.children)) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_downloads(context: &HtmlReportContext<'_>) -> Markup {
    html! {
        section.downloads {
            h3 { "Downloads" }
            @if let Some(path) = context.csv_path {
                @let full_display = path.to_string_lossy();
                @let display_name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or(full_display.as_ref());
                div.download-item {
                    div.download-label { "Nodes CSV" }
                    @if let Some(rel) = relative_link(context.output_path, path) {
                        a.download-link href=(rel) title=(full_display.as_ref()) { (display_name) }
                    } @else {
                        span.download-path title=(full_display.as_ref()) { (display_name) }
                    }
                }
            } @else {
                p.muted { "No CSV file was saved. Use --save-csv." }
            }
        }
    }
}

fn relative_link(html_path: &Path, target: &Path) -> Option<String> {
    let html_dir = html_path.parent()?;
    let target_dir = target.parent()?;
    if html_dir == target_dir {
        target
            .file_name()
            .and_then(|name| name.to_str())
            .map(std::string::ToString::to_string)
    } else {
        None
    }
}

const REPORT_STYLE: &str = r"
:root {
  --bg: #f4f6f8;
  --ink: #1c2430;
  --muted: #66707c;
  --card: #ffffff;
  --accent: #2a7f62;
  --border: #dde3ea;
}

* {
  box-sizing: border-box;
}

body {
  margin: 0;
  font-family: system-ui, sans-serif;
  color: var(--ink);
  background: var(--bg);
}

.page {
  max-width: 1100px;
  margin: 0 auto;
  padding: 40px 24px 56px;
}

.hero {
  background: var(--card);
  border: 1px solid var(--border);
  border-radius: 16px;
  padding: 28px 32px;
}

.pill {
  display: inline-block;
  padding: 4px 12px;
  border-radius: 999px;
  background: var(--accent);
  color: #fff;
  font-size: 12px;
}

.meta {
  display: flex;
  gap: 32px;
}

.label {
  display: block;
  color: var(--muted);
  font-size: 12px;
  text-transform: uppercase;
}

.mono {
  font-family: ui-monospace, monospace;
}

.cards {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
  gap: 16px;
  margin: 24px 0;
}

.card {
  background: var(--card);
  border: 1px solid var(--border);
  border-radius: 12px;
  padding: 16px 20px;
}

.card-label {
  color: var(--muted);
  font-size: 13px;
}

.card-value {
  font-size: 28px;
  font-weight: 600;
}

.table-wrap {
  overflow-x: auto;
  background: var(--card);
  border: 1px solid var(--border);
  border-radius: 12px;
}

table {
  width: 100%;
  border-collapse: collapse;
}

th,
td {
  padding: 8px 12px;
  border-bottom: 1px solid var(--border);
  text-align: left;
}

.num {
  text-align: right;
  font-variant-numeric: tabular-nums;
}

.muted,
.footer {
  color: var(--muted);
}
";
