use crate::table::{NodeRow, TableLine, render_table};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::path::Path;

pub struct SummaryPaths<'a> {
    pub csv: Option<&'a Path>,
    pub html: Option<&'a Path>,
}

pub struct SummaryContext<'a> {
    pub source: &'a str,
    pub total_hosts: usize,
    pub etx_prefixes: usize,
    pub run_started_at: &'a DateTime<Local>,
    pub paths: SummaryPaths<'a>,
    pub rows: &'a [NodeRow],
    pub full_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryCounts {
    pub nodes: usize,
    pub total_hosts: usize,
    pub with_etx: usize,
    pub services: usize,
}

pub fn summary_counts(context: &SummaryContext<'_>) -> SummaryCounts {
    SummaryCounts {
        nodes: context.rows.len(),
        total_hosts: context.total_hosts,
        with_etx: context.rows.iter().filter(|row| row.etx.is_some()).count(),
        services: context.rows.iter().map(|row| row.services).sum(),
    }
}

pub fn print_summary(context: &SummaryContext<'_>) {
    println!();
    print_summary_header(context);
    print_summary_paths(&context.paths);
    println!();
    println!("{}", "Nodes".bold().bright_magenta());
    let table_width = print_node_table(context.rows, context.full_output);
    if table_width > 0 {
        let divider = "=".repeat(table_width);
        println!("{}", divider.bright_cyan());
    }
}

fn print_summary_header(context: &SummaryContext<'_>) {
    println!(
        "{}",
        "====================== Mesh Node Table ======================"
            .bold()
            .bright_cyan()
    );
    println!(
        "{} {}",
        "Run started".bright_yellow().bold(),
        context
            .run_started_at
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
            .bright_white()
    );
    println!(
        "{} {}",
        "Source".bright_yellow().bold(),
        context.source.bright_white()
    );
    let counts = summary_counts(context);
    println!(
        "{} {} | {} | {} | {}",
        "Counts".bright_yellow().bold(),
        format!("Nodes: {}", counts.nodes).bright_white(),
        format!("Hosts: {}", counts.total_hosts).bright_white(),
        format!("With ETX: {}/{}", counts.with_etx, counts.nodes).bright_white(),
        format!("Services: {}", counts.services).bright_white()
    );
    println!(
        "{} {}",
        "ETX prefixes".bright_yellow().bold(),
        context.etx_prefixes.to_string().bright_white()
    );
}

fn print_summary_paths(paths: &SummaryPaths<'_>) {
    print_path_line("Nodes CSV", paths.csv, "not saved (use --save-csv)");
    print_path_line("HTML Report", paths.html, "not saved (use --save-html)");
}

fn print_path_line(label: &str, path: Option<&Path>, hint: &str) {
    let label_colored = label.bright_yellow().bold();
    match path {
        Some(path) => println!(
            "{} {}",
            label_colored,
            format!("{}", path.display()).bright_white()
        ),
        None => println!("{} {}", label_colored, hint.bright_black()),
    }
}

fn print_node_table(rows: &[NodeRow], full_output: bool) -> usize {
    let table = render_table(rows, full_output);
    for line in &table.lines {
        match line {
            TableLine::Header(text) => println!("{}", text.bold().bright_white()),
            TableLine::Separator(text) | TableLine::Hint(text) => {
                println!("{}", text.bright_black());
            }
            TableLine::Row(text) => println!("{}", text.bright_green()),
            TableLine::Child(text) => println!("{}", text.green()),
        }
    }
    table.width()
}
