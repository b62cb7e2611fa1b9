use anyhow::Result;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

const BRAILLE_TICKS: [&str; 8] = ["⠁", "⠂", "⠄", "⡀", "⢀", "⠠", "⠐", "⠈"];
const ASCII_TICKS: &str = "|/-\\";
const DRAW_HZ: u8 = 15;
const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Render,
}

impl Stage {
    const ALL: [Self; 2] = [Self::Fetch, Self::Render];

    const fn label(self) -> &'static str {
        match self {
            Self::Fetch => "Fetch",
            Self::Render => "Render",
        }
    }

    fn prefix(self) -> String {
        let index = Self::ALL
            .iter()
            .position(|stage| *stage == self)
            .map_or(0, |idx| idx + 1);
        format!("[{index}/{}]", Self::ALL.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSet {
    Ascii,
    BrailleColored,
    BraillePlain,
}

/// Dumb terminals cannot draw braille, so they always get ASCII ticks.
pub fn tick_set(term: Option<&str>, use_color: bool) -> TickSet {
    if term.is_some_and(|term| term.eq_ignore_ascii_case("dumb")) {
        TickSet::Ascii
    } else if use_color {
        TickSet::BrailleColored
    } else {
        TickSet::BraillePlain
    }
}

fn spinner_style(ticks: TickSet) -> ProgressStyle {
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    match ticks {
        TickSet::Ascii => style.tick_chars(ASCII_TICKS),
        TickSet::BraillePlain => style.tick_strings(&BRAILLE_TICKS),
        TickSet::BrailleColored => {
            let colored: Vec<String> = BRAILLE_TICKS
                .iter()
                .map(|tick| tick.bright_cyan().bold().to_string())
                .collect();
            let refs: Vec<&str> = colored.iter().map(String::as_str).collect();
            style.tick_strings(&refs)
        }
    }
}

pub struct ProgressState {
    multi: MultiProgress,
    style: ProgressStyle,
}

impl ProgressState {
    pub fn new(enabled: bool, use_color: bool) -> Self {
        let term = std::env::var("TERM").ok();
        Self::with_ticks(enabled, tick_set(term.as_deref(), use_color))
    }

    fn with_ticks(enabled: bool, ticks: TickSet) -> Self {
        let target = if enabled {
            ProgressDrawTarget::stderr_with_hz(DRAW_HZ)
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            style: spinner_style(ticks),
        }
    }

    #[cfg(test)]
    fn is_hidden(&self) -> bool {
        self.multi.is_hidden()
    }

    fn spinner(&self, message: String) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(self.style.clone());
        bar.set_message(message);
        bar.enable_steady_tick(TICK_INTERVAL);
        bar
    }

    pub fn clear(&self) {
        if let Err(err) = self.multi.clear() {
            tracing::debug!(error = %err, "failed to clear progress output");
        }
    }
}

fn stage_message(stage: Stage, label: &str) -> String {
    format!(
        "{} {}: {}",
        stage.prefix().bright_yellow().bold(),
        stage.label().bright_cyan().bold(),
        label.bright_white().bold()
    )
}

fn finish_message(stage: Stage, label: &str, outcome: Result<Option<&str>, ()>) -> String {
    let status = match outcome {
        Ok(None) => "done".bright_green().bold().to_string(),
        Ok(Some(detail)) => format!("{} {}", "done".bright_green().bold(), detail.bright_black()),
        Err(()) => "failed".bright_red().bold().to_string(),
    };
    format!("{} {status}", stage_message(stage, label))
}

/// Lists the files the Render stage wrote, or `None` when nothing was saved.
pub fn describe_outputs(csv: Option<&Path>, html: Option<&Path>) -> Option<String> {
    let written: Vec<String> = [csv, html]
        .into_iter()
        .flatten()
        .map(|path| path.display().to_string())
        .collect();
    (!written.is_empty()).then(|| format!("wrote {}", written.join(", ")))
}

/// Runs `fut` under a spinner. `detail` may describe a successful result,
/// for example the files a stage wrote.
pub async fn run_with_spinner<T, D>(
    progress: &ProgressState,
    stage: Stage,
    label: &str,
    fut: impl Future<Output = Result<T>>,
    detail: D,
) -> Result<T>
where
    D: FnOnce(&T) -> Option<String>,
{
    let bar = progress.spinner(stage_message(stage, label));
    let result = fut.await;
    let message = match &result {
        Ok(value) => {
            let detail = detail(value);
            finish_message(stage, label, Ok(detail.as_deref()))
        }
        Err(err) => {
            tracing::debug!(stage = stage.label(), error = %err, "stage failed");
            finish_message(stage, label, Err(()))
        }
    };
    bar.finish_with_message(message);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn dumb_terminal_falls_back_to_ascii() {
        assert_eq!(tick_set(Some("dumb"), true), TickSet::Ascii);
        assert_eq!(tick_set(Some("DUMB"), false), TickSet::Ascii);
    }

    #[test]
    fn color_decides_braille_variant() {
        assert_eq!(tick_set(Some("xterm-256color"), true), TickSet::BrailleColored);
        assert_eq!(tick_set(Some("xterm-256color"), false), TickSet::BraillePlain);
        assert_eq!(tick_set(None, false), TickSet::BraillePlain);
    }

    #[test]
    fn disabled_progress_is_hidden() {
        assert!(ProgressState::with_ticks(false, TickSet::Ascii).is_hidden());
    }

    #[test]
    fn stage_prefixes_count_all_stages() {
        assert_eq!(Stage::Fetch.prefix(), "[1/2]");
        assert_eq!(Stage::Render.prefix(), "[2/2]");
    }

    #[test]
    fn finish_message_reports_detail_or_failure() {
        let written = finish_message(Stage::Render, "outputs", Ok(Some("nodes.csv, nodes.html")));
        assert!(written.contains("Render"));
        assert!(written.contains("done"));
        assert!(written.contains("nodes.csv, nodes.html"));

        let failed = finish_message(Stage::Fetch, "hosts.json", Err(()));
        assert!(failed.contains("failed"));
        assert!(!failed.contains("done"));
    }

    #[test]
    fn outputs_list_saved_files_only() {
        assert_eq!(describe_outputs(None, None), None);
        assert_eq!(
            describe_outputs(Some(Path::new("out/nodes.csv.gz")), None).as_deref(),
            Some("wrote out/nodes.csv.gz")
        );
        assert_eq!(
            describe_outputs(
                Some(Path::new("out/nodes.csv")),
                Some(Path::new("out/nodes.html"))
            )
            .as_deref(),
            Some("wrote out/nodes.csv, out/nodes.html")
        );
    }

    #[tokio::test]
    async fn spinner_passes_results_through() {
        let progress = ProgressState::with_ticks(false, TickSet::BraillePlain);
        let value = run_with_spinner(&progress, Stage::Fetch, "ok", async { Ok(7) }, |n| {
            Some(format!("{n} nodes"))
        })
        .await
        .unwrap();
        assert_eq!(value, 7);

        let err = run_with_spinner(
            &progress,
            Stage::Render,
            "outputs",
            async { Err::<(), _>(anyhow!("disk full")) },
            |_| None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
