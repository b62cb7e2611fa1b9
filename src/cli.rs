use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate, generate_to};
use meshtable::sources::DEFAULT_PAGE_SIZE;
use tracing::Level;

pub const DEFAULT_CSV_PATH: &str = "data/output/nodes.csv";
pub const DEFAULT_HTML_PATH: &str = "data/output/nodes.html";

pub const SERVER_HELP: &str = "Base URL of a mesh manager (for example http://localhost:3333); nodes and ETX metrics are read from its Babel API.";
pub const HOSTS_HELP: &str = "Read nodes from a JSON file holding a hosts page ({\"nodes\": [...], \"total\": N}) or a bare array of hosts.";
pub const ETX_HELP: &str = "Read ETX metrics from a JSON file holding {\"etx\": {prefix: metric}} or a bare prefix-to-metric map. Without it every ETX cell is empty.";
pub const SAVE_CSV_HELP: &str = "Save the node table to the given CSV file (defaults to data/output/nodes.csv when no path is provided). Use --archive-csv to store a .gz instead.";
pub const SAVE_HTML_HELP: &str = "Save the HTML report to the given file (defaults to data/output/nodes.html when no path is provided).";
pub const ARCHIVE_CSV_HELP: &str = "Archive the saved CSV output into a .gz file.";

#[derive(Debug, Parser)]
#[command(
    name = "meshtable",
    about = "Render the node table of a mesh manager, including Babel ETX link metrics.",
    version = env!("CARGO_PKG_VERSION"),
    subcommand_negates_reqs = true,
    group(ArgGroup::new("source").required(true).args(["server", "hosts"]))
)]
pub struct Cli {
    #[arg(long, value_name = "URL", help = SERVER_HELP)]
    pub server: Option<String>,
    #[arg(long, value_name = "FILE", help = HOSTS_HELP)]
    pub hosts: Option<PathBuf>,
    #[arg(long, value_name = "FILE", requires = "hosts", help = ETX_HELP)]
    pub etx: Option<PathBuf>,
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_PAGE_SIZE,
        help = "Number of nodes requested per page from the server."
    )]
    pub page_size: usize,
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_CSV_PATH,
        help = SAVE_CSV_HELP
    )]
    pub save_csv: Option<PathBuf>,
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_HTML_PATH,
        help = SAVE_HTML_HELP
    )]
    pub save_html: Option<PathBuf>,
    #[arg(long, help = ARCHIVE_CSV_HELP)]
    pub archive_csv: bool,
    #[arg(
        long,
        help = "Print every node and its child hosts instead of the abbreviated table."
    )]
    pub full_output: bool,
    #[arg(long, help = "Disable progress spinner output.")]
    pub no_progress: bool,
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        help = "Log level written to stderr; RUST_LOG takes precedence."
    )]
    pub log_level: Level,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate shell completion scripts, optionally installing them for the current user.
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for.")]
        shell: Shell,
        #[arg(
            long,
            value_name = "DIR",
            help = "Directory to write the completion script to."
        )]
        output_dir: Option<PathBuf>,
        #[arg(
            long,
            help = "Install the completion script into the default location for the selected shell."
        )]
        install: bool,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum Source {
    Server(String),
    Files { hosts: PathBuf, etx: Option<PathBuf> },
}

impl Cli {
    /// Takes the node source out of the parsed flags.
    pub fn take_source(&mut self) -> Result<Source> {
        match (self.server.take(), self.hosts.take()) {
            (Some(base), None) => Ok(Source::Server(base)),
            (None, Some(hosts)) => Ok(Source::Files {
                hosts,
                etx: self.etx.take(),
            }),
            (Some(_), Some(_)) => Err(anyhow!("--server and --hosts cannot be combined")),
            (None, None) => Err(anyhow!("either --server or --hosts must be provided")),
        }
    }
}

pub fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Completions {
            shell,
            output_dir,
            install,
        } => generate_completions(shell, output_dir, install),
    }
}

fn generate_completions(shell: Shell, output_dir: Option<PathBuf>, install: bool) -> Result<()> {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();

    let target_dir = if let Some(dir) = output_dir {
        Some(dir)
    } else if install {
        Some(default_install_dir(shell)?)
    } else {
        None
    };

    if let Some(dir) = target_dir {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create completion directory {}", dir.display()))?;
        let path = generate_to(shell, &mut command, bin_name, &dir)
            .context("failed to write completion file")?;
        println!("Installed {shell:?} completions to {}", path.display());
    } else {
        let mut stdout = io::stdout().lock();
        generate(shell, &mut command, bin_name, &mut stdout);
        stdout
            .flush()
            .context("failed to flush completion output")?;
    }

    Ok(())
}

fn default_install_dir(shell: Shell) -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| {
        anyhow!("HOME environment variable is not set; use --output-dir to specify a path")
    })?;
    let mut path = PathBuf::from(home);

    match shell {
        Shell::Bash => path.push(".local/share/bash-completion/completions"),
        Shell::Elvish => path.push(".elvish/lib/completions"),
        Shell::Fish => path.push(".config/fish/completions"),
        Shell::PowerShell => path.push(".local/share/powershell/Scripts"),
        Shell::Zsh => path.push(".local/share/zsh/site-functions"),
        other => {
            return Err(anyhow!(
                "no default install location for {other:?}; specify --output-dir"
            ));
        }
    }
    Ok(path)
}
