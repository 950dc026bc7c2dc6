use std::path::{Path, PathBuf};

mod check;
mod feed;
mod generate;
mod init;
mod list;
mod repair;
mod show;
mod terminal;
mod topics;

use anyhow::Context;
use check::Check;
use clap::ArgAction;
use feed::Feed;
use generate::Generate;
use init::Init;
use list::List;
use repair::Repair;
use scribe::{CONFIG_FILE, Config};
use show::Show;
use topics::Topics;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the site
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(&self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Write a default configuration and create the content directory
    Init(Init),

    /// List stored articles, newest first
    List(List),

    /// Show one article
    Show(Show),

    /// Verify every stored article file
    Check(Check),

    /// Run the repair pipeline on a Markdown file or stdin
    Repair(Repair),

    /// Generate new articles with the model fallback chain
    Generate(Generate),

    /// Manage the topic queue
    Topics(Topics),

    /// Write RSS, Atom and sitemap files
    Feed(Feed),
}

impl Command {
    fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run(root),
            Self::List(command) => command.run(root),
            Self::Show(command) => command.run(root),
            Self::Check(command) => command.run(root),
            Self::Repair(command) => command.run(),
            Self::Generate(command) => command.run(root),
            Self::Topics(command) => command.run(root),
            Self::Feed(command) => command.run(root),
        }
    }
}

/// Loads `scribe.toml`, treating a missing file as defaults and a malformed
/// one as an error.
fn load_config(root: &Path) -> anyhow::Result<Config> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        tracing::debug!("no {} found, using defaults", path.display());
        return Ok(Config::default());
    }
    Config::load(&path).with_context(|| format!("failed to load {}", path.display()))
}
