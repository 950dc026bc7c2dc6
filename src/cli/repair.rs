use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use scribe::storage::frontmatter::{self, MARKER};
use tracing::instrument;

/// Repair generated Markdown and print the result
///
/// A leading frontmatter block is passed through untouched.
#[derive(Debug, Parser)]
pub struct Repair {
    /// File to repair; reads stdin when omitted
    file: Option<PathBuf>,

    /// Rewrite the file instead of printing
    #[arg(long, requires = "file")]
    in_place: bool,
}

impl Repair {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let input = match &self.file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            None => {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .context("failed to read stdin")?;
                buffer
            }
        };

        let repaired = match frontmatter::split(&input) {
            Ok((block, body)) => format!("{MARKER}\n{block}\n{MARKER}\n\n{}", scribe::repair(body)),
            Err(_) => scribe::repair(&input),
        };

        match (&self.file, self.in_place) {
            (Some(path), true) => {
                fs::write(path, format!("{repaired}\n"))
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!("repaired {}", path.display());
            }
            _ => println!("{repaired}"),
        }
        Ok(())
    }
}
