//! `merge` command.

use std::path::PathBuf;

use clap::Args;
use inyoka_config::Config;
use inyoka_wiki::Settings;

use crate::error::{CliError, read_file};
use crate::output::Output;

/// Arguments for the `merge` command.
#[derive(Args)]
pub(crate) struct MergeArgs {
    /// Common ancestor.
    pub(crate) old: PathBuf,

    /// First descendant, wins the upper half of a conflict.
    pub(crate) left: PathBuf,

    /// Second descendant.
    pub(crate) right: PathBuf,

    /// Fail on the first conflict instead of writing markers.
    #[arg(long)]
    pub(crate) strict: bool,

    /// Path to configuration file (default: auto-discover inyoka.toml).
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
}

impl MergeArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let (merged, conflicts) = self.run()?;
        output.document(&merged);
        if conflicts > 0 {
            output.warning(&format!("{conflicts} conflict(s) marked"));
        } else {
            output.info("Merged without conflicts");
        }
        Ok(())
    }

    /// The merged text and the number of marked conflicts.
    pub(crate) fn run(&self) -> Result<(String, usize), CliError> {
        let config = Config::load(self.config.as_deref(), None)?;
        let merger = Settings::from(&config).merger().with_strict(self.strict);
        let old = read_file(&self.old)?;
        let left = read_file(&self.left)?;
        let right = read_file(&self.right)?;

        let merged = merger.merge(&old, &left, &right)?;
        let begin = &merger.markers()[0];
        let conflicts = merged.lines().filter(|line| line == begin).count();
        Ok((merged, conflicts))
    }
}
