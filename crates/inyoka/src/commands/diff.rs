//! `diff` command.

use std::path::PathBuf;

use clap::Args;
use inyoka_diff::{CONTEXT_LINES, Diff, unified_diff};

use crate::error::{CliError, read_file};
use crate::output::Output;

/// Arguments for the `diff` command.
#[derive(Args)]
pub(crate) struct DiffArgs {
    pub(crate) old: PathBuf,

    pub(crate) new: PathBuf,

    /// Print the structured diff with highlighted lines as JSON.
    #[arg(long)]
    pub(crate) json: bool,

    /// Lines of context around each change.
    #[arg(short = 'U', long, default_value_t = CONTEXT_LINES)]
    pub(crate) context: usize,
}

impl DiffArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let diff = self.run()?;
        if diff.is_empty() {
            output.success("No differences");
        } else {
            output.document(&diff);
        }
        Ok(())
    }

    pub(crate) fn run(&self) -> Result<String, CliError> {
        let old = read_file(&self.old)?;
        let new = read_file(&self.new)?;
        let old_title = self.old.display().to_string();
        let new_title = self.new.display().to_string();
        if self.json {
            let diff = Diff::new(&old, &new, &old_title, &new_title);
            if diff.is_empty() {
                return Ok(String::new());
            }
            return Ok(serde_json::to_string_pretty(&diff)?);
        }
        Ok(unified_diff(&old, &new, &old_title, &new_title, self.context))
    }
}
