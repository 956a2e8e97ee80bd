//! `tokens` command: the lexer output of a markup file.

use std::path::PathBuf;

use clap::Args;
use inyoka_markup::lexer::tokenize;

use crate::error::{CliError, read_file};
use crate::output::Output;

#[derive(Args)]
pub(crate) struct TokensArgs {
    /// Markup file to tokenize.
    pub(crate) file: PathBuf,

    /// Print tokens as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

impl TokensArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        output.document(&self.run()?);
        Ok(())
    }

    pub(crate) fn run(&self) -> Result<String, CliError> {
        let tokens = tokenize(&read_file(&self.file)?).into_tokens();
        if self.json {
            return Ok(serde_json::to_string_pretty(&tokens)?);
        }
        Ok(tokens.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))
    }
}
