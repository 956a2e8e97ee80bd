//! `render` and `meta` commands.

use std::path::PathBuf;

use clap::Args;
use inyoka_markup::{Format, MarkupProcessor};
use inyoka_wiki::{Settings, StorePages, extract_metadata};

use super::{WikiArgs, default_page_name};
use crate::error::{CliError, read_file};
use crate::output::Output;

/// Arguments for the `render` command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Markup file to render.
    pub(crate) file: PathBuf,

    /// Output format: html, docbook, raw, text or ast.
    #[arg(short, long, default_value = "html")]
    pub(crate) format: Format,

    /// Page name of the file (default: the file name without extension).
    #[arg(short, long)]
    pub(crate) page: Option<String>,

    #[command(flatten)]
    pub(crate) wiki: WikiArgs,
}

impl RenderArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        output.document(&self.run()?);
        Ok(())
    }

    pub(crate) fn run(&self) -> Result<String, CliError> {
        let text = read_file(&self.file)?;
        let page = self.page.clone().unwrap_or_else(|| default_page_name(&self.file));
        let config = self.wiki.load_config()?;
        let wiki = self.wiki.load_wiki(&config, Some((&page, &text)))?;
        tracing::info!(page = %page, format = %self.format, "Rendering");
        Ok(wiki.render_text(&text, Some(&page), self.format))
    }
}

/// Arguments for the `meta` command.
#[derive(Args)]
pub(crate) struct MetaArgs {
    /// Markup file to read metadata from.
    pub(crate) file: PathBuf,

    /// Page name of the file (default: the file name without extension).
    #[arg(short, long)]
    pub(crate) page: Option<String>,

    /// Print a JSON array of `[key, value]` pairs.
    #[arg(long)]
    pub(crate) json: bool,

    #[command(flatten)]
    pub(crate) wiki: WikiArgs,
}

impl MetaArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        output.document(&self.run()?);
        Ok(())
    }

    pub(crate) fn run(&self) -> Result<String, CliError> {
        let text = read_file(&self.file)?;
        let page = self.page.clone().unwrap_or_else(|| default_page_name(&self.file));
        let config = self.wiki.load_config()?;
        let wiki = self.wiki.load_wiki(&config, None)?;
        let settings = Settings::from(&config);
        let processor = MarkupProcessor::new().with_template_base(settings.template_base);
        let metadata = extract_metadata(&processor, &StorePages(wiki.store()), &page, &text);

        if self.json {
            return Ok(serde_json::to_string_pretty(&metadata)?);
        }
        Ok(metadata
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
