//! CLI command implementations.

pub(crate) mod diff;
pub(crate) mod merge;
pub(crate) mod render;
pub(crate) mod tokens;

pub(crate) use diff::DiffArgs;
pub(crate) use merge::MergeArgs;
pub(crate) use render::{MetaArgs, RenderArgs};
pub(crate) use tokens::TokensArgs;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use inyoka_config::{CliSettings, Config};
use inyoka_markup::{MarkupProcessor, normalize_pagename};
use inyoka_storage::{Author, MemoryStore, NewRevision, PageStore};
use inyoka_wiki::{Settings, StorePages, Wiki, extract_metadata};

use crate::error::{CliError, read_file};

/// Extension of page files in a pages directory.
const PAGE_EXTENSION: &str = "txt";

/// Options shared by the commands that need a wiki around the input.
#[derive(Args)]
pub(crate) struct WikiArgs {
    /// Path to configuration file (default: auto-discover inyoka.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of wiki pages, one `.txt` file per page named by its path.
    #[arg(long, env = "INYOKA_PAGES")]
    pages: Option<PathBuf>,

    /// Main page name (overrides config).
    #[arg(long)]
    main_page: Option<String>,

    /// Base page of templates (overrides config).
    #[arg(long)]
    template_base: Option<String>,

    /// URL prefix of page links (overrides config).
    #[arg(long)]
    base_url: Option<String>,

    /// Disable the typography transformer.
    #[arg(long)]
    no_typography: bool,
}

impl WikiArgs {
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            main_page: self.main_page.clone(),
            template_base: self.template_base.clone(),
            base_url: self.base_url.clone(),
            typography: self.no_typography.then_some(false),
            cache_ttl: None,
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    /// A wiki over the pages directory plus `page`, which replaces a file
    /// of the same name.
    pub(crate) fn load_wiki(&self, config: &Config, page: Option<(&str, &str)>) -> Result<Wiki, CliError> {
        let settings = Settings::from(config);
        let store = MemoryStore::new();
        let mut pages = match &self.pages {
            Some(dir) => read_pages(dir)?,
            None => Vec::new(),
        };
        if let Some((name, text)) = page {
            let name = normalize_pagename(name);
            pages.retain(|(existing, _)| *existing != name);
            pages.push((name, text.to_owned()));
        }
        for (name, text) in &pages {
            store.create_revision(NewRevision::new(name.clone(), text.clone(), Author::user("inyoka")))?;
        }

        let processor = MarkupProcessor::new().with_template_base(settings.template_base.clone());
        let source = StorePages(&store);
        for (name, text) in &pages {
            let metadata = extract_metadata(&processor, &source, name, text);
            store.set_metadata(name, &metadata)?;
        }
        tracing::info!(pages = pages.len(), "Loaded wiki pages");

        let wiki = Wiki::new(Arc::new(store)).with_settings(settings);
        wiki.reload()?;
        Ok(wiki)
    }
}

/// Page name of a file: its path below the pages directory without the
/// extension.
fn page_name_for(relative: &Path) -> String {
    let name = relative
        .with_extension("")
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    normalize_pagename(&name)
}

/// Name and text of every page file below `dir`, sorted by name.
fn read_pages(dir: &Path) -> Result<Vec<(String, String)>, CliError> {
    let pattern = dir.join("**").join(format!("*.{PAGE_EXTENSION}"));
    let mut pages = Vec::new();
    for path in glob::glob(&pattern.to_string_lossy())?.filter_map(Result::ok) {
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let name = page_name_for(relative);
        if name.is_empty() {
            continue;
        }
        tracing::debug!(page = %name, path = %path.display(), "Reading page");
        pages.push((name, read_file(&path)?));
    }
    pages.sort();
    Ok(pages)
}

/// Page name of an input file when none is given.
pub(crate) fn default_page_name(file: &Path) -> String {
    file.file_stem()
        .map(|stem| normalize_pagename(&stem.to_string_lossy()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Seite".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_name_for() {
        assert_eq!(page_name_for(Path::new("Wiki/Neue Seite.txt")), "Wiki/Neue_Seite");
        assert_eq!(page_name_for(Path::new("Start.txt")), "Start");
        assert_eq!(default_page_name(Path::new("/tmp/Hallo Welt.txt")), "Hallo_Welt");
    }

    #[test]
    fn test_read_pages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Wiki")).unwrap();
        std::fs::write(dir.path().join("Start.txt"), "[:Wiki/Hilfe:]").unwrap();
        std::fs::write(dir.path().join("Wiki/Hilfe.txt"), "Hilfe").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let pages = read_pages(dir.path()).unwrap();
        let names: Vec<&str> = pages.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Start", "Wiki/Hilfe"]);
    }
}
