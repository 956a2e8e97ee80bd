//! Inyoka wiki markup CLI.
//!
//! Renders markup files, shows their metadata and tokens, and diffs or
//! merges page texts.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;

use commands::{DiffArgs, MergeArgs, MetaArgs, RenderArgs, TokensArgs};
use output::Output;

#[derive(Parser)]
#[command(name = "inyoka")]
#[command(about = "Inyoka wiki markup engine")]
#[command(version)]
struct Cli {
    /// Log progress at info level (overrides `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a markup file.
    Render(RenderArgs),
    /// Print the metadata of a markup file.
    Meta(MetaArgs),
    /// Three-way merge of text files.
    Merge(MergeArgs),
    /// Unified diff of two text files.
    Diff(DiffArgs),
    /// Print the lexer tokens of a markup file.
    Tokens(TokensArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => args.execute(),
        Commands::Meta(args) => args.execute(),
        Commands::Merge(args) => args.execute(),
        Commands::Diff(args) => args.execute(),
        Commands::Tokens(args) => args.execute(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            Output::new().error(&format!("Error: {err}"));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("inyoka").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    fn write(dir: &Path, name: &str, text: &str) -> String {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, text).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_render_links_against_pages_directory() {
        let dir = tempfile::tempdir().unwrap();
        let pages = dir.path().join("pages");
        write(&pages, "Vorhanden.txt", "Hallo");
        let file = write(dir.path(), "Start.txt", "[:Vorhanden:] und [:Fehlt:]");

        let Commands::Render(args) = parse(&["render", &file, "--pages", &pages.to_string_lossy()]) else {
            panic!("expected render command");
        };
        let html = args.run().unwrap();
        assert!(html.contains(r#"<a href="/Vorhanden" class="internal">"#), "{html}");
        assert!(html.contains(r#"class="internal missing""#), "{html}");
    }

    #[test]
    fn test_render_text_format() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "Seite.txt", "'''fett'''");

        let Commands::Render(args) = parse(&["render", &file, "--format", "text"]) else {
            panic!("expected render command");
        };
        let text = args.run().unwrap();
        assert!(text.contains("fett"), "{text}");
        assert!(!text.contains("<strong>"), "{text}");
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result = Cli::try_parse_from(["inyoka", "render", "x.txt", "--format", "pdf"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_meta_lists_tags_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "Seite.txt", "# tag: eins\n[:Ziel:]");

        let Commands::Meta(args) = parse(&["meta", &file]) else {
            panic!("expected meta command");
        };
        let lines = args.run().unwrap();
        assert!(lines.lines().any(|line| line == "tag: eins"), "{lines}");
        assert!(lines.lines().any(|line| line == "X-Link: Ziel"), "{lines}");
    }

    #[test]
    fn test_merge_counts_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old", "a\nb\nc\n");
        let left = write(dir.path(), "left", "a\nX\nc\n");
        let right = write(dir.path(), "right", "a\nY\nc\n");

        let Commands::Merge(args) = parse(&["merge", &old, &left, &right]) else {
            panic!("expected merge command");
        };
        let (merged, conflicts) = args.run().unwrap();
        assert_eq!(conflicts, 1);
        assert!(merged.contains("X\n"));

        let Commands::Merge(args) = parse(&["merge", "--strict", &old, &left, &right]) else {
            panic!("expected merge command");
        };
        assert!(matches!(args.run(), Err(error::CliError::Conflict(_))));
    }

    #[test]
    fn test_diff_of_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old", "a\nb\n");
        let new = write(dir.path(), "new", "a\nc\n");

        let Commands::Diff(args) = parse(&["diff", &old, &new]) else {
            panic!("expected diff command");
        };
        let udiff = args.run().unwrap();
        assert!(udiff.ends_with("@@ -1,2 +1,2 @@\n a\n-b\n+c"), "{udiff}");

        let Commands::Diff(args) = parse(&["diff", &old, &old]) else {
            panic!("expected diff command");
        };
        assert_eq!(args.run().unwrap(), "");
    }

    #[test]
    fn test_tokens_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "Seite.txt", "''kursiv''");

        let Commands::Tokens(args) = parse(&["tokens", "--json", &file]) else {
            panic!("expected tokens command");
        };
        let tokens: serde_json::Value = serde_json::from_str(&args.run().unwrap()).unwrap();
        assert!(tokens.as_array().is_some_and(|tokens| !tokens.is_empty()));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let Commands::Tokens(args) = parse(&["tokens", "/nonexistent/inyoka.txt"]) else {
            panic!("expected tokens command");
        };
        let err = args.run().unwrap_err();
        assert!(err.to_string().starts_with("cannot read /nonexistent/inyoka.txt"));
    }
}
