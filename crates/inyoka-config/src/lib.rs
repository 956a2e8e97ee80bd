//! Configuration management for the wiki engine.
//!
//! Parses `inyoka.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String values of the `[wiki]` section support environment variable
//! expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use std::path::{Path, PathBuf};

use inyoka_diff::DEFAULT_MARKERS;
use inyoka_markup::Format;
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub main_page: Option<String>,
    pub template_base: Option<String>,
    pub base_url: Option<String>,
    /// Override the typography transformer flag.
    pub typography: Option<bool>,
    /// Override the default stream TTL in seconds.
    pub cache_ttl: Option<u64>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "inyoka.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wiki: WikiConfig,
    pub render: RenderConfig,
    pub merge: MergeConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Page naming and linking.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    /// Excluded from orphan detection.
    pub main_page: String,
    /// Base page of the template macro and parser.
    pub template_base: String,
    /// Links to this host are rendered as cross links.
    pub base_domain: String,
    /// Prefix of internal page URLs.
    pub base_url: String,
    /// Target of the `user` interwiki prefix, `$PAGE` is the user name.
    pub user_url: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            main_page: "Startseite".to_owned(),
            template_base: "Wiki/Vorlagen".to_owned(),
            base_domain: String::new(),
            base_url: "/".to_owned(),
            user_url: "/user/$PAGE".to_owned(),
        }
    }
}

/// Rendering and stream caching.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Default TTL of compiled streams in seconds.
    pub cache_ttl: u64,
    pub typography: bool,
    /// Formats whose compiled streams are cached.
    pub cached_formats: Vec<Format>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cache_ttl: 86_400,
            typography: true,
            cached_formats: vec![Format::Html],
        }
    }
}

/// Three-way merge of concurrent edits.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Conflicts separated by fewer unchanged lines are joined.
    pub min_match: usize,
    /// Begin, middle and end conflict markers.
    pub markers: [String; 3],
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_match: 3,
            markers: DEFAULT_MARKERS.map(str::to_owned),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`wiki.base_domain`").
        field: String,
        /// Error message (e.g., "${`WIKI_DOMAIN`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `inyoka.toml` in current directory and parents,
    /// falling back to the defaults.
    ///
    /// CLI settings are applied after loading and validated with the rest.
    pub fn load(config_path: Option<&Path>, cli_settings: Option<&CliSettings>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir().ok().and_then(|cwd| discover_config(&cwd)) {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(main_page) = &settings.main_page {
            self.wiki.main_page.clone_from(main_page);
        }
        if let Some(template_base) = &settings.template_base {
            self.wiki.template_base.clone_from(template_base);
        }
        if let Some(base_url) = &settings.base_url {
            self.wiki.base_url.clone_from(base_url);
        }
        if let Some(typography) = settings.typography {
            self.render.typography = typography;
        }
        if let Some(cache_ttl) = settings.cache_ttl {
            self.render.cache_ttl = cache_ttl;
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.wiki.main_page, "wiki.main_page")?;
        require_non_empty(&self.wiki.template_base, "wiki.template_base")?;
        if !self.wiki.user_url.contains("$PAGE") {
            return Err(ConfigError::Validation("wiki.user_url must contain $PAGE".to_owned()));
        }
        self.validate_merge()
    }

    fn validate_merge(&self) -> Result<(), ConfigError> {
        if self.merge.min_match == 0 {
            return Err(ConfigError::Validation(
                "merge.min_match must be at least 1".to_owned(),
            ));
        }
        let [begin, middle, end] = &self.merge.markers;
        for marker in [begin, middle, end] {
            require_non_empty(marker, "merge.markers")?;
        }
        if begin == middle || middle == end || begin == end {
            return Err(ConfigError::Validation("merge.markers must be distinct".to_owned()));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let wiki = &mut self.wiki;
        wiki.main_page = expand::expand_env(&wiki.main_page, "wiki.main_page")?;
        wiki.template_base = expand::expand_env(&wiki.template_base, "wiki.template_base")?;
        wiki.base_domain = expand::expand_env(&wiki.base_domain, "wiki.base_domain")?;
        wiki.base_url = expand::expand_env(&wiki.base_url, "wiki.base_url")?;
        wiki.user_url = expand::expand_env(&wiki.user_url, "wiki.user_url")?;
        Ok(())
    }
}

/// Search for the config file in `start` and its parents.
fn discover_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}
