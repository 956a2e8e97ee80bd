use std::time::Duration;

use inyoka_config::Config;
use inyoka_diff::{DEFAULT_MARKERS, Merger};
use inyoka_markup::Format;

/// Engine settings, usually taken from the configuration file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub main_page: String,
    pub template_base: String,
    pub base_domain: String,
    pub base_url: String,
    pub user_url: String,
    pub cache_ttl: Duration,
    pub typography: bool,
    pub cached_formats: Vec<Format>,
    pub min_match: usize,
    pub markers: [String; 3],
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            main_page: config.wiki.main_page.clone(),
            template_base: config.wiki.template_base.clone(),
            base_domain: config.wiki.base_domain.clone(),
            base_url: config.wiki.base_url.clone(),
            user_url: config.wiki.user_url.clone(),
            cache_ttl: Duration::from_secs(config.render.cache_ttl),
            typography: config.render.typography,
            cached_formats: config.render.cached_formats.clone(),
            min_match: config.merge.min_match,
            markers: config.merge.markers.clone(),
        }
    }
}

impl Settings {
    /// Merger for concurrent edits.
    pub fn merger(&self) -> Merger {
        Merger::new()
            .with_min_match(self.min_match)
            .with_markers(self.markers.clone())
    }

    pub fn uses_default_markers(&self) -> bool {
        self.markers == DEFAULT_MARKERS
    }
}
