//! Run configuration.
//!
//! Settings are read once at startup from a TOML file (default
//! `~/.wikibook.toml`), then environment overrides are applied. Missing
//! entries fall back to defaults; the resulting [`Config`] is validated
//! before any article is touched and passed by reference from then on.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Name of the per-user config file in the home directory.
pub const CONFIG_FILE_NAME: &str = ".wikibook.toml";

/// Where the article body comes from.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ContentSource {
    /// Plain-text extract with section markers.
    #[default]
    Extract,
    /// Rendered HTML, cleaned down to text blocks.
    Html,
}

impl std::str::FromStr for ContentSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extract" => Ok(ContentSource::Extract),
            "html" => Ok(ContentSource::Html),
            other => Err(Error::Config(format!("unknown content source '{other}'"))),
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::Config(format!("unknown log level '{other}'"))),
        }
    }
}

/// Settings for one run; deserializable from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_agent: String,
    /// Timeout for API requests, in seconds.
    pub timeout_secs: u64,
    /// Timeout for each image download, in seconds.
    pub image_timeout_secs: u64,
    pub max_concurrent_downloads: usize,
    /// Requested width of the lead thumbnail.
    pub thumbnail_width: u32,
    /// Wiki host used when the URL does not name one.
    pub default_host: String,
    /// Language tag override; otherwise derived from the wiki host.
    pub language: Option<String>,
    /// Directory finished books are delivered to.
    pub output_dir: PathBuf,
    pub content_source: ContentSource,
    /// `dc:creator` of every book.
    pub author: String,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            user_agent: default_user_agent(),
            timeout_secs: 30,
            image_timeout_secs: 20,
            max_concurrent_downloads: 4,
            thumbnail_width: 800,
            default_host: "en.wikipedia.org".to_string(),
            language: None,
            output_dir: PathBuf::from("."),
            content_source: ContentSource::Extract,
            author: "Wikipedia".to_string(),
            log_level: LogLevel::Info,
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "wikibook/{} (EPUB converter; https://github.com/wikibook/wikibook)",
        env!("CARGO_PKG_VERSION")
    )
}

impl Config {
    /// Load from `path`, or from `~/.wikibook.toml` when no path is given,
    /// then apply `WIKIBOOK_*` environment overrides.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                info!(path = %path.display(), "Loaded config");
                parse_config(&raw)?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => {
                    let raw = fs::read_to_string(&path).map_err(|e| {
                        Error::Config(format!("cannot read {}: {e}", path.display()))
                    })?;
                    info!(path = %path.display(), "Loaded config");
                    parse_config(&raw)?
                }
                _ => {
                    debug!("No config file found, using defaults");
                    Config::default()
                }
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides looked up by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("WIKIBOOK_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(language) = lookup("WIKIBOOK_LANGUAGE") {
            self.language = Some(language).filter(|l| !l.trim().is_empty());
        }
        if let Some(agent) = lookup("WIKIBOOK_USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(secs) = lookup("WIKIBOOK_TIMEOUT_SECS") {
            self.timeout_secs = secs.trim().parse().map_err(|_| {
                Error::Config(format!("WIKIBOOK_TIMEOUT_SECS is not a number: '{secs}'"))
            })?;
        }
        if let Some(level) = lookup("WIKIBOOK_LOG_LEVEL") {
            self.log_level = level.parse()?;
        }
        Ok(())
    }

    /// Reject settings that would make every article fail.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.user_agent.trim().is_empty() {
            problems.push("user_agent is empty");
        }
        if self.timeout_secs == 0 {
            problems.push("timeout_secs must be positive");
        }
        if self.image_timeout_secs == 0 {
            problems.push("image_timeout_secs must be positive");
        }
        if self.thumbnail_width == 0 {
            problems.push("thumbnail_width must be positive");
        }
        if self.default_host.trim().is_empty() {
            problems.push("default_host is empty");
        }
        if self.output_dir.as_os_str().is_empty() {
            problems.push("output_dir is empty");
        }
        if self.author.trim().is_empty() {
            problems.push("author is empty");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join(", ")))
        }
    }

    /// Number of parallel image downloads, at least one.
    pub fn download_concurrency(&self) -> usize {
        self.max_concurrent_downloads.max(1)
    }
}

/// Parse TOML config text.
pub fn parse_config(raw: &str) -> Result<Config> {
    toml::from_str(raw).map_err(|e| Error::Config(format!("invalid config: {e}")))
}

fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download_concurrency(), 4);
        assert_eq!(config.content_source, ContentSource::Extract);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = parse_config(
            r#"
            output_dir = "/tmp/books"
            content_source = "html"
            max_concurrent_downloads = 0
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/books"));
        assert_eq!(config.content_source, ContentSource::Html);
        assert_eq!(config.download_concurrency(), 1);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.author, "Wikipedia");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            parse_config("timeout_secs = \"soon\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WIKIBOOK_OUTPUT_DIR", "/srv/kindle"),
            ("WIKIBOOK_LANGUAGE", "de"),
            ("WIKIBOOK_TIMEOUT_SECS", "5"),
            ("WIKIBOOK_LOG_LEVEL", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/srv/kindle"));
        assert_eq!(config.language.as_deref(), Some("de"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_bad_env_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "WIKIBOOK_TIMEOUT_SECS").then(|| "later".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let config = Config {
            user_agent: " ".to_string(),
            timeout_secs: 0,
            output_dir: PathBuf::new(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("user_agent"));
        assert!(err.contains("timeout_secs"));
        assert!(err.contains("output_dir"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wikibook.toml");
        fs::write(&path, "author = \"Example Wiki\"\nthumbnail_width = 640\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.author, "Example Wiki");
        assert_eq!(config.thumbnail_width, 640);
    }
}
