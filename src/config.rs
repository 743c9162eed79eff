use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use clap::Parser;
use thiserror::Error;

pub mod feeds;

pub use feeds::{FeedSource, FeedsConfig, TabConfig};

/// Runtime settings of the digest worker.
///
/// Every flag falls back to its environment variable, so the binary can be
/// driven from either.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "news-digest", author, version, about, long_about = None)]
pub struct Config {
    /// Directory holding feeds.yaml and classification_rules.yaml
    #[arg(long, env = "DIGEST_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Directory the run artifacts are written to
    #[arg(long, env = "DIGEST_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Raw feed entries as JSON (`{tab: [entry, ..]}`)
    #[arg(long, env = "DIGEST_INPUT")]
    input: Option<PathBuf>,

    /// Enable debug-level logging
    #[arg(
        long,
        env = "DEBUG_MODE",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    debug: bool,

    /// Maximum characters kept in a presentation summary
    #[arg(long, env = "DIGEST_SUMMARY_MAX_CHARS", default_value_t = 200)]
    summary_max_chars: usize,

    /// UTC offset in hours used for run report timestamps
    #[arg(
        long,
        env = "DIGEST_REPORT_UTC_OFFSET_HOURS",
        default_value_t = 8,
        allow_negative_numbers = true
    )]
    report_utc_offset_hours: i32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Arguments(#[from] clap::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Config {
    /// 環境変数のみから設定値を読み込み、検証する。
    ///
    /// # Errors
    /// `DIGEST_INPUT` が未設定、もしくは値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(["news-digest"])
    }

    /// コマンドライン引数（未指定分は環境変数）から設定値を読み込み、検証する。
    ///
    /// # Errors
    /// 引数の解釈や検証に失敗した場合は [`ConfigError`] を返す。
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.input.is_none() {
            return Err(ConfigError::Missing("DIGEST_INPUT"));
        }
        if self.summary_max_chars == 0 {
            return Err(ConfigError::Invalid {
                name: "DIGEST_SUMMARY_MAX_CHARS",
                source: anyhow::anyhow!("must be greater than zero"),
            });
        }
        if !(-23..=23).contains(&self.report_utc_offset_hours) {
            return Err(ConfigError::Invalid {
                name: "DIGEST_REPORT_UTC_OFFSET_HOURS",
                source: anyhow::anyhow!(
                    "value must be between -23 and 23, got {}",
                    self.report_utc_offset_hours
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the raw feed JSON. Always present after validation.
    #[must_use]
    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    #[must_use]
    pub fn summary_max_chars(&self) -> usize {
        self.summary_max_chars
    }

    #[must_use]
    pub fn report_utc_offset_hours(&self) -> i32 {
        self.report_utc_offset_hours
    }

    #[must_use]
    pub fn feeds_path(&self) -> PathBuf {
        self.config_dir.join("feeds.yaml")
    }

    #[must_use]
    pub fn rules_path(&self) -> PathBuf {
        self.config_dir.join("classification_rules.yaml")
    }
}
