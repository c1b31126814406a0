use std::path::PathBuf;

use displaydoc::Display;
use thiserror::Error;

/// The potential errors of the configuration.
#[derive(Debug, Display, Error, PartialEq)]
pub enum ConfigError {
    /// The reserved tokens must be non-empty and distinct
    ReservedTokens,
    /// The length percentile must be greater than zero and at most one
    Percentile,
}

/// The strings of the reserved tokens.
///
/// The padding token is reserved in the label vocabulary as well.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedTokens {
    pub pad: String,
    pub unk: String,
    pub bos: String,
    pub eos: String,
}

impl ReservedTokens {
    /// Gets the reserved tokens in the order of their indices.
    pub fn tokens(&self) -> [&str; 4] {
        [
            self.pad.as_str(),
            self.unk.as_str(),
            self.bos.as_str(),
            self.eos.as_str(),
        ]
    }
}

impl Default for ReservedTokens {
    fn default() -> Self {
        Self {
            pad: "<PAD>".into(),
            unk: "<UNK>".into(),
            bos: "<BOS>".into(),
            eos: "<EOS>".into(),
        }
    }
}

/// The configuration of a processor.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) reserved: ReservedTokens,
    pub(crate) percentile: f64,
    pub(crate) cache_dir: Option<PathBuf>,
}

impl Config {
    /// The default percentile of the recommended sequence lengths.
    pub const PERCENTILE: f64 = 0.95;

    /// Creates a configuration with the default reserved tokens and percentile and without a
    /// cache directory.
    pub fn new() -> Self {
        Self {
            reserved: ReservedTokens::default(),
            percentile: Self::PERCENTILE,
            cache_dir: None,
        }
    }

    /// Sets the reserved tokens.
    ///
    /// Defaults to `"<PAD>"`, `"<UNK>"`, `"<BOS>"` and `"<EOS>"`.
    ///
    /// # Errors
    /// Fails if any token is empty or if the tokens are not distinct.
    pub fn with_reserved_tokens(
        mut self,
        pad: impl Into<String>,
        unk: impl Into<String>,
        bos: impl Into<String>,
        eos: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let reserved = ReservedTokens {
            pad: pad.into(),
            unk: unk.into(),
            bos: bos.into(),
            eos: eos.into(),
        };
        let tokens = reserved.tokens();
        let distinct = tokens
            .iter()
            .enumerate()
            .all(|(i, token)| !token.is_empty() && !tokens[..i].contains(token));

        if distinct {
            self.reserved = reserved;
            Ok(self)
        } else {
            Err(ConfigError::ReservedTokens)
        }
    }

    /// Sets the percentile of the recommended sequence lengths.
    ///
    /// Defaults to [`Config::PERCENTILE`].
    ///
    /// # Errors
    /// Fails if `percentile` is not within `(0, 1]`.
    pub fn with_length_percentile(mut self, percentile: f64) -> Result<Self, ConfigError> {
        if percentile > 0. && percentile <= 1. {
            self.percentile = percentile;
            Ok(self)
        } else {
            Err(ConfigError::Percentile)
        }
    }

    /// Sets the directory to load cached vocabularies from.
    ///
    /// Defaults to `None`, in which case the vocabularies are built from the corpus.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
