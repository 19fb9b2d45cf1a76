use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sectionizer_core::{ConfigError, ReferenceWeights, SectionizerConfig, SectionizerConfigBuilder};

use crate::BatchError;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub heading: Option<HeadingConfig>,
    pub keywords: Option<KeywordsConfig>,
    pub validity: Option<ValidityConfig>,
    pub references: Option<ReferencesConfig>,
    pub batch: Option<BatchFileConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingConfig {
    pub min_words: Option<usize>,
    pub max_words: Option<usize>,
    pub blank_before: Option<usize>,
    pub blank_after: Option<usize>,
    pub abstract_anchor: Option<String>,
}

/// Keyword lists. `drop_local` and friends replace the built-in lists;
/// the `extra_*` variants extend them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordsConfig {
    pub drop_local: Option<Vec<String>>,
    pub keep_then_halt: Option<Vec<String>>,
    pub halt_and_drop: Option<Vec<String>>,
    pub extra_drop_local: Option<Vec<String>>,
    pub extra_keep_then_halt: Option<Vec<String>>,
    pub extra_halt_and_drop: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidityConfig {
    pub threshold: Option<f64>,
    pub check_line_language: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencesConfig {
    pub threshold: Option<i32>,
    pub patience: Option<usize>,
    pub paragraph_split: Option<String>,
    pub weights: Option<ReferenceWeights>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFileConfig {
    pub num_workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub output_dir: Option<String>,
}

/// Platform config directory path: `<config_dir>/sectionizer/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sectionizer").join("config.toml"))
}

/// Load config by cascading CWD `.sectionizer.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".sectionizer.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Load an explicitly requested config file; unlike the cascade, a missing
/// or broken file is an error.
pub fn read_config(path: &Path) -> Result<ConfigFile, BatchError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| BatchError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let h = (base.heading.unwrap_or_default(), overlay.heading.unwrap_or_default());
    let k = (base.keywords.unwrap_or_default(), overlay.keywords.unwrap_or_default());
    let v = (base.validity.unwrap_or_default(), overlay.validity.unwrap_or_default());
    let r = (base.references.unwrap_or_default(), overlay.references.unwrap_or_default());
    let b = (base.batch.unwrap_or_default(), overlay.batch.unwrap_or_default());

    ConfigFile {
        heading: Some(HeadingConfig {
            min_words: h.1.min_words.or(h.0.min_words),
            max_words: h.1.max_words.or(h.0.max_words),
            blank_before: h.1.blank_before.or(h.0.blank_before),
            blank_after: h.1.blank_after.or(h.0.blank_after),
            abstract_anchor: h.1.abstract_anchor.or(h.0.abstract_anchor),
        }),
        keywords: Some(KeywordsConfig {
            drop_local: k.1.drop_local.or(k.0.drop_local),
            keep_then_halt: k.1.keep_then_halt.or(k.0.keep_then_halt),
            halt_and_drop: k.1.halt_and_drop.or(k.0.halt_and_drop),
            extra_drop_local: k.1.extra_drop_local.or(k.0.extra_drop_local),
            extra_keep_then_halt: k.1.extra_keep_then_halt.or(k.0.extra_keep_then_halt),
            extra_halt_and_drop: k.1.extra_halt_and_drop.or(k.0.extra_halt_and_drop),
        }),
        validity: Some(ValidityConfig {
            threshold: v.1.threshold.or(v.0.threshold),
            check_line_language: v.1.check_line_language.or(v.0.check_line_language),
        }),
        references: Some(ReferencesConfig {
            threshold: r.1.threshold.or(r.0.threshold),
            patience: r.1.patience.or(r.0.patience),
            paragraph_split: r.1.paragraph_split.or(r.0.paragraph_split),
            weights: r.1.weights.or(r.0.weights),
        }),
        batch: Some(BatchFileConfig {
            num_workers: b.1.num_workers.or(b.0.num_workers),
            timeout_secs: b.1.timeout_secs.or(b.0.timeout_secs),
            output_dir: b.1.output_dir.or(b.0.output_dir),
        }),
    }
}

impl ConfigFile {
    /// Build the core configuration described by this file.
    pub fn sectionizer_config(&self) -> Result<SectionizerConfig, ConfigError> {
        let mut builder = SectionizerConfigBuilder::new();

        if let Some(h) = &self.heading {
            if let Some(n) = h.min_words {
                builder = builder.min_heading_words(n);
            }
            if let Some(n) = h.max_words {
                builder = builder.max_heading_words(n);
            }
            if let Some(n) = h.blank_before {
                builder = builder.blank_lines_before(n);
            }
            if let Some(n) = h.blank_after {
                builder = builder.blank_lines_after(n);
            }
            if let Some(anchor) = &h.abstract_anchor {
                builder = builder.abstract_anchor(anchor);
            }
        }

        if let Some(k) = &self.keywords {
            if let Some(list) = &k.drop_local {
                builder = builder.set_drop_local_keywords(list.clone());
            }
            if let Some(list) = &k.keep_then_halt {
                builder = builder.set_keep_then_halt_keywords(list.clone());
            }
            if let Some(list) = &k.halt_and_drop {
                builder = builder.set_halt_and_drop_keywords(list.clone());
            }
            for kw in k.extra_drop_local.iter().flatten() {
                builder = builder.add_drop_local_keyword(kw.clone());
            }
            for kw in k.extra_keep_then_halt.iter().flatten() {
                builder = builder.add_keep_then_halt_keyword(kw.clone());
            }
            for kw in k.extra_halt_and_drop.iter().flatten() {
                builder = builder.add_halt_and_drop_keyword(kw.clone());
            }
        }

        if let Some(v) = &self.validity {
            if let Some(t) = v.threshold {
                builder = builder.validity_threshold(t);
            }
            if let Some(enabled) = v.check_line_language {
                builder = builder.check_line_language(enabled);
            }
        }

        if let Some(r) = &self.references {
            if let Some(t) = r.threshold {
                builder = builder.reference_threshold(t);
            }
            if let Some(p) = r.patience {
                builder = builder.patience(p);
            }
            if let Some(pattern) = &r.paragraph_split {
                builder = builder.paragraph_split_regex(pattern);
            }
            if let Some(w) = &r.weights {
                builder = builder.reference_weights(w.clone());
            }
        }

        builder.build()
    }

    pub fn num_workers(&self) -> Option<usize> {
        self.batch.as_ref().and_then(|b| b.num_workers)
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.batch.as_ref().and_then(|b| b.timeout_secs)
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.batch
            .as_ref()
            .and_then(|b| b.output_dir.as_ref())
            .map(PathBuf::from)
    }
}
