// src/classify/mod.rs
//! Category Classifier.
//!
//! Two pure strategies over a rule table loaded from TOML:
//! - text-rule scoring over `title + content` (see [`rules`])
//! - mapping of feed-native category labels (see [`labels`])
//!
//! The table ships as `config/categories.toml` and is embedded as the built-in default.
//! `CATEGORY_RULES_PATH` points the loader at another file.

pub mod labels;
pub mod rules;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::model::Category;
pub use labels::LabelMap;
pub use rules::CategoryRule;

pub const DEFAULT_CATEGORY_RULES_PATH: &str = "config/categories.toml";
pub const ENV_CATEGORY_RULES_PATH: &str = "CATEGORY_RULES_PATH";

const BUILTIN_RULES: &str = include_str!("../../config/categories.toml");

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct RulesRoot {
    scoring: ScoringCfg,
    rules: Vec<RuleCfg>,
    #[serde(default)]
    labels: LabelsCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringCfg {
    /// A category is assigned when its score is strictly above this value.
    pub threshold: f32,
    #[serde(default = "default_context_weight")]
    pub context_weight: f32,
    #[serde(default = "default_max_categories")]
    pub max_categories: usize,
    /// When nothing scores, text containing this term is tagged `Local`.
    #[serde(default)]
    pub fallback_term: Option<String>,
}

fn default_context_weight() -> f32 {
    1.5
}

fn default_max_categories() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize)]
struct RuleCfg {
    category: Category,
    weight: f32,
    keywords: Vec<String>,
    #[serde(default)]
    context_patterns: Vec<String>,
    #[serde(default)]
    exclude_terms: Vec<String>,
    #[serde(default)]
    require_multiple_keyword_hits: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LabelsCfg {
    #[serde(default)]
    direct: HashMap<String, Category>,
    #[serde(default)]
    entertainment: Option<String>,
    #[serde(default)]
    fallback_terms: Vec<String>,
}

/// Compiled rule table. Cheap to share behind an `Arc`; classification never mutates it.
#[derive(Debug)]
pub struct Classifier {
    scoring: ScoringCfg,
    rules: Vec<CategoryRule>,
    labels: LabelMap,
}

impl Classifier {
    /// Load using `CATEGORY_RULES_PATH`, then `config/categories.toml`, then the embedded table.
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CATEGORY_RULES_PATH) {
            let path = PathBuf::from(p);
            if !path.exists() {
                return Err(anyhow!(
                    "{ENV_CATEGORY_RULES_PATH} points to non-existent path {}",
                    path.display()
                ));
            }
            return Self::from_path(&path);
        }
        let default = PathBuf::from(DEFAULT_CATEGORY_RULES_PATH);
        if default.exists() {
            return Self::from_path(&default);
        }
        Self::builtin()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading category rules from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let root: RulesRoot = toml::from_str(toml_str).context("parsing category rules toml")?;

        if !root.scoring.threshold.is_finite() {
            return Err(anyhow!("scoring.threshold must be a finite number"));
        }

        let rules = root
            .rules
            .into_iter()
            .map(CategoryRule::compile)
            .collect::<Result<Vec<_>>>()?;

        let labels = LabelMap::compile(
            root.labels.direct,
            root.labels.entertainment,
            root.labels.fallback_terms,
        )?;

        let mut scoring = root.scoring;
        scoring.fallback_term = scoring
            .fallback_term
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        Ok(Self {
            scoring,
            rules,
            labels,
        })
    }

    pub fn scoring(&self) -> &ScoringCfg {
        &self.scoring
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Pick the strategy by what the source supplied: feed labels first, text rules when
    /// there are no labels or none of them resolve.
    pub fn classify(&self, title: &str, text: &str, feed_labels: &[String]) -> Vec<Category> {
        if !feed_labels.is_empty() {
            let mapped = self.classify_labels(feed_labels);
            if !mapped.is_empty() {
                return mapped;
            }
        }
        self.classify_text(title, text)
    }
}

/// Lowercase and condense whitespace; shared by keyword and label matching.
pub(crate) fn fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim().to_string()
}
