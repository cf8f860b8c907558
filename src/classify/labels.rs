// src/classify/labels.rs
//! Mapping of feed-native category labels onto [`Category`].
//!
//! Order of resolution:
//! 1. direct label table (whole label, case-insensitive)
//! 2. the entertainment label resolves to `Local` when `Local` is already present, else `World`
//! 3. nothing direct → each label is substring-matched against the text-rule keywords
//! 4. still nothing → `Local` when any label mentions a fallback term ("fiji", "pacific")

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::{fold, Classifier};
use crate::model::Category;

#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    direct: HashMap<String, Category>,
    entertainment: Option<String>,
    fallback_terms: Vec<String>,
}

impl LabelMap {
    pub(super) fn compile(
        direct: HashMap<String, Category>,
        entertainment: Option<String>,
        fallback_terms: Vec<String>,
    ) -> Result<Self> {
        let mut table = HashMap::with_capacity(direct.len());
        for (label, cat) in direct {
            if cat == Category::All {
                return Err(anyhow!("label `{label}` cannot map to the `All` wildcard"));
            }
            let key = fold(&label);
            if !key.is_empty() {
                table.insert(key, cat);
            }
        }
        Ok(Self {
            direct: table,
            entertainment: entertainment.map(|e| fold(&e)).filter(|e| !e.is_empty()),
            fallback_terms: fallback_terms
                .iter()
                .map(|t| fold(t))
                .filter(|t| !t.is_empty())
                .collect(),
        })
    }

    pub fn lookup(&self, label: &str) -> Option<Category> {
        self.direct.get(&fold(label)).copied()
    }
}

fn push_unique(out: &mut Vec<Category>, c: Category) {
    if !out.contains(&c) {
        out.push(c);
    }
}

impl Classifier {
    /// Categories for an item the feed already tagged. Empty when nothing resolves.
    pub fn classify_labels(&self, labels: &[String]) -> Vec<Category> {
        let folded: Vec<String> = labels
            .iter()
            .map(|l| fold(l))
            .filter(|l| !l.is_empty())
            .collect();

        let mut out = Vec::new();
        let mut saw_entertainment = false;

        for label in &folded {
            if self.labels.entertainment.as_deref() == Some(label.as_str()) {
                saw_entertainment = true;
                continue;
            }
            if let Some(c) = self.labels.direct.get(label) {
                push_unique(&mut out, *c);
            }
        }

        // Resolved after every other label so the result is order-independent.
        if saw_entertainment {
            let c = if out.contains(&Category::Local) {
                Category::Local
            } else {
                Category::World
            };
            push_unique(&mut out, c);
        }
        if !out.is_empty() {
            return out;
        }

        for label in &folded {
            for rule in &self.rules {
                if rule.keywords.iter().any(|k| label.contains(k.as_str())) {
                    push_unique(&mut out, rule.category);
                }
            }
        }
        if !out.is_empty() {
            return out;
        }

        let mentions_fallback = folded.iter().any(|l| {
            self.labels
                .fallback_terms
                .iter()
                .any(|t| l.contains(t.as_str()))
        });
        if mentions_fallback {
            return vec![Category::Local];
        }
        out
    }
}
