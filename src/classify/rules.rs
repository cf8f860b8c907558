// src/classify/rules.rs
//! Text-rule scoring.
//!
//! Per category, over the case-folded `title + content`:
//! - any exclude term present → category skipped
//! - `require_multiple_keyword_hits` and fewer than 2 keyword hits → skipped
//! - score = (keyword_hits + context_hits * context_weight) * weight
//! - assigned when score > threshold; ranked by score, capped at `max_categories`
//!
//! Nothing assigned and the text mentions the fallback term → `Local`.

use anyhow::{anyhow, Result};
use regex::Regex;

use super::{fold, Classifier, RuleCfg};
use crate::model::Category;

#[derive(Debug)]
pub struct CategoryRule {
    pub category: Category,
    pub weight: f32,
    /// Lowercased substrings.
    pub keywords: Vec<String>,
    pub context_patterns: Vec<Regex>,
    /// Lowercased substrings.
    pub exclude_terms: Vec<String>,
    pub require_multiple_keyword_hits: bool,
}

impl CategoryRule {
    pub(super) fn compile(cfg: RuleCfg) -> Result<Self> {
        if cfg.category == Category::All {
            return Err(anyhow!("`All` is a filter wildcard and cannot carry a rule"));
        }
        if !cfg.weight.is_finite() {
            return Err(anyhow!("rule `{}` weight must be finite", cfg.category));
        }
        let context_patterns = cfg
            .context_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    anyhow!("rule `{}` context pattern `{}`: {}", cfg.category, p, e)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            category: cfg.category,
            weight: cfg.weight,
            keywords: clean_terms(cfg.keywords),
            context_patterns,
            exclude_terms: clean_terms(cfg.exclude_terms),
            require_multiple_keyword_hits: cfg.require_multiple_keyword_hits,
        })
    }

    /// `folded` must already be lowercased.
    pub fn is_excluded(&self, folded: &str) -> bool {
        self.exclude_terms.iter().any(|t| folded.contains(t.as_str()))
    }

    pub fn keyword_hits(&self, folded: &str) -> usize {
        self.keywords
            .iter()
            .filter(|k| folded.contains(k.as_str()))
            .count()
    }

    pub fn context_hits(&self, folded: &str) -> usize {
        self.context_patterns
            .iter()
            .filter(|re| re.is_match(folded))
            .count()
    }

    /// `None` when the rule is excluded or short of the required keyword hits.
    pub fn score(&self, folded: &str, context_weight: f32) -> Option<f32> {
        if self.is_excluded(folded) {
            return None;
        }
        let keywords = self.keyword_hits(folded);
        if self.require_multiple_keyword_hits && keywords < 2 {
            return None;
        }
        let context = self.context_hits(folded);
        Some((keywords as f32 + context as f32 * context_weight) * self.weight)
    }
}

fn clean_terms(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = fold(&it);
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

impl Classifier {
    /// Every category scoring above the threshold, highest first (uncapped).
    /// Ties keep rule-table order.
    pub fn scores(&self, title: &str, content: &str) -> Vec<(Category, f32)> {
        let folded = fold(&format!("{title} {content}"));
        let mut scored: Vec<(Category, f32)> = self
            .rules
            .iter()
            .filter_map(|rule| {
                rule.score(&folded, self.scoring.context_weight)
                    .map(|s| (rule.category, s))
            })
            .filter(|(_, s)| *s > self.scoring.threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    /// Ranked categories for free text, capped at `max_categories`.
    pub fn classify_text(&self, title: &str, content: &str) -> Vec<Category> {
        let ranked = self.scores(title, content);
        if ranked.is_empty() {
            let folded = fold(&format!("{title} {content}"));
            return match &self.scoring.fallback_term {
                Some(term) if folded.contains(term.as_str()) => vec![Category::Local],
                _ => Vec::new(),
            };
        }
        ranked
            .into_iter()
            .take(self.scoring.max_categories)
            .map(|(c, _)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(keywords: &[&str], require_multiple: bool) -> CategoryRule {
        CategoryRule {
            category: Category::Business,
            weight: 0.5,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            context_patterns: vec![Regex::new(r"(?i)\bmillion\s+dollars\b").unwrap()],
            exclude_terms: vec!["lottery".into()],
            require_multiple_keyword_hits: require_multiple,
        }
    }

    #[test]
    fn score_formula() {
        let r = rule(&["market", "trade"], false);
        let s = r.score("market trade worth a million dollars", 1.5).unwrap();
        assert!((s - (2.0 + 1.5) * 0.5).abs() < 1e-6);
    }

    #[test]
    fn exclusion_short_circuits() {
        let r = rule(&["market"], false);
        assert!(r.score("market lottery", 1.5).is_none());
    }

    #[test]
    fn multiple_hits_requirement() {
        let r = rule(&["market", "trade"], true);
        assert!(r.score("market only, a million dollars", 1.5).is_none());
        assert!(r.score("market and trade", 1.5).is_some());
    }
}
