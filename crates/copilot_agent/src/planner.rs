//! Constraint planner.
//!
//! Resolves a date range, a product category and a KPI formula from the
//! question and its retrieved passages using the configured lookup tables.
//! The question wins; date range and formula fall back to the best-ranked
//! passage naming exactly one candidate. Categories come from the question
//! only, ignoring words that are part of a campaign name. Anything
//! unresolved stays `None`.

use crate::config::PlannerConfig;
use copilot_shared::{Constraints, DateRange, KpiFormula, RetrievedPassage};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(199\d|20\d\d)\b").expect("valid regex"));

/// Case-insensitive whole-phrase matcher
fn phrase_regex(phrase: &str) -> Option<Regex> {
    let phrase = phrase.trim();
    let first = phrase.chars().next()?;
    let last = phrase.chars().last()?;
    let lead = if first.is_alphanumeric() { r"\b" } else { "" };
    let tail = if last.is_alphanumeric() { r"\b" } else { "" };
    Regex::new(&format!("(?i){}{}{}", lead, regex::escape(phrase), tail)).ok()
}

/// A lookup-table entry and the phrases that name it
#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    patterns: Vec<Regex>,
}

impl<T: Clone + PartialEq> Entry<T> {
    fn new(value: T, names: impl IntoIterator<Item = String>) -> Self {
        Self {
            value,
            patterns: names.into_iter().filter_map(|n| phrase_regex(&n)).collect(),
        }
    }

    /// Earliest match position in `text`
    fn position(&self, text: &str) -> Option<usize> {
        self.patterns
            .iter()
            .filter_map(|p| p.find(text).map(|m| m.start()))
            .min()
    }

    fn mentioned_in(&self, text: &str) -> bool {
        self.position(text).is_some()
    }

    /// Blank out every match so later lookups cannot see inside it
    fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for p in &self.patterns {
            let spans: Vec<(usize, usize)> = p.find_iter(&masked).map(|m| (m.start(), m.end())).collect();
            for (start, end) in spans {
                masked.replace_range(start..end, &" ".repeat(end - start));
            }
        }
        masked
    }
}

/// Entry mentioned first in the text; ties go to table order
fn first_mentioned<'a, T: Clone + PartialEq>(entries: &'a [Entry<T>], text: &str) -> Option<&'a Entry<T>> {
    entries
        .iter()
        .filter_map(|e| e.position(text).map(|pos| (pos, e)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, e)| e)
}

/// Highest-ranked passage that names exactly one distinct entry
fn single_in_passages<'a, T: Clone + PartialEq>(
    entries: &'a [Entry<T>],
    passages: &[RetrievedPassage],
) -> Option<&'a Entry<T>> {
    passages.iter().find_map(|p| {
        let named: Vec<&Entry<T>> = entries.iter().filter(|e| e.mentioned_in(&p.text)).collect();
        match named.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    })
}

/// Lookup-table constraint extractor
#[derive(Debug, Clone)]
pub struct Planner {
    campaigns: Vec<Entry<DateRange>>,
    categories: Vec<Entry<String>>,
    kpis: Vec<Entry<KpiFormula>>,
    detect_years: bool,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(&PlannerConfig::default())
    }
}

impl Planner {
    pub fn new(config: &PlannerConfig) -> Self {
        let campaigns = config
            .campaigns
            .iter()
            .map(|c| {
                let names = std::iter::once(c.name.clone()).chain(c.aliases.iter().cloned());
                Entry::new(DateRange::new(&c.name, c.start, c.end), names)
            })
            .collect();
        let categories = config
            .categories
            .iter()
            .map(|c| Entry::new(c.clone(), std::iter::once(c.clone())))
            .collect();
        let kpis = config
            .kpis
            .iter()
            .map(|k| {
                let names = std::iter::once(k.name.clone()).chain(k.aliases.iter().cloned());
                Entry::new(k.formula, names)
            })
            .collect();

        Self {
            campaigns,
            categories,
            kpis,
            detect_years: config.detect_years,
        }
    }

    /// Pure, total and deterministic
    pub fn extract(&self, question: &str, passages: &[RetrievedPassage]) -> Constraints {
        let campaign = first_mentioned(&self.campaigns, question);

        let date_range = campaign
            .map(|e| e.value.clone())
            .or_else(|| self.year_in(question))
            .or_else(|| single_in_passages(&self.campaigns, passages).map(|e| e.value.clone()));

        // "Summer Beverages 1997" names a campaign, not the Beverages category
        let without_campaign = match campaign {
            Some(e) => e.mask(question),
            None => question.to_string(),
        };
        let category = first_mentioned(&self.categories, &without_campaign);

        let kpi = first_mentioned(&self.kpis, question).or_else(|| single_in_passages(&self.kpis, passages));

        // Passages mentioning a resolved campaign, category or KPI
        let campaign_used = self
            .campaigns
            .iter()
            .find(|e| date_range.as_ref() == Some(&e.value));
        let evidence = passages
            .iter()
            .filter(|p| {
                campaign_used.map_or(false, |e| e.mentioned_in(&p.text))
                    || category.map_or(false, |e| e.mentioned_in(&p.text))
                    || kpi.map_or(false, |e| e.mentioned_in(&p.text))
            })
            .fold(Vec::<String>::new(), |mut acc, p| {
                if !acc.contains(&p.chunk_id) {
                    acc.push(p.chunk_id.clone());
                }
                acc
            });

        let constraints = Constraints {
            date_range,
            category: category.map(|e| e.value.clone()),
            formula: kpi.map(|e| e.value),
            evidence,
        };
        debug!("Planner: {}", constraints.summary());
        constraints
    }

    fn year_in(&self, question: &str) -> Option<DateRange> {
        if !self.detect_years {
            return None;
        }
        YEAR_RE
            .captures(question)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .and_then(DateRange::year)
    }
}
