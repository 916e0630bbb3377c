// Response normalization - turns free-form classifier output into brand names

use log::debug;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::catalog::builtin::KNOWN_PAYMENT_BRANDS;

/// ```json ... ``` block, interior captured without surrounding whitespace.
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("fenced json pattern is valid")
});

static DEFAULT_NORMALIZER: LazyLock<ResponseNormalizer> = LazyLock::new(|| {
    ResponseNormalizer::new(KNOWN_PAYMENT_BRANDS.iter().map(|b| b.to_string()))
});

type Strategy = fn(&ResponseNormalizer, &str) -> Option<Vec<String>>;

/// Tried in order; the first `Some` wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("fenced-json", fenced_json),
    ("json", whole_json),
    ("salvage", salvage_brands),
];

/// Normalizer configured with the brand names the salvage pass looks for.
pub struct ResponseNormalizer {
    salvage: Option<Regex>,
}

impl ResponseNormalizer {
    pub fn new<I>(brands: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut brands: Vec<String> = brands
            .into_iter()
            .filter(|b| !b.trim().is_empty())
            .collect();
        // Longest first so "au PAY" never loses to a shorter brand at the same position.
        brands.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

        let salvage = if brands.is_empty() {
            None
        } else {
            let alternation = brands
                .iter()
                .map(|b| regex::escape(b))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&alternation).ok()
        };

        Self { salvage }
    }

    /// Brand names found in `raw`, deduplicated in first-seen order.
    ///
    /// Never fails; text with nothing recognizable yields an empty list.
    pub fn normalize(&self, raw: &str) -> Vec<String> {
        for (name, strategy) in STRATEGIES {
            if let Some(found) = strategy(self, raw) {
                debug!("Recognition: normalized with {} strategy ({} names)", name, found.len());
                return dedupe(found);
            }
        }
        Vec::new()
    }
}

/// Normalize with the built-in payment brand list.
pub fn normalize(raw: &str) -> Vec<String> {
    DEFAULT_NORMALIZER.normalize(raw)
}

fn parse_string_array(text: &str) -> Option<Vec<String>> {
    serde_json::from_str::<Vec<String>>(text.trim()).ok()
}

fn fenced_json(_: &ResponseNormalizer, raw: &str) -> Option<Vec<String>> {
    let inner = FENCED_JSON.captures(raw)?.get(1)?.as_str();
    parse_string_array(inner)
}

fn whole_json(_: &ResponseNormalizer, raw: &str) -> Option<Vec<String>> {
    parse_string_array(raw)
}

fn salvage_brands(normalizer: &ResponseNormalizer, raw: &str) -> Option<Vec<String>> {
    let pattern = normalizer.salvage.as_ref()?;
    let found: Vec<String> = pattern
        .find_iter(raw)
        .map(|m| m.as_str().to_string())
        .collect();
    (!found.is_empty()).then_some(found)
}

fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
