//! Keyword-based industry detection for discovery conversations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Context-bag key holding the first industry ever detected.
pub const INDUSTRY_KEY: &str = "industry";

/// Context-bag key holding every industry detected in the latest message.
pub const DETECTED_INDUSTRIES_KEY: &str = "detected_industries";

/// Industries the consultant has specialised guidance for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Healthcare,
    ItServices,
    FinancialServices,
    Retail,
    Manufacturing,
    Telecommunications,
}

impl Industry {
    /// Detection order; the first match wins when several are present.
    pub const ALL: [Industry; 6] = [
        Industry::Healthcare,
        Industry::ItServices,
        Industry::FinancialServices,
        Industry::Retail,
        Industry::Manufacturing,
        Industry::Telecommunications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Healthcare => "healthcare",
            Industry::ItServices => "it_services",
            Industry::FinancialServices => "financial_services",
            Industry::Retail => "retail",
            Industry::Manufacturing => "manufacturing",
            Industry::Telecommunications => "telecommunications",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Industry::Healthcare => &[
                "healthcare", "medical", "hospital", "patient", "doctor", "clinic", "health",
                "pharma",
            ],
            Industry::ItServices => &[
                "it", "software", "technology", "cloud", "computing", "tech", "digital", "server",
            ],
            Industry::FinancialServices => &[
                "financial", "banking", "insurance", "bank", "finance", "investment", "loan",
            ],
            Industry::Retail => &[
                "retail", "store", "shop", "e-commerce", "customer", "product", "merchandise",
            ],
            Industry::Manufacturing => &[
                "manufacturing", "factory", "production", "assembly", "industrial",
            ],
            Industry::Telecommunications => &[
                "telecom", "telecommunication", "network", "cellular", "mobile",
            ],
        }
    }

    fn mentioned_in(&self, lower: &str, words: &[&str]) -> bool {
        self.keywords().iter().any(|kw| {
            // Short keywords like "it" only count as whole words.
            if kw.len() <= 3 {
                words.contains(kw)
            } else {
                lower.contains(kw)
            }
        })
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every industry mentioned in `text`, in detection order.
pub fn detect_industries(text: &str) -> Vec<Industry> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();

    Industry::ALL
        .iter()
        .copied()
        .filter(|industry| industry.mentioned_in(&lower, &words))
        .collect()
}

/// Records industries mentioned in `text` into a session context bag.
///
/// The primary `industry` key is only set once; `detected_industries` is
/// refreshed on every message that mentions any industry. Returns true if
/// the bag changed.
pub fn record_industries(context: &mut Map<String, Value>, text: &str) -> bool {
    let detected = detect_industries(text);
    let Some(first) = detected.first() else {
        return false;
    };

    let mut changed = false;
    let has_primary = context
        .get(INDUSTRY_KEY)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_primary {
        context.insert(INDUSTRY_KEY.to_string(), Value::from(first.as_str()));
        changed = true;
    }

    let all = Value::from(detected.iter().map(|i| i.as_str()).collect::<Vec<_>>());
    if context.get(DETECTED_INDUSTRIES_KEY) != Some(&all) {
        context.insert(DETECTED_INDUSTRIES_KEY.to_string(), all);
        changed = true;
    }
    changed
}
