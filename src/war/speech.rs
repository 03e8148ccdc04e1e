//! War-mode speech filter.
//!
//! Deterministic enforcement over minister output: refusal phrasing is
//! removed, suppressed conceptual patterns are tagged out, and the
//! mandatory cost/risk/exit sections are guaranteed present. Truth is
//! never filtered. The original text is preserved alongside the filtered
//! text so the sovereign can always see what was suppressed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::types::MinisterId;

/// Phrases removed from any filtered minister's output.
pub const DISALLOWED_PHRASES: &[&str] = &[
    "you should not",
    "this is unethical",
    "this is wrong",
    "you must stop",
    "i cannot help with this",
    "i cannot assist",
    "this shouldn't be done",
    "don't do this",
    "i won't help",
    "i refuse",
    "that's immoral",
    "that's illegal",
];

/// Conceptual patterns suppressed for ministers without an override.
pub const BASE_SUPPRESSED_PATTERNS: &[&str] = &[
    "moral judgment",
    "appeal to virtue",
    "absolute refusal",
    "ethical sermon",
];

pub const REFUSAL_MARKER: &str = "[REFUSAL_REMOVED]";
pub const SUPPRESSED_MARKER: &str = "[SUPPRESSED]";

/// Mandatory sections and the placeholder appended when one is missing.
const MANDATORY_SECTIONS: &[(&str, &str)] =
    &[("cost", "[COSTS]"), ("risk", "[RISKS]"), ("exit", "[EXITS]")];

static PHRASE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    DISALLOWED_PHRASES
        .iter()
        .map(|phrase| {
            let pattern = Regex::new(&format!("(?i){}", regex::escape(phrase)))
                .expect("disallowed phrase regex");
            (*phrase, pattern)
        })
        .collect()
});

/// Per-minister suppressed-pattern overrides. Behavior differences are
/// data keyed on the enum.
pub fn suppressed_patterns(minister: MinisterId) -> &'static [&'static str] {
    match minister {
        // Truth is handled before pattern lookup; listed as empty for
        // completeness.
        MinisterId::Truth => &[],
        MinisterId::Psychology => &[
            "empathy framing",
            "emotional protection",
            "psychological safety",
        ],
        MinisterId::Power => &["consensus building", "win-win", "collaboration"],
        MinisterId::Conflict => &["de-escalation", "harmony", "compromise"],
        MinisterId::Diplomacy => &[
            "honesty above all",
            "transparent communication",
            "radical candor",
        ],
        // Risk warns but is never muted on patterns; same for Optionality.
        MinisterId::Risk | MinisterId::Optionality => &[],
        _ => BASE_SUPPRESSED_PATTERNS,
    }
}

/// Audit record for one filter invocation.
#[derive(Debug, Clone, Serialize)]
pub struct FilterAudit {
    pub minister: MinisterId,
    pub phrases_removed: Vec<String>,
    pub patterns_suppressed: Vec<String>,
    pub mandatory_added: Vec<String>,
    pub was_filtered: bool,
    pub original_text: String,
    pub filtered_text: String,
}

/// Apply the war-mode speech filter to one minister's justification.
pub fn filter_speech(minister: MinisterId, text: &str) -> FilterAudit {
    // Truth's text is never filtered.
    if minister == MinisterId::Truth {
        return FilterAudit {
            minister,
            phrases_removed: Vec::new(),
            patterns_suppressed: Vec::new(),
            mandatory_added: Vec::new(),
            was_filtered: false,
            original_text: text.to_string(),
            filtered_text: text.to_string(),
        };
    }

    let mut filtered = text.to_string();
    let mut phrases_removed = Vec::new();
    let mut patterns_suppressed = Vec::new();
    let mut mandatory_added = Vec::new();

    // 1. Remove disallowed phrases.
    for (phrase, pattern) in PHRASE_PATTERNS.iter() {
        if pattern.is_match(&filtered) {
            filtered = pattern.replace_all(&filtered, REFUSAL_MARKER).to_string();
            phrases_removed.push(phrase.to_string());
        }
    }

    // 2. Suppress conceptual patterns.
    for pattern_text in suppressed_patterns(minister) {
        let pattern = Regex::new(&format!("(?i){}", regex::escape(pattern_text)))
            .expect("suppressed pattern regex");
        if pattern.is_match(&filtered) {
            filtered = pattern.replace_all(&filtered, SUPPRESSED_MARKER).to_string();
            patterns_suppressed.push(pattern_text.to_string());
        }
    }

    // 3. Guarantee the mandatory sections; placeholders are filled by the
    //    composition step.
    let lower = filtered.to_lowercase();
    for (needle, placeholder) in MANDATORY_SECTIONS {
        if !lower.contains(needle) {
            filtered.push('\n');
            filtered.push_str(placeholder);
            mandatory_added.push(placeholder.to_string());
        }
    }

    let was_filtered =
        !phrases_removed.is_empty() || !patterns_suppressed.is_empty() || !mandatory_added.is_empty();

    FilterAudit {
        minister,
        phrases_removed,
        patterns_suppressed,
        mandatory_added,
        was_filtered,
        original_text: text.to_string(),
        filtered_text: filtered,
    }
}
