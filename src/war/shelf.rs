//! War-mode book selection bias.
//!
//! Scores every candidate book against the war-mode preference tables and
//! constrains retrieval to the top slice. This is selection, not
//! censorship: nothing is removed from the store, and the ranking is
//! deterministic — ties break by book id.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::{BookMetadata, Domain, Tone};

pub const PREFERRED_DOMAIN_BONUS: f64 = 2.0;
pub const DEPRIORITIZED_DOMAIN_PENALTY: f64 = -1.5;
pub const PREFERRED_TONE_BONUS: f64 = 1.5;
pub const DEPRIORITIZED_TONE_PENALTY: f64 = -0.8;

pub const MIN_BOOKS: usize = 2;
pub const MAX_BOOKS: usize = 5;

/// Leverage-heavy, strategic, outcome-focused domains.
pub const PREFERRED_DOMAINS: &[Domain] = &[
    Domain::Power,
    Domain::Psychology,
    Domain::Conflict,
    Domain::Deception,
    Domain::Intelligence,
    Domain::Timing,
    Domain::Strategy,
];

/// Soft, moral, harmony-focused domains.
pub const DEPRIORITIZED_DOMAINS: &[Domain] = &[Domain::Morality, Domain::Diplomacy];

pub const PREFERRED_TONES: &[Tone] = &[
    Tone::Dark,
    Tone::Strategic,
    Tone::Cold,
    Tone::Competitive,
    Tone::Amoral,
];

pub const DEPRIORITIZED_TONES: &[Tone] = &[
    Tone::Moral,
    Tone::Cautionary,
    Tone::Therapeutic,
    Tone::Inspiring,
];

/// Why a book scored what it did. Kept for transparency.
#[derive(Debug, Clone, Serialize)]
pub struct BookScore {
    pub book_id: String,
    pub score: f64,
    pub domain_contribution: f64,
    pub tone_contribution: f64,
    pub priority_multiplier: f64,
}

/// Score one book for war-mode retrieval preference.
pub fn score_book(meta: &BookMetadata) -> BookScore {
    let mut domain_score = 0.0;
    for domain in &meta.domains {
        if PREFERRED_DOMAINS.contains(domain) {
            domain_score += PREFERRED_DOMAIN_BONUS;
        }
        if DEPRIORITIZED_DOMAINS.contains(domain) {
            domain_score += DEPRIORITIZED_DOMAIN_PENALTY;
        }
    }

    let mut tone_score = 0.0;
    for tone in &meta.tones {
        if PREFERRED_TONES.contains(tone) {
            tone_score += PREFERRED_TONE_BONUS;
        }
        if DEPRIORITIZED_TONES.contains(tone) {
            tone_score += DEPRIORITIZED_TONE_PENALTY;
        }
    }

    let multiplier = meta.priority.war;
    BookScore {
        book_id: meta.book_id.clone(),
        score: (domain_score + tone_score) * multiplier,
        domain_contribution: domain_score,
        tone_contribution: tone_score,
        priority_multiplier: multiplier,
    }
}

/// Rank books and keep the retrieval shelf: top `MAX_BOOKS` by score,
/// ties broken by book id, books scoring ≤ 0 never included.
///
/// Returns the shelf and the full scoring record for the audit trail.
pub fn select_books(books: &[BookMetadata]) -> (BTreeSet<String>, Vec<BookScore>) {
    let mut scores: Vec<BookScore> = books.iter().map(score_book).collect();
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.book_id.cmp(&b.book_id))
    });

    let shelf: BTreeSet<String> = scores
        .iter()
        .filter(|s| s.score > 0.0)
        .take(MAX_BOOKS)
        .map(|s| s.book_id.clone())
        .collect();

    (shelf, scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModePriority;

    fn book(id: &str, domains: &[Domain], tones: &[Tone], war: f64) -> BookMetadata {
        BookMetadata {
            book_id: id.into(),
            domains: domains.iter().copied().collect(),
            tones: tones.iter().copied().collect(),
            priority: ModePriority {
                normal: 0.5,
                war,
                quick: 0.5,
            },
        }
    }

    #[test]
    fn scoring_matches_the_bias_tables() {
        let meta = book(
            "dark_strategy",
            &[Domain::Power, Domain::Morality],
            &[Tone::Dark, Tone::Moral],
            1.0,
        );
        let score = score_book(&meta);
        // +2.0 (power) - 1.5 (morality) + 1.5 (dark) - 0.8 (moral) = 1.2
        assert!((score.score - 1.2).abs() < 1e-9);
    }

    #[test]
    fn nonpositive_books_never_selected() {
        let books = vec![
            book("power_plays", &[Domain::Power], &[Tone::Strategic], 1.0),
            book("sharp_minds", &[Domain::Psychology], &[Tone::Cold], 0.9),
            book("gentle_paths", &[Domain::Morality], &[Tone::Therapeutic], 1.0),
            book("zeroed", &[], &[], 1.0),
        ];
        let (shelf, _) = select_books(&books);
        assert!(shelf.contains("power_plays"));
        assert!(shelf.contains("sharp_minds"));
        assert!(!shelf.contains("gentle_paths"));
        assert!(!shelf.contains("zeroed"));
    }

    #[test]
    fn shelf_caps_at_five_and_ranks_by_score_then_id() {
        let books: Vec<BookMetadata> = (0..8)
            .map(|i| {
                book(
                    &format!("book_{i}"),
                    &[Domain::Power, Domain::Conflict],
                    &[Tone::Strategic],
                    1.0,
                )
            })
            .collect();
        let (shelf, scores) = select_books(&books);
        assert_eq!(shelf.len(), MAX_BOOKS);
        // Equal scores: first five ids win.
        for i in 0..5 {
            assert!(shelf.contains(&format!("book_{i}")));
        }
        assert_eq!(scores.len(), 8);
    }

    #[test]
    fn war_priority_multiplies() {
        let full = score_book(&book("a", &[Domain::Power], &[], 1.0));
        let half = score_book(&book("a", &[Domain::Power], &[], 0.5));
        assert!((full.score - 2.0).abs() < 1e-9);
        assert!((half.score - 1.0).abs() < 1e-9);
    }
}
