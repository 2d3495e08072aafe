//! Duplicate detection between incoming drafts and existing attendees.
//!
//! Scoring follows a fixed ladder: email equality and exact name equality are
//! high confidence, fuzzy name similarity (normalized Levenshtein via
//! `strsim`) is medium. The scan is O(candidates x existing), which is fine
//! at conference scale; per candidate we stop at the first high-confidence
//! hit instead of collecting every pairwise match.

use crate::model::{Attendee, AttendeeDraft, DuplicateMatch, MatchConfidence, MatchType};
use strsim::normalized_levenshtein;

const FUZZY_NAME_THRESHOLD: f64 = 0.85;
const FULL_NAME_THRESHOLD: f64 = 0.90;
const VARIATION_LAST_NAME_THRESHOLD: f64 = 0.90;

/// Lowercase, trim, strip everything but letters and spaces, collapse runs of
/// whitespace. "  O'Brien " and "obrien" normalize identically.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true;
    for ch in raw.trim().to_lowercase().chars() {
        if ch.is_alphabetic() {
            out.push(ch);
            last_was_space = false;
        } else if ch.is_whitespace() && !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

fn name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Compare every candidate against every existing attendee and report
/// confidence-tagged duplicates.
pub fn find_duplicates(candidates: &[AttendeeDraft], existing: &[Attendee]) -> Vec<DuplicateMatch> {
    let mut matches = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        let cand_email = normalize_email(&candidate.email);
        let cand_first = normalize_name(&candidate.first_name);
        let cand_last = normalize_name(&candidate.last_name);
        let cand_full = format!("{cand_first} {cand_last}");

        for attendee in existing {
            let Some(hit) = score_pair(
                index,
                &cand_email,
                &cand_first,
                &cand_last,
                &cand_full,
                attendee,
            ) else {
                continue;
            };
            let high = hit.confidence == MatchConfidence::High;
            matches.push(hit);
            if high {
                break;
            }
        }
    }

    matches
}

fn score_pair(
    candidate_index: usize,
    cand_email: &str,
    cand_first: &str,
    cand_last: &str,
    cand_full: &str,
    attendee: &Attendee,
) -> Option<DuplicateMatch> {
    let ex_email = normalize_email(&attendee.draft.email);
    let ex_first = normalize_name(&attendee.draft.first_name);
    let ex_last = normalize_name(&attendee.draft.last_name);
    let ex_full = format!("{ex_first} {ex_last}");

    let email_match = !cand_email.is_empty() && cand_email == ex_email;

    let exact_name_match = !cand_first.is_empty()
        && !cand_last.is_empty()
        && cand_first == ex_first
        && cand_last == ex_last;

    let first_sim = name_similarity(cand_first, &ex_first);
    let last_sim = name_similarity(cand_last, &ex_last);
    let full_sim = name_similarity(cand_full.trim(), ex_full.trim());

    let fuzzy_name_match = (first_sim >= FUZZY_NAME_THRESHOLD && last_sim >= FUZZY_NAME_THRESHOLD)
        || full_sim >= FULL_NAME_THRESHOLD;

    // Cheap nickname/typo proxy: shared 3-character prefix on first names.
    let cand_prefix: Vec<char> = cand_first.chars().take(3).collect();
    let ex_prefix: Vec<char> = ex_first.chars().take(3).collect();
    let first_name_variation = cand_prefix.len() == 3 && cand_prefix == ex_prefix;

    let is_duplicate = email_match
        || exact_name_match
        || fuzzy_name_match
        || (first_name_variation && last_sim >= VARIATION_LAST_NAME_THRESHOLD);
    if !is_duplicate {
        return None;
    }

    let (match_type, confidence) = if email_match && (exact_name_match || fuzzy_name_match) {
        (MatchType::Both, MatchConfidence::High)
    } else if email_match {
        (MatchType::Email, MatchConfidence::High)
    } else if exact_name_match {
        (MatchType::Name, MatchConfidence::High)
    } else if fuzzy_name_match || first_name_variation {
        (MatchType::Name, MatchConfidence::Medium)
    } else {
        (MatchType::Name, MatchConfidence::Low)
    };

    Some(DuplicateMatch {
        candidate_index,
        existing: attendee.clone(),
        match_type,
        confidence,
    })
}
