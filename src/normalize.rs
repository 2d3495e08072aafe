//! Stateless canonicalization of loosely-typed vendor fields.
//!
//! Everything here is pure and deterministic: the transformer and the bulk
//! import tools both funnel raw strings through these functions so the same
//! input always lands in the same canonical shape.

use crate::model::{BreakoutSession, FundAffiliation, Hotel};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Vendor truthiness: trimmed value case-insensitively equal to one of
/// `1`, `true`, `yes`. Anything else, including missing, is false.
pub fn coerce_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Canonicalize a fund-affiliation string. Accepts free text like
/// `"Fund: Buyout Funds"` as well as already-canonical values; idempotent.
pub fn normalize_fund_affiliation(raw: &str) -> FundAffiliation {
    let mut s = raw.trim();
    // Historical exports prefix the value with "Fund:".
    if let Some(rest) = strip_prefix_ci(s, "fund:") {
        s = rest.trim_start();
    }
    let lowered = s.to_ascii_lowercase();
    match lowered.trim() {
        "" => FundAffiliation::None,
        "buyout" | "buyout funds" => FundAffiliation::Buyout,
        "digital" | "digital funds" => FundAffiliation::Digital,
        "impact" | "impact funds" => FundAffiliation::Impact,
        _ => FundAffiliation::Other,
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Outcome of matching a free-text hotel name against the known hotel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotelResolution {
    /// Empty input: the attendee is making their own arrangements.
    OwnArrangements,
    /// Matched a known hotel record. `ambiguous` is set when more than one
    /// hotel matched and the first (by display order) was taken.
    Known { hotel_id: String, ambiguous: bool },
    /// No match; keep the raw name under `hotel_selection = "custom"`.
    Custom(String),
}

/// Sentinel used in `hotel_selection` for unmatched free-text hotels.
pub const HOTEL_SELECTION_CUSTOM: &str = "custom";

/// Match a hotel name case-insensitively by substring containment in either
/// direction ("Grand Hyatt" matches "Hyatt" and vice versa).
pub fn resolve_hotel(name: &str, hotels: &[Hotel]) -> HotelResolution {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return HotelResolution::OwnArrangements;
    }
    let needle = trimmed.to_lowercase();

    let mut hits: Vec<&Hotel> = hotels
        .iter()
        .filter(|h| h.is_active)
        .filter(|h| {
            let known = h.name.to_lowercase();
            known.contains(&needle) || needle.contains(&known)
        })
        .collect();
    hits.sort_by_key(|h| h.display_order);

    match hits.first() {
        Some(hotel) => HotelResolution::Known {
            hotel_id: hotel.id.clone(),
            ambiguous: hits.len() > 1,
        },
        None => HotelResolution::Custom(trimmed.to_string()),
    }
}

/// Exact-title overrides for breakout sessions whose titles do not slug
/// safely (renamed tracks, titles sharing word stems). Checked before the
/// generated slug.
static BREAKOUT_TITLE_OVERRIDES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("AI in Practice: Portfolio Applications", "ai-portfolio"),
        ("AI in Practice — Tools & Platforms", "ai-tools"),
        ("Value Creation: Pricing", "value-creation-pricing"),
        ("Value Creation: Talent", "value-creation-talent"),
        ("Digital & Technology Roundtable", "digital-roundtable"),
    ])
});

static SLUG_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid regex"));
static SLUG_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static SLUG_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid regex"));

/// Generate a slug from a session title: lowercase, non-alphanumerics
/// stripped, spaces to hyphens, repeated hyphens collapsed.
pub fn breakout_slug(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let stripped = SLUG_STRIP.replace_all(&lowered, "");
    let hyphenated = SLUG_SPACES.replace_all(stripped.trim(), "-");
    SLUG_HYPHENS
        .replace_all(&hyphenated, "-")
        .trim_matches('-')
        .to_string()
}

/// Resolve one raw breakout selection (identifier or free-text title) to a
/// known session identifier. Resolution order: exact identifier, explicit
/// title override, generated slug against session ids and titled slugs.
pub fn resolve_breakout(raw: &str, sessions: &[BreakoutSession]) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(session) = sessions.iter().find(|s| s.id == trimmed) {
        return Some(session.id.clone());
    }

    if let Some(id) = BREAKOUT_TITLE_OVERRIDES.get(trimmed) {
        if let Some(session) = sessions.iter().find(|s| &s.id == id) {
            return Some(session.id.clone());
        }
    }

    let slug = breakout_slug(trimmed);
    if slug.is_empty() {
        return None;
    }
    sessions
        .iter()
        .find(|s| s.id == slug || breakout_slug(&s.title) == slug)
        .map(|s| s.id.clone())
}
