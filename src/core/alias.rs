//! Model identity resolution
//!
//! Upstream providers advertise the same underlying model under wildly
//! different raw names (`models/gemini-flash-latest`, `gemini-2.5-flash`,
//! `qwen/qwen-2.5-instruct-2507`). This module reduces raw names to
//! comparable identities:
//!
//! - `canonical`: vendor prefix and variant qualifiers stripped, version kept
//! - `family_key`: canonical with the version stripped as well
//!
//! Everything here is pure; alias maps are rebuilt on demand from the live
//! provider set and never persisted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

/// Qualifiers that mark a variant of a model rather than a distinct model.
const VARIANT_TOKENS: &[&str] = &[
    "latest", "default", "stable", "fast", "turbo", "slow", "high", "low", "medium", "mini",
    "lite", "light", "pro", "ultra", "think", "thinking", "instruct", "chat", "online", "beta",
    "preview", "free",
];

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(models|model|m)/").unwrap());
static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v?(\d+(?:\.\d+)+|\d+)$").unwrap());
static LONG_NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4,}$").unwrap());

/// Parsed numeric version, ordered by component-wise comparison.
pub type VersionParts = Vec<u64>;

/// The decomposed identity of a raw model string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedModel {
    /// Original string as advertised by the provider
    pub raw: String,
    /// Lower-cased string with the namespace prefix removed
    pub cleaned: String,
    /// Identity with variant qualifiers stripped, version kept
    pub canonical: String,
    /// Identity with version and variant qualifiers stripped
    pub family_key: String,
    /// First version token found, empty when the name carries none
    pub version_parts: VersionParts,
}

fn parse_version(token: &str) -> Option<VersionParts> {
    let captures = VERSION_RE.captures(token)?;
    let parts = captures[1]
        .split('.')
        .map(|n| n.parse::<u64>().unwrap_or(0))
        .collect();
    Some(parts)
}

/// Compare version vectors component-wise, missing components count as 0.
fn compare_version_parts(a: &VersionParts, b: &VersionParts) -> std::cmp::Ordering {
    let max = a.len().max(b.len());
    for i in 0..max {
        let av = a.get(i).copied().unwrap_or(0);
        let bv = b.get(i).copied().unwrap_or(0);
        match av.cmp(&bv) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

/// Normalize a raw model name into its comparable identity.
///
/// Rules:
/// - strip a `models/` / `model/` / `m/` namespace prefix and any vendor path
///   segment (`openai/`, `qwen/`), lower-case
/// - split on `-`, `_`, whitespace
/// - numeric tokens of 4+ digits are build/date tags, never identity
/// - version tokens (`2`, `2.5`, `v3`) stay in `canonical`, the first one
///   found becomes `version_parts`
/// - variant qualifiers (`mini`, `latest`, `instruct`, ...) are dropped from
///   both `canonical` and `family_key`
pub fn normalize(raw: &str) -> NormalizedModel {
    let cleaned = PREFIX_RE.replace(raw.trim(), "").to_lowercase();
    let without_vendor = cleaned
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(cleaned.as_str())
        .to_string();

    let mut version_parts: VersionParts = Vec::new();
    let mut canonical_tokens: Vec<&str> = Vec::new();
    let mut family_tokens: Vec<&str> = Vec::new();

    for token in without_vendor
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        if LONG_NUMERIC_RE.is_match(token) {
            continue;
        }
        if let Some(version) = parse_version(token) {
            if version_parts.is_empty() {
                version_parts = version;
            }
            canonical_tokens.push(token);
            continue;
        }
        if VARIANT_TOKENS.contains(&token) {
            continue;
        }
        canonical_tokens.push(token);
        family_tokens.push(token);
    }

    let canonical_base = canonical_tokens.join("-");
    let family_base = family_tokens.join("-");

    let canonical = if canonical_base.is_empty() {
        without_vendor.clone()
    } else {
        canonical_base
    };
    let family_key = if family_base.is_empty() {
        without_vendor.clone()
    } else {
        family_base
    };

    NormalizedModel {
        raw: raw.to_string(),
        cleaned,
        canonical,
        family_key,
        version_parts,
    }
}

/// Alias maps derived from the raw model names of every registered provider.
#[derive(Debug, Clone, Default)]
pub struct AliasMaps {
    /// Preferred canonical name -> raw variants usable for actual calls
    pub canonical_to_variants: HashMap<String, BTreeSet<String>>,
    /// Any raw or canonical string -> the group's preferred canonical
    pub variant_to_canonical: HashMap<String, String>,
}

impl AliasMaps {
    /// Resolve a requested model name to its group's preferred canonical.
    ///
    /// Tries the raw string first (provider-advertised names are keys), then
    /// the normalized canonical of the request.
    pub fn resolve(&self, requested: &str) -> Option<&str> {
        if let Some(canonical) = self.variant_to_canonical.get(requested) {
            return Some(canonical);
        }
        let normalized = normalize(requested);
        self.variant_to_canonical
            .get(&normalized.canonical)
            .map(String::as_str)
    }

    /// Raw variants callable for a preferred canonical name.
    pub fn variants_for(&self, canonical: &str) -> Option<&BTreeSet<String>> {
        self.canonical_to_variants.get(canonical)
    }
}

/// Group all raw model strings across providers by family and pick one
/// preferred canonical per family.
///
/// The preferred canonical is the candidate with the highest parsed version;
/// when no candidate carries a version the first one encountered wins.
pub fn build_alias_maps<'a, I>(model_lists: I) -> AliasMaps
where
    I: IntoIterator<Item = &'a [String]>,
{
    struct FamilyEntry {
        variants: BTreeSet<String>,
        candidates: Vec<(String, VersionParts)>,
    }

    let mut families: HashMap<String, FamilyEntry> = HashMap::new();

    for models in model_lists {
        for raw in models {
            let info = normalize(raw);
            let family_key = if info.family_key.is_empty() {
                info.cleaned.clone()
            } else {
                info.family_key.clone()
            };
            let entry = families.entry(family_key).or_insert_with(|| FamilyEntry {
                variants: BTreeSet::new(),
                candidates: Vec::new(),
            });
            entry.variants.insert(raw.clone());
            let canonical = if info.canonical.is_empty() {
                info.cleaned
            } else {
                info.canonical
            };
            entry.candidates.push((canonical, info.version_parts));
        }
    }

    let mut maps = AliasMaps::default();

    for (_, entry) in families {
        let preferred = entry
            .candidates
            .iter()
            .filter(|(_, version)| !version.is_empty())
            .max_by(|(_, a), (_, b)| compare_version_parts(a, b))
            .or_else(|| entry.candidates.first())
            .map(|(canonical, _)| canonical.clone());

        let Some(preferred) = preferred else {
            continue;
        };

        for variant in &entry.variants {
            let variant_canonical = {
                let norm = normalize(variant);
                if norm.canonical.is_empty() {
                    variant.to_lowercase()
                } else {
                    norm.canonical
                }
            };
            maps.variant_to_canonical
                .insert(variant_canonical, preferred.clone());
            maps.variant_to_canonical
                .insert(variant.clone(), preferred.clone());
        }

        let preferred_norm = normalize(&preferred).canonical;
        maps.variant_to_canonical
            .insert(preferred.clone(), preferred.clone());
        maps.variant_to_canonical
            .insert(preferred_norm, preferred.clone());

        maps.canonical_to_variants.insert(preferred, entry.variants);
    }

    maps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists(groups: &[&[&str]]) -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|g| g.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn maps_of(groups: &[&[&str]]) -> AliasMaps {
        let owned = lists(groups);
        build_alias_maps(owned.iter().map(|v| v.as_slice()))
    }

    #[test]
    fn strips_namespace_prefix_and_vendor_segment() {
        let info = normalize("models/gemini-flash-latest");
        assert_eq!(info.cleaned, "gemini-flash-latest");
        assert_eq!(info.canonical, "gemini-flash");
        assert_eq!(info.family_key, "gemini-flash");

        let info = normalize("openai/gpt-4");
        assert_eq!(info.canonical, "gpt-4");
        assert_eq!(info.family_key, "gpt");
    }

    #[test]
    fn version_tokens_stay_in_canonical_only() {
        let info = normalize("gemini-2.5-flash");
        assert_eq!(info.canonical, "gemini-2.5-flash");
        assert_eq!(info.family_key, "gemini-flash");
        assert_eq!(info.version_parts, vec![2, 5]);
    }

    #[test]
    fn long_numeric_tags_are_not_identity() {
        let a = normalize("qwen-2.5-instruct-2507");
        let b = normalize("qwen-2.5-instruct-2412");
        assert_eq!(a.family_key, b.family_key);
        assert_eq!(a.canonical, b.canonical);
    }

    #[test]
    fn variant_qualifiers_share_a_family() {
        let plain = normalize("deepseek-chat");
        let think = normalize("deepseek-thinking");
        let free = normalize("deepseek-free");
        assert_eq!(plain.family_key, "deepseek");
        assert_eq!(think.family_key, "deepseek");
        assert_eq!(free.family_key, "deepseek");
    }

    #[test]
    fn preferred_canonical_is_highest_version() {
        let maps = maps_of(&[&["models/gemini-flash-latest", "gemini-2.5-flash"]]);
        let canonical = maps.resolve("gemini-flash").expect("family should resolve");
        assert_eq!(canonical, "gemini-2.5-flash");

        let variants = maps.variants_for(canonical).expect("variants should exist");
        assert!(variants.contains("models/gemini-flash-latest"));
        assert!(variants.contains("gemini-2.5-flash"));
    }

    #[test]
    fn unversioned_family_prefers_first_candidate() {
        let maps = maps_of(&[&["llama-chat", "llama-instruct"]]);
        let canonical = maps.resolve("llama").expect("family should resolve");
        assert_eq!(canonical, "llama");
    }

    #[test]
    fn resolution_is_idempotent() {
        let maps = maps_of(&[
            &["models/gemini-flash-latest", "gemini-2.5-flash"],
            &["gpt-4", "gpt-4-turbo"],
        ]);
        for (canonical, variants) in &maps.canonical_to_variants {
            for variant in variants {
                assert_eq!(maps.resolve(variant), Some(canonical.as_str()));
            }
            assert_eq!(maps.resolve(canonical), Some(canonical.as_str()));
        }
    }

    #[test]
    fn unknown_model_does_not_resolve() {
        let maps = maps_of(&[&["gpt-4"]]);
        assert_eq!(maps.resolve("gpt-4"), Some("gpt-4"));
        assert_eq!(maps.resolve("gpt-5"), None);
    }

    #[test]
    fn separators_are_interchangeable() {
        let dash = normalize("qwen-2.5-instruct");
        let underscore = normalize("qwen_2.5_instruct");
        assert_eq!(dash.canonical, underscore.canonical);
        assert_eq!(dash.family_key, underscore.family_key);
    }
}
