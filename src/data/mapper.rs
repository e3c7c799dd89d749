use std::collections::BTreeMap;

use super::model::{Dimension, Mapping, RawTable};
use crate::config::EngineConfig;

// ---------------------------------------------------------------------------
// Candidate header patterns
// ---------------------------------------------------------------------------

/// Header patterns per dimension, most specific pattern first.
///
/// Dimensions are listed in claim order: a dimension earlier in the table
/// gets first pick of a column when patterns overlap (`country_code` must
/// win its column before `country` can match it by substring).
const PATTERNS: &[(Dimension, &[&str])] = &[
    (
        Dimension::BinPrefix,
        &["bin", "iin", "bin_number", "first6", "prefix", "number"],
    ),
    (
        Dimension::CountryCode,
        &["country_code", "alpha_2", "alpha2", "alpha_3", "alpha3", "iso2", "iso3"],
    ),
    (Dimension::Prepaid, &["prepaid", "is_prepaid", "prepago"]),
    (Dimension::Type, &["type", "card_type", "funding", "debit_credit"]),
    (
        Dimension::Level,
        &["level", "category", "card_category", "tier", "class"],
    ),
    (Dimension::Brand, &["brand", "scheme", "network", "card_scheme"]),
    (
        Dimension::Bank,
        &["bank", "issuer", "bank_name", "issuer_name", "institution"],
    ),
    (Dimension::Country, &["country", "country_name"]),
];

/// Canonical comparison form of a header: lowercase ASCII with common Latin
/// accents folded and every run of other characters collapsed to `_`.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

// ---------------------------------------------------------------------------
// SchemaMapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Exact,
    Substring,
}

/// Infers which raw column encodes each [`Dimension`] and applies manual
/// overrides.
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    bin_sample_size: usize,
    bin_min_len: usize,
    bin_max_len: usize,
    bin_min_valid_ratio: f64,
}

impl Default for SchemaMapper {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl SchemaMapper {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            bin_sample_size: config.bin_sample_size,
            bin_min_len: config.bin_min_len,
            bin_max_len: config.bin_max_len,
            bin_min_valid_ratio: config.bin_min_valid_ratio,
        }
    }

    /// Map every dimension to the first unclaimed column whose normalised
    /// header matches one of its patterns.
    ///
    /// An exact-name pass over all dimensions runs before the substring pass,
    /// so a column literally named after a dimension is never taken by a
    /// looser match for another one. Dimensions that match nothing stay
    /// unmapped.
    pub fn infer(&self, table: &RawTable) -> Mapping {
        let normalized: Vec<(String, &str)> = table
            .headers()
            .iter()
            .map(|h| (normalize_header(h), h.as_str()))
            .collect();

        let mut mapping = Mapping::new();
        for pass in [Pass::Exact, Pass::Substring] {
            for (dim, patterns) in PATTERNS {
                if mapping.is_mapped(*dim) {
                    continue;
                }
                let found = self.find_column(table, &mapping, &normalized, *dim, patterns, pass);
                if let Some(column) = found {
                    log::debug!("mapped {dim} -> '{column}' ({pass:?} match)");
                    mapping.assign(*dim, column);
                }
            }
        }
        mapping
    }

    fn find_column<'h>(
        &self,
        table: &RawTable,
        mapping: &Mapping,
        normalized: &[(String, &'h str)],
        dim: Dimension,
        patterns: &[&str],
        pass: Pass,
    ) -> Option<&'h str> {
        for pattern in patterns {
            for (norm, raw) in normalized {
                if mapping.owner_of(raw).is_some() {
                    continue;
                }
                let hit = match pass {
                    Pass::Exact => norm.as_str() == *pattern,
                    Pass::Substring => norm.contains(*pattern),
                };
                if !hit {
                    continue;
                }
                if dim == Dimension::BinPrefix && !self.looks_like_bin_column(table, raw) {
                    log::debug!("column '{raw}' matches '{pattern}' but its values are not BINs");
                    continue;
                }
                return Some(*raw);
            }
        }
        None
    }

    /// Whether enough sampled values are digit strings of plausible BIN length.
    fn looks_like_bin_column(&self, table: &RawTable, column: &str) -> bool {
        let sample: Vec<&str> = table
            .column_values(column)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .take(self.bin_sample_size.max(1))
            .collect();
        if sample.is_empty() {
            return false;
        }
        let valid = sample
            .iter()
            .filter(|v| {
                (self.bin_min_len..=self.bin_max_len).contains(&v.len())
                    && v.bytes().all(|b| b.is_ascii_digit())
            })
            .count();
        valid as f64 / sample.len() as f64 >= self.bin_min_valid_ratio
    }

    /// Replace the mapping wholesale with a caller-supplied one.
    ///
    /// References to columns the table does not have are dropped, as is a
    /// second dimension pointing at an already claimed column. `None` leaves
    /// the dimension unmapped.
    pub fn override_mapping(
        &self,
        table: &RawTable,
        manual: &BTreeMap<Dimension, Option<String>>,
    ) -> Mapping {
        let mut mapping = Mapping::new();
        for (dim, column) in manual {
            let Some(column) = column else {
                continue;
            };
            if !table.has_column(column) {
                log::warn!("mapping override for {dim} names unknown column '{column}', dropped");
                continue;
            }
            if !mapping.assign(*dim, column.clone()) {
                log::warn!("column '{column}' already mapped, override for {dim} dropped");
            }
        }
        mapping
    }
}

/// Decode a name-keyed override (as received from a front end) into typed
/// dimensions. Unknown dimension names are dropped.
pub fn parse_manual_mapping(
    raw: BTreeMap<String, Option<String>>,
) -> BTreeMap<Dimension, Option<String>> {
    raw.into_iter()
        .filter_map(|(name, column)| match name.parse::<Dimension>() {
            Ok(dim) => Some((dim, column.filter(|c| !c.is_empty()))),
            Err(e) => {
                log::warn!("{e} in mapping override, ignored");
                None
            }
        })
        .collect()
}
