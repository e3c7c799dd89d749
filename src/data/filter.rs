use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use super::model::{normalize_value, parse_bool, Dimension, Mapping, RawTable};
use super::pager::output_columns;
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// 1-based page number and a positive page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    page: usize,
    page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

impl Pagination {
    pub fn new(page: usize, page_size: usize) -> Result<Self> {
        if page == 0 {
            return Err(EngineError::invalid_filter("page", "must be at least 1"));
        }
        if page_size == 0 {
            return Err(EngineError::invalid_filter("page_size", "must be positive"));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Half-open index range of this page within `total` rows, clamped so a
    /// page past the end yields an empty range.
    pub fn bounds(&self, total: usize) -> (usize, usize) {
        let start = (self.page - 1).saturating_mul(self.page_size).min(total);
        let end = start.saturating_add(self.page_size).min(total);
        (start, end)
    }
}

// ---------------------------------------------------------------------------
// FilterSpec – one filter + pagination request
// ---------------------------------------------------------------------------

/// Complete description of one filter request. Every field is optional:
/// an empty value means no constraint on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterSpec {
    /// Left-anchored match against the `bin_prefix` column.
    pub prefix: String,
    /// Allowed values per categorical dimension.
    pub include: BTreeMap<Dimension, BTreeSet<String>>,
    /// Rejected values; honoured for bank, level, country and country code.
    pub exclude: BTreeMap<Dimension, BTreeSet<String>>,
    /// `Some(true)`/`Some(false)` keeps only rows whose prepaid flag parses
    /// to that value.
    pub prepaid: Option<bool>,
    /// Case-insensitive substring searched in mapped dimension values.
    pub text: String,
    /// Drop rows whose projected output duplicates an earlier row.
    pub dedupe: bool,
    /// Requested output columns; empty means all columns in header order.
    pub columns: Vec<String>,
    pub pagination: Pagination,
}

impl FilterSpec {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_include<I, S>(mut self, dim: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include
            .entry(dim)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_exclude<I, S>(mut self, dim: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude
            .entry(dim)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_prepaid(mut self, prepaid: Option<bool>) -> Self {
        self.prepaid = prepaid;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

// ---------------------------------------------------------------------------
// FilterEngine
// ---------------------------------------------------------------------------

/// Value-set predicate on one mapped column.
struct SetPredicate {
    column: usize,
    values: BTreeSet<String>,
}

impl SetPredicate {
    fn build(
        table: &RawTable,
        mapping: &Mapping,
        dim: Dimension,
        values: &BTreeSet<String>,
    ) -> Option<Self> {
        let values: BTreeSet<String> = values
            .iter()
            .map(|v| normalize_value(v))
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return None;
        }
        let column = mapping.get(dim).and_then(|c| table.column_position(c))?;
        Some(Self { column, values })
    }

    fn matches(&self, row: &[String]) -> bool {
        self.values.contains(&normalize_value(&row[self.column]))
    }
}

/// A [`FilterSpec`] resolved against one table and mapping. Constraints on
/// unmapped dimensions are dropped here, which leaves them unconstrained.
struct CompiledFilter {
    prefix: Option<(usize, String)>,
    includes: Vec<SetPredicate>,
    excludes: Vec<SetPredicate>,
    prepaid: Option<(usize, bool)>,
    text: Option<(Vec<usize>, String)>,
}

impl CompiledFilter {
    fn compile(table: &RawTable, mapping: &Mapping, spec: &FilterSpec) -> Self {
        let position = |dim: Dimension| mapping.get(dim).and_then(|c| table.column_position(c));

        let prefix = Some(spec.prefix.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .and_then(|p| position(Dimension::BinPrefix).map(|col| (col, p)));

        let includes: Vec<SetPredicate> = spec
            .include
            .iter()
            .filter(|(dim, _)| dim.is_categorical())
            .filter_map(|(dim, values)| SetPredicate::build(table, mapping, *dim, values))
            .collect();

        let excludes: Vec<SetPredicate> = spec
            .exclude
            .iter()
            .filter(|(dim, values)| {
                let honoured = dim.supports_exclusion();
                if !honoured && !values.is_empty() {
                    log::debug!("exclude set on {dim} ignored");
                }
                honoured
            })
            .filter_map(|(dim, values)| SetPredicate::build(table, mapping, *dim, values))
            .collect();

        let prepaid = spec
            .prepaid
            .and_then(|want| position(Dimension::Prepaid).map(|col| (col, want)));

        let text = Some(spec.text.to_lowercase())
            .filter(|t| !t.is_empty())
            .map(|needle| {
                let columns: Vec<usize> = mapping
                    .iter()
                    .filter_map(|(_, c)| table.column_position(c))
                    .collect();
                (columns, needle)
            });

        Self {
            prefix,
            includes,
            excludes,
            prepaid,
            text,
        }
    }

    fn matches(&self, row: &[String]) -> bool {
        if let Some((col, prefix)) = &self.prefix {
            if !row[*col].trim().to_lowercase().starts_with(prefix.as_str()) {
                return false;
            }
        }
        if !self.includes.iter().all(|p| p.matches(row)) {
            return false;
        }
        if self.excludes.iter().any(|p| p.matches(row)) {
            return false;
        }
        if let Some((col, want)) = self.prepaid {
            // Unknown never satisfies an explicit true/false request.
            if parse_bool(&row[col]) != Some(want) {
                return false;
            }
        }
        if let Some((columns, needle)) = &self.text {
            if !columns
                .iter()
                .any(|c| row[*c].to_lowercase().contains(needle.as_str()))
            {
                return false;
            }
        }
        true
    }
}

/// Return indices of rows matching every constraint of `spec`, in table
/// order.
///
/// Constraints are AND-combined; a constraint on an unmapped dimension is
/// treated as absent. When `spec.dedupe` is set, rows whose projected output
/// repeats an earlier row are dropped last.
pub fn apply(table: &RawTable, mapping: &Mapping, spec: &FilterSpec) -> Vec<usize> {
    let filter = CompiledFilter::compile(table, mapping, spec);
    let matching: Vec<usize> = (0..table.len())
        .filter(|&i| filter.matches(table.row(i)))
        .collect();
    log::debug!("filter matched {} of {} rows", matching.len(), table.len());

    if spec.dedupe {
        dedupe_indices(table, &matching, &output_columns(table, &spec.columns))
    } else {
        matching
    }
}

/// Keep the first row of every group whose values agree in all `columns`.
/// Idempotent: deduplicating an already deduplicated sequence changes nothing.
pub fn dedupe_indices(table: &RawTable, indices: &[usize], columns: &[usize]) -> Vec<usize> {
    let mut seen: HashSet<Vec<&str>> = HashSet::with_capacity(indices.len());
    indices
        .iter()
        .copied()
        .filter(|&i| {
            let row = table.row(i);
            let key: Vec<&str> = columns.iter().map(|&c| row[c].as_str()).collect();
            seen.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (RawTable, Mapping) {
        let rows = [
            ["400000", "Alpha Bank", "Visa", "Credit", "Gold", "Spain", "ES", "yes"],
            ["400001", "Beta Bank", "Visa", "Debit", "Classic", "France", "FR", "no"],
            ["510000", "alpha bank", "MasterCard", "Credit", "Platinum", "Spain", "ES", ""],
            ["520000", "Gamma", "MasterCard", "Debit", "Gold", "Mexico", "MX", "1"],
        ];
        let table = RawTable::new(
            ["BIN", "Bank", "Brand", "Type", "Level", "Country", "ISO2", "Prepaid"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap();
        let mut m = Mapping::new();
        for (dim, col) in [
            (Dimension::BinPrefix, "BIN"),
            (Dimension::Bank, "Bank"),
            (Dimension::Brand, "Brand"),
            (Dimension::Type, "Type"),
            (Dimension::Level, "Level"),
            (Dimension::Country, "Country"),
            (Dimension::CountryCode, "ISO2"),
            (Dimension::Prepaid, "Prepaid"),
        ] {
            m.assign(dim, col);
        }
        (table, m)
    }

    #[test]
    fn empty_spec_matches_everything_in_order() {
        let (t, m) = setup();
        assert_eq!(apply(&t, &m, &FilterSpec::default()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn alphanumeric_prefix_ignores_case() {
        let table = RawTable::new(
            vec!["BIN".into()],
            vec![vec!["AB12".into()], vec![" ab34".into()], vec!["CD56".into()]],
        )
        .unwrap();
        let mut m = Mapping::new();
        m.assign(Dimension::BinPrefix, "BIN");
        for needle in ["ab", "AB", "aB1"] {
            let spec = FilterSpec::default().with_prefix(needle);
            let expected: &[usize] = if needle == "aB1" { &[0] } else { &[0, 1] };
            assert_eq!(apply(&table, &m, &spec), expected, "prefix {needle:?}");
        }
    }

    #[test]
    fn prefix_is_left_anchored() {
        let (t, m) = setup();
        assert_eq!(apply(&t, &m, &FilterSpec::default().with_prefix("4000")), vec![0, 1]);
        assert_eq!(apply(&t, &m, &FilterSpec::default().with_prefix("0000")), Vec::<usize>::new());
    }

    #[test]
    fn include_is_case_and_space_insensitive() {
        let (t, m) = setup();
        let spec = FilterSpec::default().with_include(Dimension::Bank, [" ALPHA BANK "]);
        assert_eq!(apply(&t, &m, &spec), vec![0, 2]);
    }

    #[test]
    fn exclude_removes_members() {
        let (t, m) = setup();
        let spec = FilterSpec::default().with_exclude(Dimension::Level, ["gold"]);
        assert_eq!(apply(&t, &m, &spec), vec![1, 2]);
    }

    #[test]
    fn exclude_on_single_choice_dimension_is_ignored() {
        let (t, m) = setup();
        let spec = FilterSpec::default().with_exclude(Dimension::Brand, ["Visa"]);
        assert_eq!(apply(&t, &m, &spec), vec![0, 1, 2, 3]);
    }

    #[test]
    fn prepaid_unknown_never_matches() {
        let (t, m) = setup();
        let yes = FilterSpec::default().with_prepaid(Some(true));
        assert_eq!(apply(&t, &m, &yes), vec![0, 3]);
        let no = FilterSpec::default().with_prepaid(Some(false));
        assert_eq!(apply(&t, &m, &no), vec![1]);
    }

    #[test]
    fn text_match_does_not_span_fields() {
        let (t, m) = setup();
        for needle in ["bank visa", "bankvisa", "bank,visa"] {
            assert!(apply(&t, &m, &FilterSpec::default().with_text(needle)).is_empty());
        }
        assert_eq!(apply(&t, &m, &FilterSpec::default().with_text("ha bank")), vec![0, 2]);
    }

    #[test]
    fn text_searches_mapped_values_only() {
        let (t, m) = setup();
        assert_eq!(apply(&t, &m, &FilterSpec::default().with_text("mexi")), vec![3]);
        assert_eq!(apply(&t, &m, &FilterSpec::default().with_text("PLAT")), vec![2]);

        let mut partial = Mapping::new();
        partial.assign(Dimension::BinPrefix, "BIN");
        assert!(apply(&t, &partial, &FilterSpec::default().with_text("mexi")).is_empty());
    }

    #[test]
    fn unmapped_dimensions_are_unconstrained() {
        let (t, _) = setup();
        let empty = Mapping::new();
        let spec = FilterSpec::default()
            .with_prefix("9")
            .with_include(Dimension::Bank, ["nobody"])
            .with_prepaid(Some(true));
        assert_eq!(apply(&t, &empty, &spec), vec![0, 1, 2, 3]);
    }

    #[test]
    fn constraints_are_and_combined() {
        let (t, m) = setup();
        let spec = FilterSpec::default()
            .with_include(Dimension::Country, ["Spain"])
            .with_include(Dimension::Type, ["credit"])
            .with_exclude(Dimension::Bank, ["Alpha Bank"]);
        assert!(apply(&t, &m, &spec).is_empty());
    }

    #[test]
    fn dedupe_uses_projected_columns() {
        let (t, m) = setup();
        let spec = FilterSpec::default()
            .with_columns(["Country", "ISO2"])
            .with_dedupe(true);
        assert_eq!(apply(&t, &m, &spec), vec![0, 1, 3]);

        let all = FilterSpec::default().with_dedupe(true);
        assert_eq!(apply(&t, &m, &all), vec![0, 1, 2, 3]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let (t, _) = setup();
        let once = dedupe_indices(&t, &[0, 1, 2, 3], &[5]);
        assert_eq!(dedupe_indices(&t, &once, &[5]), once);
    }

    #[test]
    fn pagination_bounds_clamp() {
        let p = Pagination::new(5, 50).unwrap();
        assert_eq!(p.bounds(3), (3, 3));
        let p = Pagination::new(2, 2).unwrap();
        assert_eq!(p.bounds(3), (2, 3));
        assert!(Pagination::new(0, 10).is_err());
        assert!(Pagination::new(1, 0).is_err());
    }
}
