use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{normalize_value, Dimension, Mapping, RawTable};

/// Distinct observed values per mapped categorical dimension, used to fill
/// filter choice lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OptionIndex {
    options: BTreeMap<Dimension, Vec<String>>,
}

impl OptionIndex {
    /// Collect the distinct non-empty values of every mapped categorical
    /// dimension.
    ///
    /// Values equal after trimming and lowercasing collapse into one option,
    /// displayed with the casing seen first. Options are ordered by their
    /// normalised form.
    pub fn build(table: &RawTable, mapping: &Mapping) -> Self {
        let mut options = BTreeMap::new();
        for dim in Dimension::CATEGORICAL {
            let Some(column) = mapping.get(dim) else {
                continue;
            };
            let mut seen: BTreeMap<String, String> = BTreeMap::new();
            for value in table.column_values(column) {
                let display = value.trim();
                if display.is_empty() {
                    continue;
                }
                seen.entry(normalize_value(display))
                    .or_insert_with(|| display.to_string());
            }
            options.insert(dim, seen.into_values().collect());
        }
        Self { options }
    }

    /// Sorted options for `dim`; `None` when the dimension is unmapped or not
    /// categorical.
    pub fn get(&self, dim: Dimension) -> Option<&[String]> {
        self.options.get(&dim).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &[String])> {
        self.options.iter().map(|(d, v)| (*d, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (RawTable, Mapping) {
        let table = RawTable::new(
            vec!["BIN".into(), "Bank".into(), "Prepaid".into()],
            vec![
                vec!["1".into(), "Zeta Bank".into(), "yes".into()],
                vec!["2".into(), " alpha ".into(), "no".into()],
                vec!["3".into(), "ALPHA".into(), "".into()],
                vec!["4".into(), "".into(), "yes".into()],
            ],
        )
        .unwrap();
        let mut mapping = Mapping::new();
        mapping.assign(Dimension::Bank, "Bank");
        mapping.assign(Dimension::Prepaid, "Prepaid");
        (table, mapping)
    }

    #[test]
    fn collapses_case_variants_keeping_first_seen() {
        let (table, mapping) = setup();
        let idx = OptionIndex::build(&table, &mapping);
        assert_eq!(
            idx.get(Dimension::Bank).unwrap(),
            &["alpha".to_string(), "Zeta Bank".to_string()]
        );
    }

    #[test]
    fn skips_unmapped_and_non_categorical() {
        let (table, mapping) = setup();
        let idx = OptionIndex::build(&table, &mapping);
        assert!(idx.get(Dimension::Prepaid).is_none());
        assert!(idx.get(Dimension::Brand).is_none());
        assert_eq!(idx.iter().count(), 1);
    }

    #[test]
    fn serializes_as_dimension_keyed_object() {
        let (table, mapping) = setup();
        let json = serde_json::to_value(OptionIndex::build(&table, &mapping)).unwrap();
        assert_eq!(json["bank"][1], "Zeta Bank");
    }
}
