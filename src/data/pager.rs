use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::filter::{dedupe_indices, FilterSpec};
use super::model::RawTable;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Column projection
// ---------------------------------------------------------------------------

/// Positions of the output columns for a request.
///
/// An empty request selects every column in header order. Otherwise the
/// requested names that exist in the table are kept in the caller's order;
/// unknown and repeated names are skipped.
pub fn output_columns(table: &RawTable, requested: &[String]) -> Vec<usize> {
    if requested.is_empty() {
        return (0..table.headers().len()).collect();
    }
    let mut seen = HashSet::new();
    requested
        .iter()
        .filter_map(|name| table.column_position(name))
        .filter(|pos| seen.insert(*pos))
        .collect()
}

// ---------------------------------------------------------------------------
// ResultPage
// ---------------------------------------------------------------------------

/// One page of filtered rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultPage {
    /// Output column names, in output order.
    pub columns: Vec<String>,
    /// Rows of the page, each keyed by output column.
    pub data: Vec<BTreeMap<String, String>>,
    /// Matching rows before pagination (after deduplication).
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Rows of `matching` that survive the requested deduplication.
fn final_indices(
    table: &RawTable,
    matching: &[usize],
    spec: &FilterSpec,
    columns: &[usize],
) -> Vec<usize> {
    if spec.dedupe {
        // No-op when `matching` already came out of a deduplicating apply.
        dedupe_indices(table, matching, columns)
    } else {
        matching.to_vec()
    }
}

/// Project, deduplicate and slice `matching` into the page named by
/// `spec.pagination`. A page past the end is empty but still reports the
/// full total.
pub fn page(table: &RawTable, matching: &[usize], spec: &FilterSpec) -> ResultPage {
    let columns = output_columns(table, &spec.columns);
    let rows = final_indices(table, matching, spec, &columns);
    let total = rows.len();
    let (start, end) = spec.pagination.bounds(total);

    let names: Vec<&String> = columns.iter().map(|&c| &table.headers()[c]).collect();
    let data: Vec<BTreeMap<String, String>> = rows[start..end]
        .iter()
        .map(|&i| {
            let row = table.row(i);
            columns
                .iter()
                .zip(&names)
                .map(|(&c, name)| ((*name).clone(), row[c].clone()))
                .collect()
        })
        .collect();

    ResultPage {
        columns: names.into_iter().cloned().collect(),
        data,
        total,
        page: spec.pagination.page(),
        page_size: spec.pagination.page_size(),
    }
}

/// Serialise every matching row (pagination ignored) as CSV with a header
/// of the projected column names. Fields containing a delimiter, quote or
/// line break are quoted with embedded quotes doubled.
///
/// An empty projection has no CSV rendering, so it exports as an empty
/// document rather than one blank record per row.
pub fn export(table: &RawTable, matching: &[usize], spec: &FilterSpec) -> Result<Vec<u8>> {
    let columns = output_columns(table, &spec.columns);
    if columns.is_empty() {
        log::warn!("export requested columns {:?}, none exist; nothing written", spec.columns);
        return Ok(Vec::new());
    }
    let rows = final_indices(table, matching, spec, &columns);

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(columns.iter().map(|&c| table.headers()[c].as_str()))?;
    for &i in &rows {
        let row = table.row(i);
        writer.write_record(columns.iter().map(|&c| row[c].as_str()))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    log::debug!("exported {} rows x {} columns", rows.len(), columns.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::Pagination;

    fn table() -> RawTable {
        RawTable::new(
            vec!["BIN".into(), "Bank".into(), "Note".into()],
            vec![
                vec!["123456".into(), "BankA".into(), "plain".into()],
                vec!["123456".into(), "BankB".into(), "has, comma".into()],
                vec!["999999".into(), "BankA".into(), "say \"hi\"".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn projection_keeps_requested_order_and_drops_unknown() {
        let t = table();
        let requested = ["Note", "Missing", "BIN", "Note"].map(String::from);
        let cols = output_columns(&t, &requested);
        assert_eq!(cols, vec![2, 0]);
        assert_eq!(output_columns(&t, &[]), vec![0, 1, 2]);
    }

    #[test]
    fn default_projection_uses_all_headers() {
        let t = table();
        let p = page(&t, &[0, 1, 2], &FilterSpec::default());
        assert_eq!(p.columns, vec!["BIN", "Bank", "Note"]);
        for row in &p.data {
            assert_eq!(row.keys().collect::<Vec<_>>(), vec!["BIN", "Bank", "Note"]);
        }
    }

    #[test]
    fn page_beyond_range_is_empty_with_total() {
        let t = table();
        let spec = FilterSpec::default().with_pagination(Pagination::new(5, 50).unwrap());
        let p = page(&t, &[0, 1, 2], &spec);
        assert!(p.data.is_empty());
        assert_eq!(p.total, 3);
        assert_eq!(p.page, 5);
        assert_eq!(p.page_size, 50);
    }

    #[test]
    fn pages_partition_the_result() {
        let t = table();
        let mut bins = Vec::new();
        for n in 1..=2 {
            let spec = FilterSpec::default().with_pagination(Pagination::new(n, 2).unwrap());
            let p = page(&t, &[0, 1, 2], &spec);
            bins.extend(p.data.into_iter().map(|r| r["Bank"].clone()));
        }
        assert_eq!(bins, vec!["BankA", "BankB", "BankA"]);
    }

    #[test]
    fn dedupe_counts_after_projection() {
        let t = table();
        let spec = FilterSpec::default().with_columns(["BIN"]).with_dedupe(true);
        let p = page(&t, &[0, 1, 2], &spec);
        assert_eq!(p.total, 2);
        assert_eq!(p.data[0]["BIN"], "123456");
        assert_eq!(p.data[1]["BIN"], "999999");
    }

    #[test]
    fn export_quotes_special_fields() {
        let t = table();
        let out = export(&t, &[0, 1, 2], &FilterSpec::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            concat!(
                "BIN,Bank,Note\n",
                "123456,BankA,plain\n",
                "123456,BankB,\"has, comma\"\n",
                "999999,BankA,\"say \"\"hi\"\"\"\n",
            )
        );
    }

    #[test]
    fn export_quotes_embedded_line_breaks() {
        let t = RawTable::new(
            vec!["BIN".into(), "Note".into()],
            vec![vec!["123456".into(), "A\nB".into()]],
        )
        .unwrap();
        let text = String::from_utf8(export(&t, &[0], &FilterSpec::default()).unwrap()).unwrap();
        assert_eq!(text, "BIN,Note\n123456,\"A\nB\"\n");
    }

    #[test]
    fn unknown_columns_export_nothing() {
        let t = table();
        let spec = FilterSpec::default().with_columns(["Nope"]);
        let out = export(&t, &[0, 1, 2], &spec).unwrap();
        assert!(out.is_empty());

        let p = page(&t, &[0, 1, 2], &spec);
        assert!(p.columns.is_empty());
        assert_eq!(p.total, 3);
        assert!(p.data.iter().all(BTreeMap::is_empty));
    }

    #[test]
    fn export_ignores_pagination() {
        let t = table();
        let spec = FilterSpec::default()
            .with_columns(["Bank"])
            .with_pagination(Pagination::new(3, 1).unwrap());
        let text = String::from_utf8(export(&t, &[0, 1, 2], &spec).unwrap()).unwrap();
        assert_eq!(text, "Bank\nBankA\nBankB\nBankA\n");
    }

    #[test]
    fn export_dedupes_projected_rows() {
        let t = table();
        let spec = FilterSpec::default().with_columns(["BIN"]).with_dedupe(true);
        let text = String::from_utf8(export(&t, &[0, 1], &spec).unwrap()).unwrap();
        assert_eq!(text, "BIN\n123456\n");
    }
}
