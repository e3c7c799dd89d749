use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::data::filter::{self, FilterSpec};
use crate::data::loader::{self, LoadSummary, LoadedTable};
use crate::data::mapper::SchemaMapper;
use crate::data::model::{Dimension, Mapping, RawTable};
use crate::data::options::OptionIndex;
use crate::data::pager::{self, ResultPage};
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Dataset store
// ---------------------------------------------------------------------------

/// Table plus everything derived from it. Replaced as a unit.
#[derive(Debug, Clone)]
struct Dataset {
    table: RawTable,
    encoding: &'static str,
    mapping: Mapping,
    options: OptionIndex,
}

/// Snapshot of the loaded dataset for a front end: mapping, choice lists and
/// column list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    pub mapping: Mapping,
    pub options: OptionIndex,
    pub columns: Vec<String>,
    pub rows: usize,
    pub encoding: &'static str,
}

/// Session-scoped holder of the active table, its mapping and the cached
/// option index.
///
/// `load*` and `set_mapping` take `&mut self` and the read operations take
/// `&self`, so readers never observe a half-replaced dataset. A store shared
/// between requests belongs behind an `RwLock`; otherwise keep one store per
/// session.
#[derive(Debug, Default)]
pub struct DatasetStore {
    config: EngineConfig,
    mapper: SchemaMapper,
    dataset: Option<Dataset>,
}

impl DatasetStore {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            mapper: SchemaMapper::new(&config),
            config,
            dataset: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse `bytes` and make them the active dataset, discarding the
    /// previous one. On failure the previous dataset stays in place.
    pub fn load(&mut self, bytes: &[u8]) -> Result<LoadSummary> {
        let loaded = loader::load_bytes(bytes)?;
        Ok(self.install(loaded))
    }

    pub fn load_path(&mut self, path: &Path) -> Result<LoadSummary> {
        let loaded = loader::load_path(path)?;
        log::info!("loading {}", path.display());
        Ok(self.install(loaded))
    }

    /// Load the first configured default data file that exists. `Ok(None)`
    /// when none of them is present.
    pub fn load_default(&mut self) -> Result<Option<LoadSummary>> {
        let candidate = self
            .config
            .default_data_files
            .iter()
            .find(|p| p.is_file())
            .cloned();
        match candidate {
            Some(path) => self.load_path(&path).map(Some),
            None => {
                log::debug!("no default data file found");
                Ok(None)
            }
        }
    }

    fn install(&mut self, loaded: LoadedTable) -> LoadSummary {
        let summary = loaded.summary();
        let mapping = self.mapper.infer(&loaded.table);
        let options = OptionIndex::build(&loaded.table, &mapping);
        log::info!(
            "dataset loaded: {} rows, {} columns, {} dimensions mapped ({})",
            summary.rows,
            summary.columns,
            mapping.len(),
            summary.encoding
        );
        if !mapping.is_mapped(Dimension::BinPrefix) {
            log::warn!("no BIN column recognised; prefix filtering disabled");
        }
        self.dataset = Some(Dataset {
            table: loaded.table,
            encoding: loaded.encoding,
            mapping,
            options,
        });
        summary
    }

    fn dataset(&self) -> Result<&Dataset> {
        self.dataset.as_ref().ok_or(EngineError::NoDataset)
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn table(&self) -> Result<&RawTable> {
        Ok(&self.dataset()?.table)
    }

    pub fn columns(&self) -> Result<&[String]> {
        Ok(self.dataset()?.table.headers())
    }

    pub fn current_mapping(&self) -> Result<&Mapping> {
        Ok(&self.dataset()?.mapping)
    }

    pub fn current_options(&self) -> Result<&OptionIndex> {
        Ok(&self.dataset()?.options)
    }

    /// Replace the mapping wholesale and rebuild the option index before
    /// returning. Unknown columns in `manual` are dropped.
    pub fn set_mapping(
        &mut self,
        manual: &BTreeMap<Dimension, Option<String>>,
    ) -> Result<&Mapping> {
        let dataset = self.dataset.as_mut().ok_or(EngineError::NoDataset)?;
        let mapping = self.mapper.override_mapping(&dataset.table, manual);
        dataset.options = OptionIndex::build(&dataset.table, &mapping);
        dataset.mapping = mapping;
        log::info!("mapping overridden: {} dimensions mapped", dataset.mapping.len());
        Ok(&dataset.mapping)
    }

    pub fn meta(&self) -> Result<Meta> {
        let ds = self.dataset()?;
        Ok(Meta {
            mapping: ds.mapping.clone(),
            options: ds.options.clone(),
            columns: ds.table.headers().to_vec(),
            rows: ds.table.len(),
            encoding: ds.encoding,
        })
    }

    /// Indices of the rows matching `spec`.
    pub fn filter(&self, spec: &FilterSpec) -> Result<Vec<usize>> {
        let ds = self.dataset()?;
        Ok(filter::apply(&ds.table, &ds.mapping, spec))
    }

    /// Filter and paginate in one call.
    pub fn query(&self, spec: &FilterSpec) -> Result<ResultPage> {
        let ds = self.dataset()?;
        let matching = filter::apply(&ds.table, &ds.mapping, spec);
        Ok(pager::page(&ds.table, &matching, spec))
    }

    /// Filter and serialise every matching row as CSV.
    pub fn export(&self, spec: &FilterSpec) -> Result<Vec<u8>> {
        let ds = self.dataset()?;
        let matching = filter::apply(&ds.table, &ds.mapping, spec);
        pager::export(&ds.table, &matching, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = concat!(
        "BIN,Issuing Bank,Brand\n",
        "123456,BankA,Visa\n",
        "123457,BankB,Visa\n",
        "999999,BankA,MasterCard\n",
    )
    .as_bytes();

    #[test]
    fn reads_fail_before_load() {
        let store = DatasetStore::default();
        assert!(!store.is_loaded());
        assert!(matches!(store.meta(), Err(EngineError::NoDataset)));
        assert!(matches!(store.query(&FilterSpec::default()), Err(EngineError::NoDataset)));
    }

    #[test]
    fn load_infers_mapping_and_options() {
        let mut store = DatasetStore::default();
        let summary = store.load(SAMPLE).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns, 3);
        let mapping = store.current_mapping().unwrap();
        assert_eq!(mapping.get(Dimension::Bank), Some("Issuing Bank"));
        let options = store.current_options().unwrap();
        assert_eq!(options.get(Dimension::Brand).unwrap(), &["MasterCard", "Visa"]);
    }

    #[test]
    fn failed_load_keeps_previous_dataset() {
        let mut store = DatasetStore::default();
        store.load(SAMPLE).unwrap();
        assert!(store.load(b"BIN,BIN\n1,2\n").is_err());
        assert_eq!(store.table().unwrap().len(), 3);
        assert_eq!(store.columns().unwrap()[1], "Issuing Bank");
    }

    #[test]
    fn new_load_replaces_everything() {
        let mut store = DatasetStore::default();
        store.load(SAMPLE).unwrap();
        store.load(b"iin,country\n400000,Spain\n").unwrap();
        let meta = store.meta().unwrap();
        assert_eq!(meta.columns, vec!["iin", "country"]);
        assert_eq!(meta.mapping.get(Dimension::Bank), None);
        assert_eq!(meta.options.get(Dimension::Country).unwrap(), &["Spain"]);
    }

    #[test]
    fn set_mapping_recomputes_options() {
        let mut store = DatasetStore::default();
        store.load(SAMPLE).unwrap();
        let manual = BTreeMap::from([
            (Dimension::BinPrefix, Some("BIN".to_string())),
            (Dimension::Level, Some("Brand".to_string())),
            (Dimension::Bank, Some("Missing".to_string())),
        ]);
        let mapping = store.set_mapping(&manual).unwrap();
        assert_eq!(mapping.get(Dimension::Level), Some("Brand"));
        assert_eq!(mapping.get(Dimension::Bank), None);
        let options = store.current_options().unwrap();
        assert!(options.get(Dimension::Brand).is_none());
        assert_eq!(options.get(Dimension::Level).unwrap(), &["MasterCard", "Visa"]);
        assert_eq!(store.table().unwrap().len(), 3);
    }

    #[test]
    fn load_default_tries_configured_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("bins.csv");
        std::fs::write(&present, SAMPLE).unwrap();
        let config = EngineConfig {
            default_data_files: vec![dir.path().join("absent.csv"), present],
            ..EngineConfig::default()
        };
        let mut store = DatasetStore::new(config);
        let summary = store.load_default().unwrap().unwrap();
        assert_eq!(summary.rows, 3);

        let mut empty = DatasetStore::new(EngineConfig {
            default_data_files: vec![dir.path().join("absent.csv")],
            ..EngineConfig::default()
        });
        assert!(empty.load_default().unwrap().is_none());
    }
}
