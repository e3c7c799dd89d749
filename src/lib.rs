//! Card BIN/IIN table explorer.
//!
//! Loads a CSV of issuer identification records whose column names are not
//! known in advance, infers which columns carry the BIN prefix, bank, brand,
//! type, level, country, country code and prepaid flag, and answers filter,
//! pagination and export requests against it.

pub mod config;
pub mod data;
pub mod error;
pub mod state;

pub use config::EngineConfig;
pub use data::filter::{FilterSpec, Pagination};
pub use data::loader::LoadSummary;
pub use data::mapper::SchemaMapper;
pub use data::model::{Dimension, Mapping, RawTable};
pub use data::options::OptionIndex;
pub use data::pager::ResultPage;
pub use data::params::parse_params;
pub use error::{EngineError, Result};
pub use state::{DatasetStore, Meta};
