/// Data layer: core types, loading, schema inference, filtering and paging.
///
/// Architecture:
/// ```text
///   CSV bytes
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  decode + parse → RawTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐      ┌──────────┐
///   │  mapper   │ ───▶ │ options  │  Mapping → choice lists
///   └──────────┘      └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterSpec → matching row indices
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  pager    │  projection, dedupe, page / CSV export
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod mapper;
pub mod model;
pub mod options;
pub mod pager;
pub mod params;
