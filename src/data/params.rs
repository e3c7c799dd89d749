//! Request-parameter decoding for [`FilterSpec`].
//!
//! Front ends pass filters as flat key/value pairs (a query string, form
//! fields, command-line flags). Repeated keys accumulate:
//!
//! | key                     | value                                  |
//! |-------------------------|----------------------------------------|
//! | `prefix`                | string                                 |
//! | `include_<dimension>`   | string, repeatable                     |
//! | `exclude_<dimension>`   | string, repeatable                     |
//! | `prepaid`               | `""`, `true`, `false`                  |
//! | `text`                  | string                                 |
//! | `dedupe`                | boolean                                |
//! | `columns`               | string, repeatable                     |
//! | `page` / `page_size`    | positive integer                       |

use super::filter::{FilterSpec, Pagination};
use super::model::Dimension;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Build a [`FilterSpec`] from request parameters.
///
/// Pagination problems are fatal to the request. Keys naming an unknown
/// dimension, or a set the dimension does not accept, are ignored.
pub fn parse_params<I, K, V>(pairs: I, config: &EngineConfig) -> Result<FilterSpec>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut spec = FilterSpec::default();
    let mut page = 1;
    let mut page_size = config.default_page_size;

    for (key, value) in pairs {
        let (key, value) = (key.as_ref(), value.as_ref());
        match key {
            "prefix" => spec.prefix = value.to_string(),
            "text" => spec.text = value.to_string(),
            "prepaid" => spec.prepaid = parse_prepaid(value),
            "dedupe" => spec.dedupe = parse_flag("dedupe", value)?,
            "columns" => {
                if !value.is_empty() {
                    spec.columns.push(value.to_string());
                }
            }
            "page" => page = parse_positive("page", value)?,
            "page_size" => page_size = parse_positive("page_size", value)?,
            _ => {
                if let Some(dim) = key.strip_prefix("include_") {
                    push_set_value(&mut spec, SetKind::Include, dim, value);
                } else if let Some(dim) = key.strip_prefix("exclude_") {
                    push_set_value(&mut spec, SetKind::Exclude, dim, value);
                } else {
                    log::warn!("unknown filter parameter '{key}' ignored");
                }
            }
        }
    }

    if let Some(max) = config.max_page_size.filter(|max| page_size > *max) {
        return Err(EngineError::invalid_filter(
            "page_size",
            format!("must not exceed {max}"),
        ));
    }
    spec.pagination = Pagination::new(page, page_size)?;
    Ok(spec)
}

#[derive(Debug, Clone, Copy)]
enum SetKind {
    Include,
    Exclude,
}

fn push_set_value(spec: &mut FilterSpec, kind: SetKind, dim: &str, value: &str) {
    let Ok(dim) = dim.parse::<Dimension>() else {
        log::warn!("filter on unknown dimension '{dim}' ignored");
        return;
    };
    if value.trim().is_empty() {
        return;
    }
    let accepted = match kind {
        SetKind::Include => dim.is_categorical(),
        SetKind::Exclude => dim.supports_exclusion(),
    };
    if !accepted {
        log::warn!("{kind:?} set on {dim} is not supported, ignored");
        return;
    }
    let sets = match kind {
        SetKind::Include => &mut spec.include,
        SetKind::Exclude => &mut spec.exclude,
    };
    sets.entry(dim).or_default().insert(value.to_string());
}

/// Empty means "no constraint"; a value that is not boolean-like is treated
/// the same way.
fn parse_prepaid(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        other => {
            log::warn!("prepaid selector '{other}' not understood, ignored");
            None
        }
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        _ => Err(EngineError::invalid_filter(field, format!("'{value}' is not a boolean"))),
    }
}

fn parse_positive(field: &str, value: &str) -> Result<usize> {
    let n: i64 = value
        .trim()
        .parse()
        .map_err(|_| EngineError::invalid_filter(field, format!("'{value}' is not an integer")))?;
    if n <= 0 {
        return Err(EngineError::invalid_filter(field, "must be positive"));
    }
    usize::try_from(n).map_err(|_| EngineError::invalid_filter(field, "out of range"))
}
