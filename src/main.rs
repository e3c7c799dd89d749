use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use bin_explorer::data::mapper::parse_manual_mapping;
use bin_explorer::{parse_params, DatasetStore, EngineConfig};

/// Explore a BIN/IIN table: inspect the inferred schema, filter, page and
/// export.
#[derive(Debug, Parser)]
#[command(name = "bin-explorer", version, about)]
struct Cli {
    /// CSV file to load. Defaults to the first configured data file found.
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// JSON engine configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON object overriding the inferred mapping, e.g. {"bank": "Issuer"}.
    #[arg(long, global = true)]
    mapping: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print mapping, filter options and columns as JSON.
    Meta,
    /// Print one page of matching rows as JSON.
    Query {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "1")]
        page: String,
        #[arg(long)]
        page_size: Option<String>,
    },
    /// Write every matching row as CSV.
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct FilterArgs {
    /// BIN prefix (left-anchored).
    #[arg(long)]
    prefix: Option<String>,
    /// Keep only this value, as DIMENSION=VALUE. Repeatable.
    #[arg(long, value_name = "DIMENSION=VALUE")]
    include: Vec<String>,
    /// Drop this value, as DIMENSION=VALUE. Repeatable.
    #[arg(long, value_name = "DIMENSION=VALUE")]
    exclude: Vec<String>,
    /// "true" or "false".
    #[arg(long)]
    prepaid: Option<String>,
    /// Case-insensitive text searched in mapped columns.
    #[arg(long)]
    text: Option<String>,
    /// Drop rows duplicated across the output columns.
    #[arg(long)]
    dedupe: bool,
    /// Output column. Repeatable; all columns when omitted.
    #[arg(long = "column")]
    columns: Vec<String>,
}

impl FilterArgs {
    /// Flatten into request parameters, the same shape a web front end sends.
    fn to_params(&self) -> Result<Vec<(String, String)>> {
        let mut params = Vec::new();
        if let Some(prefix) = &self.prefix {
            params.push(("prefix".to_string(), prefix.clone()));
        }
        for (kind, entries) in [("include", &self.include), ("exclude", &self.exclude)] {
            for entry in entries {
                let Some((dim, value)) = entry.split_once('=') else {
                    bail!("--{kind} expects DIMENSION=VALUE, got '{entry}'");
                };
                params.push((format!("{kind}_{}", dim.trim()), value.to_string()));
            }
        }
        if let Some(prepaid) = &self.prepaid {
            params.push(("prepaid".to_string(), prepaid.clone()));
        }
        if let Some(text) = &self.text {
            params.push(("text".to_string(), text.clone()));
        }
        params.push(("dedupe".to_string(), self.dedupe.to_string()));
        for column in &self.columns {
            params.push(("columns".to_string(), column.clone()));
        }
        Ok(params)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let mut store = DatasetStore::new(config);

    let summary = match &cli.input {
        Some(path) => store
            .load_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => match store.load_default()? {
            Some(summary) => summary,
            None => bail!("no input file given and no default data file found"),
        },
    };
    log::info!("{} rows loaded ({})", summary.rows, summary.encoding);

    if let Some(path) = &cli.mapping {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading mapping {}", path.display()))?;
        let raw: BTreeMap<String, Option<String>> =
            serde_json::from_str(&text).context("parsing mapping override")?;
        store.set_mapping(&parse_manual_mapping(raw))?;
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Command::Meta => {
            serde_json::to_writer_pretty(&mut out, &store.meta()?)?;
            writeln!(out)?;
        }
        Command::Query {
            filter,
            page,
            page_size,
        } => {
            let mut params = filter.to_params()?;
            params.push(("page".to_string(), page.clone()));
            if let Some(size) = page_size {
                params.push(("page_size".to_string(), size.clone()));
            }
            let spec = parse_params(params, store.config())?;
            serde_json::to_writer_pretty(&mut out, &store.query(&spec)?)?;
            writeln!(out)?;
        }
        Command::Export { filter, output } => {
            let spec = parse_params(filter.to_params()?, store.config())?;
            let bytes = store.export(&spec)?;
            match output {
                Some(path) => std::fs::write(path, &bytes)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => out.write_all(&bytes)?,
            }
        }
    }
    Ok(())
}
