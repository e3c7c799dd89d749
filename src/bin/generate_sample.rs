//! Writes a synthetic BIN list for demos and manual testing.
//!
//! Usage: `generate_sample [OUTPUT.csv] [ROWS]` (defaults: `sample_bins.csv`, 500).

use std::path::PathBuf;

use anyhow::{Context, Result};

const BRANDS: &[(&str, &str)] = &[
    ("VISA", "4"),
    ("MASTERCARD", "5"),
    ("AMEX", "3"),
    ("DISCOVER", "6"),
];
const TYPES: &[&str] = &["CREDIT", "DEBIT", "CHARGE"];
const LEVELS: &[&str] = &["CLASSIC", "GOLD", "PLATINUM", "BUSINESS", "SIGNATURE", ""];
const COUNTRIES: &[(&str, &str)] = &[
    ("United States", "US"),
    ("Spain", "ES"),
    ("Mexico", "MX"),
    ("France", "FR"),
    ("Brazil", "BR"),
];
const BANKS: &[&str] = &[
    "Banco Nacional",
    "First Federal Bank",
    "Caja Rural, S.C.C.",
    "Crédit Régional",
    "Union Savings",
    "Metro \"Express\" Bank",
];
const PREPAID: &[&str] = &["yes", "no", "no", "Y", "N", ""];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len() as u64) as usize]
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let mut args = std::env::args().skip(1);
    let output = PathBuf::from(args.next().unwrap_or_else(|| "sample_bins.csv".to_string()));
    let rows: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid row count '{n}'"))?,
        None => 500,
    };

    let mut rng = SimpleRng::new(42);
    let mut writer = csv::Writer::from_path(&output)
        .with_context(|| format!("creating {}", output.display()))?;
    writer.write_record([
        "BIN",
        "Issuing Bank",
        "Brand",
        "Type",
        "Category",
        "Country Name",
        "ISO2",
        "Prepaid",
    ])?;

    for i in 0..rows {
        let (brand, lead) = *rng.pick(BRANDS);
        let (country, iso2) = *rng.pick(COUNTRIES);
        // Every 25th row reuses the previous row's BIN digits.
        let body = if i % 25 == 24 { (i - 1) as u64 } else { i as u64 };
        let bin = format!("{lead}{:05}", (body * 7919) % 100_000);
        writer.write_record([
            bin.as_str(),
            *rng.pick(BANKS),
            brand,
            *rng.pick(TYPES),
            *rng.pick(LEVELS),
            country,
            iso2,
            *rng.pick(PREPAID),
        ])?;
    }
    writer.flush()?;

    log::info!("wrote {rows} rows to {}", output.display());
    println!("Wrote {rows} rows to {}", output.display());
    Ok(())
}
