//! promolens-runner: headless pipeline runner.
//!
//! Usage:
//!   promolens-runner --data-dir ./data --out ./out
//!   promolens-runner --seed 12345 --customers 500

use anyhow::Result;
use promolens_core::{
    catalog::{load_portfolio, load_profile, load_transcript},
    pipeline::run_pipeline,
    synth::{generate, SynthConfig},
    PipelineConfig,
};
use std::env;
use std::fs;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let customers = parse_arg(&args, "--customers", 200usize);
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str());
    let out_dir = args
        .windows(2)
        .find(|w| w[0] == "--out")
        .map(|w| w[1].as_str());

    let config = PipelineConfig::default();

    // Real tables when a data dir is given, synthetic ones otherwise.
    let (portfolio, profiles, transcript) = match data_dir {
        Some(dir) => {
            let dir = Path::new(dir);
            log::info!("runner: loading tables from {}", dir.display());
            println!("promolens — loading tables from {}", dir.display());
            (
                load_portfolio(&dir.join("portfolio.json"))?,
                load_profile(&dir.join("profile.json"))?,
                load_transcript(&dir.join("transcript.json"))?,
            )
        }
        None => {
            log::info!("runner: synthesizing tables (seed {seed}, {customers} customers)");
            println!("promolens — synthesizing tables (seed {seed}, {customers} customers)");
            generate(&SynthConfig { seed, customers })?
        }
    };

    let output = run_pipeline(&portfolio, &profiles, &transcript, &config)?;
    log::info!(
        "runner: pipeline finished ({} feature rows, {} receive rows, {} select rows)",
        output.summary.feature_rows,
        output.summary.receive_rows,
        output.summary.select_rows
    );
    let s = &output.summary;

    println!();
    println!("=== RUN SUMMARY ===");
    println!("  customers (with events): {}", s.customers);
    println!("  events:                  {}", s.events);
    println!("  offer groups:            {}", s.offer_groups);
    println!("  non-offer buckets:       {}", s.non_offer_buckets);
    println!("  orphaned events:         {}", s.unmatched_events);
    println!("  feature rows:            {}", s.feature_rows);
    println!("  receive view rows:       {}", s.receive_rows);
    println!("  select view rows:        {}", s.select_rows);
    println!("  total spend:             ${:.2}", s.total_spend);

    if let Some(dir) = out_dir {
        let dir = Path::new(dir);
        fs::create_dir_all(dir)?;
        fs::write(dir.join("features.json"), serde_json::to_string_pretty(&output.features)?)?;
        fs::write(dir.join("receive_view.json"), serde_json::to_string_pretty(&output.receive)?)?;
        fs::write(dir.join("select_view.json"), serde_json::to_string_pretty(&output.select)?)?;
        fs::write(dir.join("summary.json"), serde_json::to_string_pretty(&output.summary)?)?;
        println!();
        println!("  wrote features + training views to {}", dir.display());
    }

    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
