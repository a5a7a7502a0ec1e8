use anyhow::{Context, Result};

use ivcompiler_backend::*;
use ivexpctrl_backend::*;

const USAGE: &str = "usage: ivexpctrl_backend_bin <config.json> [results.json]";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().context(USAGE)?;
    let results_path = args.next();

    let config = SweepConfig::from_json_file(&config_path)
        .with_context(|| format!("Failed to load sweep configuration {}", config_path))?;
    let measurement = IvMeasurement::from_config(&config)?;
    let driver = SimulatedDriver::new(config.driver.simulation.resistance)?;
    log::info!(
        "Simulating {} devices on a {} ohm resistor",
        measurement.devices().len(),
        driver.resistance()
    );
    let run = measurement.run_test(driver)?;

    match results_path {
        Some(path) => {
            let text = serde_json::to_string_pretty(&run.results.to_json())?;
            std::fs::write(&path, text)
                .with_context(|| format!("Failed to write results to {}", path))?;
            log::info!("Results written to {}", path);
        }
        None => {
            for label in experiment_labels() {
                let devices: Vec<String> = run
                    .results
                    .outputs()
                    .get(&label)
                    .map(|devs| {
                        devs.iter()
                            .map(|(name, current)| {
                                let peak = current.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
                                format!("{} (peak {:.3} nA)", name, peak)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                println!("{}: {}", label, devices.join(", "));
            }
        }
    }
    Ok(())
}
