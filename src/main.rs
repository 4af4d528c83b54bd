//! calc-plans entry point: CLI wiring and config-driven billing run.

use std::io;
use std::process;

use calc_plans::billing::{BillSummary, BillingEngine, UnmatchedPolicy};
use calc_plans::cli::{CliOptions, parse_args};
use calc_plans::config::PlanConfig;
use calc_plans::io::{export_csv, read_readings_from_path, write_csv};
use calc_plans::observability::init_tracing;
use calc_plans::reading::Reading;
use calc_plans::reporting::{format_summary, print_summary};
use calc_plans::synth::SyntheticMeter;
use chrono::NaiveDate;
use chrono_tz::Tz;

/// Seed offset for the second demo meter so the two profiles differ.
const SECOND_METER_SEED_OFFSET: u64 = 57;

/// Demo usage starts the week before the summer rates begin.
fn demo_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 27).unwrap_or(NaiveDate::MIN)
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn load_plans(cli: &CliOptions) -> PlanConfig {
    let loaded = match (&cli.plans, &cli.preset) {
        (Some(path), _) => PlanConfig::from_toml_file(path),
        (None, Some(name)) => PlanConfig::from_preset(name),
        (None, None) => Ok(PlanConfig::dte()),
    };
    loaded.unwrap_or_else(|e| fail(e))
}

fn load_readings(cli: &CliOptions, tz: Tz) -> Vec<Reading> {
    if let Some(path) = &cli.input {
        return read_readings_from_path(path, tz).unwrap_or_else(|e| fail(e));
    }

    let days = cli.demo_days.unwrap_or_default();
    tracing::info!(days, seed = cli.seed, "billing synthetic usage");
    let mut readings = SyntheticMeter::new("100", "M-1", cli.seed).readings(demo_start(), days, tz);
    readings.extend(
        SyntheticMeter::new("100", "M-2", cli.seed.wrapping_add(SECOND_METER_SEED_OFFSET))
            .readings(demo_start(), days, tz),
    );
    readings
}

fn main() {
    init_tracing();

    let cli = parse_args().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        calc_plans::cli::print_usage();
        process::exit(2);
    });

    let mut plans = load_plans(&cli);
    if cli.strict {
        plans.billing.on_unmatched = UnmatchedPolicy::Fail;
    }

    let setup = plans.build().unwrap_or_else(|errors| {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    });

    let readings = load_readings(&cli, setup.time_zone);

    let engine = BillingEngine::new(setup.tariffs)
        .unwrap_or_else(|e| fail(e))
        .with_policy(setup.on_unmatched);
    let billed = engine.run(readings).unwrap_or_else(|e| fail(e));
    let summary =
        BillSummary::from_readings(&billed, engine.tariffs()).unwrap_or_else(|e| fail(e));

    // Billed CSV goes to the file when given, otherwise to stdout with the
    // comparison moved to stderr.
    if let Some(path) = &cli.output {
        if let Err(e) = export_csv(&billed, engine.tariffs(), path) {
            fail(format!("failed to write CSV: {e}"));
        }
        print_summary(&summary);
    } else {
        if let Err(e) = write_csv(&billed, engine.tariffs(), io::stdout().lock()) {
            fail(format!("failed to write CSV: {e}"));
        }
        eprint!("{}", format_summary(&summary));
    }

    if summary.unmatched_hours() > 0 {
        tracing::warn!(
            hours = summary.unmatched_hours(),
            "some hours had no rate under at least one tariff"
        );
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(calc_plans::api::AppState {
            readings: billed,
            summary,
        });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new()
            .unwrap_or_else(|e| fail(format!("failed to create tokio runtime: {e}")));
        if let Err(e) = rt.block_on(calc_plans::api::serve(state, addr)) {
            fail(format!("API server on {addr}: {e}"));
        }
    }
}
