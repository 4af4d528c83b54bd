use std::env;
use std::path::PathBuf;

/// Days of synthetic usage when no `--input` is given.
pub const DEFAULT_DEMO_DAYS: u64 = 7;
pub const DEFAULT_SEED: u64 = 42;
#[cfg(feature = "api")]
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    /// Usage export to bill; synthetic usage is generated when absent.
    pub input: Option<PathBuf>,
    /// Billed CSV destination; stdout when absent.
    pub output: Option<PathBuf>,
    pub plans: Option<PathBuf>,
    pub preset: Option<String>,
    /// Fail on the first reading a tariff cannot price.
    pub strict: bool,
    pub demo_days: Option<u64>,
    pub seed: u64,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub port: u16,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

/// Parses arguments, not including the program name.
///
/// # Errors
///
/// Returns a message for unknown flags, missing or malformed values,
/// repeated flags, and conflicting sources.
pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    if args.len() == 1 && (args[0] == "--help" || args[0] == "-h") {
        print_usage();
        std::process::exit(0);
    }
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut input = None;
    let mut output = None;
    let mut plans = None;
    let mut preset = None;
    let mut strict = false;
    let mut demo_days = None;
    let mut seed = None;
    #[cfg(feature = "api")]
    let mut serve = false;
    #[cfg(feature = "api")]
    let mut port = None;

    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --input (expected a CSV path)")?;
                if input.replace(PathBuf::from(path)).is_some() {
                    return Err("--input provided more than once".to_string());
                }
            }
            "--output" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --output (expected a CSV path)")?;
                if output.replace(PathBuf::from(path)).is_some() {
                    return Err("--output provided more than once".to_string());
                }
            }
            "--plans" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --plans (expected a TOML file path)")?;
                if plans.replace(PathBuf::from(path)).is_some() {
                    return Err("--plans provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name =
                    args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--strict" => strict = true,
            "--demo-days" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --demo-days (expected a u64)")?;
                let days = value
                    .parse::<u64>()
                    .map_err(|_| format!("--demo-days value \"{value}\" is not a valid u64"))?;
                if demo_days.replace(days).is_some() {
                    return Err("--demo-days provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let s = value
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{value}\" is not a valid u64"))?;
                if seed.replace(s).is_some() {
                    return Err("--seed provided more than once".to_string());
                }
            }
            #[cfg(feature = "api")]
            "--serve" => serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                let p = value
                    .parse::<u16>()
                    .map_err(|_| format!("--port value \"{value}\" is not a valid u16"))?;
                if port.replace(p).is_some() {
                    return Err("--port provided more than once".to_string());
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if plans.is_some() && preset.is_some() {
        return Err(
            "arguments `--plans` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }
    if input.is_some() && demo_days.is_some() {
        return Err(
            "arguments `--input` and `--demo-days` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if plans.is_none() && preset.is_none() {
        preset = Some("dte".to_string());
    }
    if input.is_none() && demo_days.is_none() {
        demo_days = Some(DEFAULT_DEMO_DAYS);
    }

    Ok(CliOptions {
        input,
        output,
        plans,
        preset,
        strict,
        demo_days,
        seed: seed.unwrap_or(DEFAULT_SEED),
        #[cfg(feature = "api")]
        serve,
        #[cfg(feature = "api")]
        port: port.unwrap_or(DEFAULT_PORT),
    })
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("calc-plans: compare what hourly usage costs under each electricity plan");
    eprintln!();
    eprintln!("Usage: calc-plans [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --input <path>      Usage export CSV to bill");
    eprintln!("  --output <path>     Write billed readings here (default: stdout)");
    eprintln!("  --plans <path>      Load tariffs from a TOML file");
    eprintln!("  --preset <name>     Use built-in tariffs (dte)");
    eprintln!("  --strict            Fail when a tariff has no rate for a reading");
    eprintln!("  --demo-days <n>     Bill n days of synthetic usage instead of --input");
    eprintln!("  --seed <u64>        Seed for synthetic usage (default: {DEFAULT_SEED})");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve             Start REST API server after billing");
        eprintln!("  --port <u16>        API server port (default: {DEFAULT_PORT})");
    }
    eprintln!("  --help              Show this help message");
    eprintln!();
    eprintln!(
        "Without --input, {DEFAULT_DEMO_DAYS} days of synthetic usage are billed. \
         Without --plans or --preset, the dte preset is used."
    );
}
