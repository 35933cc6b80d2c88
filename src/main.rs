mod debug_report;

use respace::{LengthPolicy, ProgramSpace, SpaceConfig, TraceRecord};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "RESPACE_LOG";

fn main() {
    init_logging();

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: &CliConfig) -> respace::Result<()> {
    let space = ProgramSpace::new(cli.space.clone())?;

    let resolution = match &cli.replay {
        Some(record) if cli.partial => space.replay_partial(record, cli.seed)?,
        Some(record) => space.replay(record)?,
        None => space.sample(cli.seed)?,
    };

    if cli.json {
        println!("{}", space.record(&resolution.trace).to_json()?);
    } else {
        debug_report::print_run(&space, &resolution, cli.seed, cli.color);
    }
    Ok(())
}

struct CliConfig {
    space: SpaceConfig,
    seed: u64,
    replay: Option<TraceRecord>,
    partial: bool,
    json: bool,
    color: bool,
}

/// Flags given on the command line; they win over `--config`.
#[derive(Default)]
struct Overrides {
    policy: Option<LengthPolicy>,
    max_length: Option<usize>,
    slots: Option<u8>,
    epochs: Option<i64>,
    no_fidelity: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut seed = 0u64;
    let mut config_path: Option<PathBuf> = None;
    let mut replay_path: Option<PathBuf> = None;
    let mut overrides = Overrides::default();
    let mut partial = false;
    let mut json = false;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            match &inline {
                Some(value) => Ok(value.clone()),
                None => args.next().ok_or_else(|| format!("error: {name} expects a value")),
            }
        };

        match flag.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("respace {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--json" => json = true,
            "--partial" => partial = true,
            "--no-fidelity" => overrides.no_fidelity = true,
            "--seed" => seed = parse_number("--seed", &value("--seed")?)?,
            "--config" => config_path = Some(PathBuf::from(value("--config")?)),
            "--replay" => replay_path = Some(PathBuf::from(value("--replay")?)),
            "--max-length" => overrides.max_length = Some(parse_number("--max-length", &value("--max-length")?)?),
            "--slots" => overrides.slots = Some(parse_number("--slots", &value("--slots")?)?),
            "--epochs" => overrides.epochs = Some(parse_number("--epochs", &value("--epochs")?)?),
            "--policy" => {
                let raw = value("--policy")?;
                let policy = LengthPolicy::from_name(&raw)
                    .ok_or_else(|| format!("error: invalid --policy '{raw}' (expected variable or fixed)"))?;
                overrides.policy = Some(policy);
            }
            _ => return Err(format!("error: unknown option '{arg}'\n\n{}", help_text())),
        }
    }

    let mut space = match &config_path {
        Some(path) => {
            let text = read_file(path)?;
            serde_json::from_str::<SpaceConfig>(&text)
                .map_err(|err| format!("error: invalid config '{}': {err}", path.display()))?
        }
        None => SpaceConfig::default(),
    };
    apply_overrides(&mut space, &overrides);
    space.validate().map_err(|err| format!("error: {err}"))?;

    let replay = match &replay_path {
        Some(path) => {
            let text = read_file(path)?;
            let record = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => TraceRecord::from_yaml(&text),
                _ => TraceRecord::from_json(&text),
            };
            Some(record.map_err(|err| format!("error: invalid trace '{}': {err}", path.display()))?)
        }
        None => None,
    };

    if partial && replay.is_none() {
        return Err("error: --partial needs --replay".to_string());
    }

    Ok(CliConfig { space, seed, replay, partial, json, color })
}

fn apply_overrides(space: &mut SpaceConfig, overrides: &Overrides) {
    if let Some(policy) = overrides.policy {
        space.policy = policy;
    }
    if let Some(max_length) = overrides.max_length {
        space.max_program_length = max_length;
    }
    if let Some(slots) = overrides.slots {
        space.variable_slots = slots;
    }
    if let Some(epochs) = overrides.epochs {
        space.max_epochs_per_config = epochs;
    }
    if overrides.no_fidelity {
        space.epoch_fidelity = false;
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("error: invalid {flag} '{raw}' (expected a non-negative integer)"))
}

fn read_file(path: &PathBuf) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|err| format!("error: failed to read '{}': {err}", path.display()))
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "respace {version}

Sample or replay register-machine optimizer programs.

Usage:
  respace [OPTIONS]
  respace [OPTIONS] --replay <trace.json|config.yaml> [--partial]

Options:
  --seed <n>             Seed for random decisions. Default: 0
  --replay <file>        Replay a trace record, or a flat SAMPLING__/ENVIRONMENT__
                         config, exactly. JSON, or YAML for .yaml/.yml files.
                         Every decision must be pinned.
  --partial              With --replay, draw decisions the file does not pin
                         from --seed instead of failing.
  --config <file>        Space configuration as JSON. Flags below take precedence.
  --policy <p>           Program length policy: variable | fixed. Default: variable
  --max-length <n>       Maximum number of instructions. Default: {max_length}
  --slots <n>            Available variable slots. Default: {slots}
  --epochs <n>           Maximum epochs per configuration. Default: {epochs}
  --no-fidelity          Do not expose the epochs fidelity.
  --json                 Print the trace record as JSON instead of the report.
  --color                Force ANSI color output.
  --no-color             Disable ANSI color output.
  -h, --help             Show this help message.
  -V, --version          Print version information.

Environment:
  {log_env}            Log filter (e.g. debug, respace=trace). Default: warn

Exit codes:
  0  Success.
  1  Resolution failed (missing key, domain, key, shape or policy mismatch).
  2  Invalid arguments or unreadable input files.
",
        version = env!("CARGO_PKG_VERSION"),
        max_length = respace::spaces::program::DEFAULT_MAX_PROGRAM_LENGTH,
        slots = respace::spaces::program::DEFAULT_VARIABLE_SLOTS,
        epochs = respace::spaces::program::DEFAULT_MAX_EPOCHS,
        log_env = LOG_ENV,
    )
}
