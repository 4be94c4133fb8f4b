use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use seedbatch::control_file;
use seedbatch::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn scenarios_arg() -> Arg {
    Arg::new("scenarios")
        .long("scenarios")
        .short('s')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Scenario catalog (YAML, or JSON by .json extension)")
}

fn settings_arg() -> Arg {
    Arg::new("settings")
        .long("settings")
        .value_parser(value_parser!(PathBuf))
        .help("Settings file (TOML); defaults apply when omitted")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print the report as JSON")
}

fn cli() -> Command {
    Command::new("seedbatch")
        .version(seedbatch::VERSION)
        .about("Seed-indexed batch runner for an external Monte-Carlo simulator")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging (RUST_LOG takes precedence)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run every scenario until its seed target is archived")
                .arg(scenarios_arg())
                .arg(settings_arg())
                .arg(
                    Arg::new("executable")
                        .long("executable")
                        .value_parser(value_parser!(PathBuf))
                        .help("Simulator binary"),
                )
                .arg(
                    Arg::new("control-file")
                        .long("control-file")
                        .value_parser(value_parser!(PathBuf))
                        .help("Control file, relative to the work directory"),
                )
                .arg(
                    Arg::new("work-dir")
                        .long("work-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory the simulator runs in"),
                )
                .arg(
                    Arg::new("target-root")
                        .long("target-root")
                        .value_parser(value_parser!(PathBuf))
                        .help("Root of the seed archive"),
                )
                .arg(
                    Arg::new("max-attempts")
                        .long("max-attempts")
                        .value_parser(value_parser!(u32).range(1..))
                        .help("Attempts allowed per scenario"),
                )
                .arg(
                    Arg::new("seed-policy")
                        .long("seed-policy")
                        .value_parser(SeedPolicy::VARIANTS)
                        .help("How the first seed of a scenario is chosen"),
                )
                .arg(
                    Arg::new("keep-going")
                        .long("keep-going")
                        .action(ArgAction::SetTrue)
                        .help("Continue with the next scenario after a failed one"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("census")
                .about("Show the archive state of every scenario without running anything")
                .arg(scenarios_arg())
                .arg(settings_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("apply")
                .about("Rewrite a control file once with the given parameters")
                .arg(
                    Arg::new("control-file")
                        .long("control-file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .required(true)
                        .value_parser(value_parser!(u64)),
                )
                .arg(Arg::new("energy").long("energy").required(true))
                .arg(Arg::new("particle").long("particle").required(true))
                .arg(
                    Arg::new("histories")
                        .long("histories")
                        .required(true)
                        .value_parser(value_parser!(u64)),
                ),
        )
}

fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_settings(args: &ArgMatches) -> Result<Settings> {
    match args.get_one::<PathBuf>("settings") {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn load_catalog(args: &ArgMatches) -> Result<ScenarioCatalog> {
    let path = args
        .get_one::<PathBuf>("scenarios")
        .context("--scenarios is required")?;
    ScenarioCatalog::load(path)
        .with_context(|| format!("failed to load scenarios from {}", path.display()))
}

/// Apply `run` flags on top of the loaded settings
fn override_settings(mut settings: Settings, args: &ArgMatches) -> Result<Settings> {
    if let Some(path) = args.get_one::<PathBuf>("executable") {
        settings = settings.with_executable(path);
    }
    if let Some(path) = args.get_one::<PathBuf>("control-file") {
        settings = settings.with_control_file(path);
    }
    if let Some(path) = args.get_one::<PathBuf>("work-dir") {
        settings = settings.with_work_dir(path);
    }
    if let Some(path) = args.get_one::<PathBuf>("target-root") {
        settings = settings.with_target_root(path);
    }
    if let Some(limit) = args.get_one::<u32>("max-attempts") {
        settings = settings.with_max_attempts(Some(*limit));
    }
    if let Some(policy) = args.get_one::<String>("seed-policy") {
        settings = settings.with_seed_policy(policy.parse()?);
    }
    if args.get_flag("keep-going") {
        settings = settings.with_keep_going(true);
    }
    settings.validate()?;
    Ok(settings)
}

fn run(args: &ArgMatches) -> Result<bool> {
    let settings = override_settings(load_settings(args)?, args)?;
    let catalog = load_catalog(args)?;
    if catalog.is_empty() {
        tracing::warn!("Scenario catalog is empty; nothing to run");
    }

    let runner = ProcessRunner::new(
        settings.simulator.executable.clone(),
        settings.simulator.work_dir.clone(),
    );
    let report = Orchestrator::new(settings, runner).run_all(&catalog);

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(report.passed())
}

fn census_cmd(args: &ArgMatches) -> Result<bool> {
    let settings = load_settings(args)?;
    let catalog = load_catalog(args)?;
    let entries = census(&settings, &catalog)?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(true);
    }

    println!("=== Archive Census ({}) ===", settings.archive.target_root.display());
    for e in &entries {
        println!("Scenario: {}", e.scenario);
        println!("  Folder: {}", e.folder);
        println!("  Seeds: {}/{}", e.existing_seeds, e.target_seeds);
        println!("  Next slot: seed{}", e.next_slot);
        println!("  Recorded crashes: {}", e.recorded_crashes);
    }
    Ok(true)
}

fn apply_cmd(args: &ArgMatches) -> Result<bool> {
    let path = args
        .get_one::<PathBuf>("control-file")
        .context("--control-file is required")?;
    let params = RunParameters {
        seed: *args.get_one::<u64>("seed").context("--seed is required")?,
        energy: args
            .get_one::<String>("energy")
            .context("--energy is required")?
            .clone(),
        particle: args
            .get_one::<String>("particle")
            .context("--particle is required")?
            .clone(),
        histories: *args
            .get_one::<u64>("histories")
            .context("--histories is required")?,
    };

    let rewrite = control_file::apply(path, &params)
        .with_context(|| format!("failed to rewrite {}", path.display()))?;
    println!(
        "{}: {} of {} lines substituted",
        path.display(),
        rewrite.substituted,
        rewrite.lines
    );
    Ok(rewrite.substituted > 0)
}

fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"), matches.get_flag("log-json"));

    let result = match matches.subcommand() {
        Some(("run", args)) => run(args),
        Some(("census", args)) => census_cmd(args),
        Some(("apply", args)) => apply_cmd(args),
        _ => unreachable!("subcommand_required"),
    };

    match result {
        Ok(passed) => std::process::exit(if passed { 0 } else { 1 }),
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}
