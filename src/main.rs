use anyhow::Result;
use clap::{CommandFactory, Parser};

use reclaimer::cli::{Cli, Command};
use reclaimer::commands::{self, EXIT_ERROR};
use reclaimer::config::Config;

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbose, cli.quiet);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    if let Command::Completions(args) = &cli.command {
        clap_complete::generate(args.shell, &mut Cli::command(), "reclaimer", &mut std::io::stdout());
        return Ok(commands::EXIT_OK);
    }

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    tracing::debug!(?config, "Loaded configuration");

    // Dispatch to subcommand
    match cli.command {
        Command::Scan(args) => {
            tracing::info!(?args, "Starting scan");
            commands::scan::run(args, config, cli.quiet)
        }
        Command::Delete(args) => {
            tracing::info!(?args, "Starting delete");
            commands::delete::run(args, config, cli.quiet)
        }
        Command::Classify(args) => commands::classify::run(args, &config),
        Command::Query(args) => commands::query::run(args, cli.quiet),
        Command::Serve => {
            tracing::info!("Serving commands on stdin");
            commands::serve::run(config)
        }
        Command::Completions(_) => Ok(commands::EXIT_OK),
    }
}

fn init_logging(verbosity: u8, quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if quiet {
        "warn"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reclaimer={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
