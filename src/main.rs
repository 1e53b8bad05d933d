//! execlog binary entry point.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use execlog::cli::{self, Args, Subcommand};
use execlog::config::Config;
use execlog::execution::import_executable;
use execlog::{logging, CommandResolver, ConsoleSink, ExecutionSession};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'execlog --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = logging::init_with_filter(config.log_filter()) {
        eprintln!("warning: logging unavailable: {}", e);
    }

    debug!(?config, "configuration loaded");

    if let Some(line) = args.command_line() {
        return run(&config, &args, &line).await;
    }

    match &args.command {
        Some(Subcommand::Import { file }) => import(&config, file),
        _ => {
            cli::print_help();
            ExitCode::from(2)
        }
    }
}

async fn run(config: &Config, args: &Args, line: &str) -> ExitCode {
    let mut resolver = CommandResolver::new();
    if let Some(ref binary) = args.binary {
        resolver.select_executable(binary);
    }

    let mut command = match resolver.resolve(line) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Some(ref cwd) = args.cwd {
        command = command.working_dir(cwd);
    }

    let running = ExecutionSession::new(command, config.to_session_settings())
        .with_sink(Arc::new(ConsoleSink))
        .start();

    let cancel = running.cancel_handle();
    let interrupt = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if cancel.cancel() {
                info!("interrupted; cancelling command");
                break;
            }
        }
    });

    let result = running.wait().await;
    interrupt.abort();

    match result {
        Ok(report) => ExitCode::from(report.process_exit_code()),
        Err(e) => {
            error!(error = %e, "session task failed");
            ExitCode::FAILURE
        }
    }
}

fn import(config: &Config, file: &Path) -> ExitCode {
    match import_executable(file, &config.binaries_dir()) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
