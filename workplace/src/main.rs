// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::rt::System;
use actix_web::{App, HttpServer, middleware::Logger};
use log::info;
use std::sync::Arc;
use std::time::Duration;

use workplace::app_state::AppState;
use workplace::bootstrap::{self, BootstrapResult};
use workplace::config::ValidatedConfig;
use workplace::repository::{ContentRepository, FsRepository};
use workplace::runtime_paths::RuntimePaths;
use workplace::util::logging::{build_logger, default_level_rules, parse_level};
use workplace::{admin, cli, util};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let parsed_args = match parse_args() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("❌ Invalid command line arguments: {}", error);
            eprintln!("❌ Use -C <root> to set the runtime directory.");
            return 2;
        }
    };

    match parsed_args.mode {
        RunMode::Help => {
            print!("{}", cli::help_text());
            0
        }
        RunMode::Cli(tokens) => {
            if let Err(error) = init_cli_logging() {
                eprintln!("❌ Failed to initialize logger: {}", error);
            }
            cli::run_cli(&parsed_args.runtime_root, tokens)
        }
        RunMode::Server => {
            let bootstrap = match bootstrap::bootstrap_runtime(&parsed_args.runtime_root) {
                Ok(result) => result,
                Err(error) => {
                    eprintln!("❌ Bootstrap error: {}", error);
                    eprintln!("❌ Application cannot start with invalid configuration.");
                    return 1;
                }
            };
            match System::new().block_on(run_server(bootstrap)) {
                Ok(()) => 0,
                Err(error) => {
                    eprintln!("❌ Server failed to start: {}", error);
                    1
                }
            }
        }
    }
}

fn init_cli_logging() -> Result<(), log::SetLoggerError> {
    let logger = build_logger(log::LevelFilter::Warn, env_logger::Target::Stderr);
    util::init_logger(default_level_rules(), logger)
}

async fn run_server(bootstrap: BootstrapResult) -> std::io::Result<()> {
    let validated_config = Arc::new(bootstrap.validated_config);
    let runtime_paths = bootstrap.runtime_paths;

    let logger = build_logger(
        parse_level(&validated_config.logging.level),
        env_logger::Target::Stdout,
    );
    util::init_logger(default_level_rules(), logger).map_err(|error| {
        eprintln!("❌ Failed to initialize logger: {}", error);
        std::io::Error::other(error.to_string())
    })?;

    log_startup_info(&validated_config, &runtime_paths);

    let repository: Arc<dyn ContentRepository> = Arc::new(FsRepository::new(&runtime_paths));
    let app_state = Arc::new(AppState::new(&validated_config, repository));
    info!("✅ Workplace sessions initialized");

    let sessions = app_state.sessions.clone();
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sessions.sweep_expired();
            if removed > 0 {
                log::debug!("Expired {} idle workplace sessions", removed);
            }
        }
    });

    let workers = validated_config.server.workers;
    let bind_address = validated_config.bind_address();
    let bind_address = (bind_address.0.to_string(), bind_address.1);

    let config_for_app = validated_config.clone();
    HttpServer::new(move || {
        let config = config_for_app.clone();
        let state = app_state.clone();
        App::new()
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .configure(|cfg| admin::configure(cfg, &config, &state))
    })
    .workers(workers)
    .bind(bind_address)?
    .run()
    .await
}

fn log_startup_info(config: &ValidatedConfig, runtime_paths: &RuntimePaths) {
    info!("Starting {} - {}", config.app.name, config.app.description);
    info!("Workers: {}", config.server.workers);
    let (host, port) = config.bind_address();
    info!(
        "Workplace available at: http://{}:{}{}",
        host, port, config.admin.path
    );
    if !config.is_localhost_only() {
        log::warn!("Workplace is reachable from other hosts and has no login of its own");
    }
    info!(
        "Operations: poll every {} ms, busy slot policy {:?}",
        config.operations.poll_interval_ms, config.operations.slot_policy
    );
    info!("Config file: {}", runtime_paths.config_file.display());
    info!(
        "Content directory (canonical): {}",
        runtime_paths.content_dir.display()
    );
    info!("Runtime root: {}", runtime_paths.root.display());

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {}", current_dir.display());
    }
}

enum RunMode {
    Server,
    Cli(Vec<String>),
    Help,
}

struct ParsedArgs {
    runtime_root: std::path::PathBuf,
    mode: RunMode,
}

fn parse_args() -> Result<ParsedArgs, String> {
    parse_args_from(std::env::args().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<ParsedArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    if args.iter().any(|arg| is_help_flag(arg)) {
        return Ok(ParsedArgs {
            runtime_root: std::path::PathBuf::from("."),
            mode: RunMode::Help,
        });
    }

    let mut args = args.into_iter();
    let mut runtime_root = std::path::PathBuf::from(".");
    let mut cli_tokens = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--" {
            continue;
        } else if arg == "-C" {
            let value = args
                .next()
                .ok_or_else(|| "Missing value for -C".to_string())?;
            runtime_root = std::path::PathBuf::from(value);
        } else {
            cli_tokens.push(arg);
        }
    }

    if cli_tokens.len() == 1 && cli_tokens[0].eq_ignore_ascii_case("help") {
        return Ok(ParsedArgs {
            runtime_root,
            mode: RunMode::Help,
        });
    }

    let runtime_root = make_runtime_root_absolute(runtime_root)?;
    let mode = if cli_tokens.is_empty() {
        RunMode::Server
    } else {
        RunMode::Cli(cli_tokens)
    };

    Ok(ParsedArgs { runtime_root, mode })
}

fn is_help_flag(arg: &str) -> bool {
    arg == "-h" || arg == "--help"
}

fn make_runtime_root_absolute(
    runtime_root: std::path::PathBuf,
) -> Result<std::path::PathBuf, String> {
    if runtime_root.is_absolute() {
        return Ok(runtime_root);
    }

    let current_dir = std::env::current_dir()
        .map_err(|error| format!("Failed to resolve current directory: {}", error))?;
    Ok(current_dir.join(runtime_root))
}
