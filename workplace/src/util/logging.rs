// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use env_logger::Logger;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

/// Targets whose records are re-leveled before reaching the inner logger.
pub fn default_level_rules() -> Vec<(String, Level, Level)> {
    vec![
        ("actix_server".to_string(), Level::Info, Level::Debug),
        ("mio".to_string(), Level::Debug, Level::Trace),
    ]
}

struct LevelModifierLogger {
    inner: Logger,
    rules: Vec<(String, Level, Level)>,
}

impl LevelModifierLogger {
    fn new(inner: Logger, rules: Vec<(String, Level, Level)>) -> Self {
        LevelModifierLogger { inner, rules }
    }

    fn get_new_level(&self, target: &str, original_level: Level) -> Level {
        for rule in &self.rules {
            if target.starts_with(&rule.0) && rule.1 == original_level {
                return rule.2;
            }
        }
        original_level
    }
}

impl Log for LevelModifierLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let new_level = self.get_new_level(metadata.target(), metadata.level());
        let new_metadata = Metadata::builder()
            .level(new_level)
            .target(metadata.target())
            .build();
        self.inner.enabled(&new_metadata)
    }

    fn log(&self, record: &Record) {
        let new_level = self.get_new_level(record.target(), record.level());
        let new_record = Record::builder()
            .level(new_level)
            .target(record.target())
            .args(*record.args())
            .module_path(record.module_path())
            .file(record.file())
            .line(record.line())
            .build();
        self.inner.log(&new_record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

/// env_logger backend with a stable line format.
pub fn build_logger(level: LevelFilter, target: env_logger::Target) -> Logger {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .target(target)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .build()
}

pub fn init_logger(
    rules: Vec<(String, Level, Level)>,
    logger: Logger,
) -> Result<(), SetLoggerError> {
    let custom_logger = LevelModifierLogger::new(logger, rules);
    log::set_boxed_logger(Box::new(custom_logger))?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}
