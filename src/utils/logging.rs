use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

pub const TIMING_TARGET: &str = "bot.timing";

/// Keeps the non-blocking writers flushing; hold until shutdown.
pub struct LoggingGuards {
    _file_guard: WorkerGuard,
    _json_file_guard: WorkerGuard,
    _timing_guard: WorkerGuard,
}

pub fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

fn general_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(TIMING_TARGET, LevelFilter::OFF)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN)
}

fn timing_filter() -> Targets {
    Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO)
}

pub fn init_logging(level: &str, logs_dir: &Path) -> LoggingGuards {
    if let Err(err) = fs::create_dir_all(logs_dir) {
        eprintln!("Failed to create logs directory: {err}");
    }

    let file_appender = tracing_appender::rolling::daily(logs_dir, "bot.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let json_file_appender = tracing_appender::rolling::daily(logs_dir, "bot.jsonl");
    let (json_file_writer, json_file_guard) = tracing_appender::non_blocking(json_file_appender);

    let timing_appender = tracing_appender::rolling::daily(logs_dir, "timing.log");
    let (timing_writer, timing_guard) = tracing_appender::non_blocking(timing_appender);

    let general = general_filter(parse_log_level(level));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(general.clone());
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(general.clone());
    let json_file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(json_file_writer)
        .with_filter(general);
    let timing_layer = tracing_subscriber::fmt::layer()
        .with_writer(timing_writer)
        .with_ansi(false)
        .with_filter(timing_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .with(json_file_layer)
        .with(timing_layer)
        .init();

    LoggingGuards {
        _file_guard: file_guard,
        _json_file_guard: json_file_guard,
        _timing_guard: timing_guard,
    }
}
