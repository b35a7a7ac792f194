//! Инициализация логирования
//!
//! Библиотека пишет через фасад `log`; приложение вызывает
//! [`init_logger`] один раз при старте.

use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Фильтр по умолчанию, если `RUST_LOG` не задан
pub const DEFAULT_FILTER: &str = "warn,clip_sync=info";

fn builder() -> Builder {
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);
    let mut builder = Builder::from_env(env);

    // Шумные зависимости HTTP-клиента
    builder
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("tokio_util", LevelFilter::Error)
        .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
        .target(env_logger::Target::Stderr);
    builder
}

/// Инициализировать `env_logger`. Повторный вызов ничего не делает.
pub fn init_logger() {
    if builder().try_init().is_err() {
        log::debug!("Logger is already initialized");
    }
}
