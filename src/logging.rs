// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tracing subscriber setup for binaries embedding the engine.
//!
//! The engine itself only emits `tracing` events. Operators that do not install
//! their own subscriber can call [`init_tracing`] once at startup.

use crate::constants::ENV_LOG_FORMAT;
use tracing::debug;

/// Output format of the installed subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable lines with ANSI colours
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse a `RUST_LOG_FORMAT` value; anything but `json` is text.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// Format selected by `RUST_LOG_FORMAT`, text when unset.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(ENV_LOG_FORMAT)
            .map(|v| Self::parse(&v))
            .unwrap_or(Self::Text)
    }
}

/// Install the global `tracing` subscriber.
///
/// Format: timestamp file:line LEVEL message
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
/// Calling it when a subscriber is already installed is a no-op.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let installed = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_target(false)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_target(false)
            .with_ansi(true)
            .compact()
            .try_init(),
    };

    if installed.is_ok() {
        debug!("Logging initialized with file and line number tracking");
    }
}
