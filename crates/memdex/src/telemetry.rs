// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing setup for hosts that don't install their own subscriber.

use tracing_subscriber::EnvFilter;

/// Default filter directive for `log_level`, used when `RUST_LOG` is unset.
pub fn default_directive(log_level: &str) -> String {
    format!("memdex={log_level},memdex_memory={log_level},memdex_storage={log_level},warn")
}

/// Install a fmt subscriber filtered by `RUST_LOG`, or by `log_level` for
/// the memdex crates when `RUST_LOG` is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(log_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_covers_every_crate() {
        let directive = default_directive("debug");
        assert!(directive.contains("memdex=debug"));
        assert!(directive.contains("memdex_storage=debug"));
        assert!(directive.ends_with(",warn"));
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}
