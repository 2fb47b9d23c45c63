/*!
 * Charon - RPC gateway to legacy VistA sites
 *
 * Turns typed application requests into named remote procedure calls, runs
 * them against one or more sites in parallel, and folds the per-site results
 * back into one typed response:
 * - Authenticated, stateful sessions per site (login, call, logout)
 * - Failure isolation: one bad site never spoils the others
 * - Type-safe procedure models paired at compile time
 * - TOML configuration of sites and timeouts
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod service;

// Re-export commonly used types
pub use config::{GatewayConfig, LogConfig, LogLevel};
pub use error::{GatewayError, Result};
pub use registry::TargetRegistry;
pub use service::Gateway;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
