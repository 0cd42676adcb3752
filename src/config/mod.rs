//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → overrides.rs (command-line values replace file values)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → overrides.rs re-applies the same overrides
//!     → validation.rs validates
//!     → server swaps the live TimeoutConfig
//! ```
//!
//! # Design Decisions
//! - Only timeout settings are hot-reloadable; the rest needs a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_config_with, parse_config, parse_config_with, ConfigError};
pub use overrides::ConfigOverrides;
pub use schema::{
    ListenerConfig, ObservabilityConfig, SecurityConfig, ServiceConfig, TimeoutConfig,
    UpstreamConfig,
};
pub use validation::ValidationError;
