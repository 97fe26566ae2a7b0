//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → handed to startup, which builds the balancing context
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; backend membership changes go through
//!   the management surface, not the file
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BalancerConfig, HealthCheckConfig, InitialHealth, ListenerConfig,
    ObservabilityConfig, TimeoutConfig,
};
pub use validation::{validate_backend_address, validate_config, AddressError, ValidationError};
