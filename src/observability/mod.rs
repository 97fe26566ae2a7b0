//! Observability subsystem.
//!
//! All subsystems emit structured `tracing` events; `logging.rs` installs the
//! subscriber. Each inbound request carries an `x-request-id` that appears in
//! dispatch logs and is propagated to the backend and back to the client.

pub mod logging;
