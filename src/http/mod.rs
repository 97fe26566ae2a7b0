//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → dispatch.rs (select live backend, forward GET)
//!     → request.rs (target URI rewrite)
//!     → response.rs (relay status and content type)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::Dispatcher;
pub use request::X_REQUEST_ID;
pub use response::X_SERVED_BY;
pub use server::HttpServer;
