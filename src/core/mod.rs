//! Core Components
//!
//! HTTP transport, time source and state verification.

pub mod clock;
pub mod state;
pub mod transport;

pub use clock::*;
pub use state::*;
pub use transport::*;
