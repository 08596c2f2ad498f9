//! External Authentication Types
//!
//! Core type definitions shared by the redirect, exchange and session stages.

pub mod callback;
pub mod config;
pub mod identity;
pub mod provider;
pub mod session;
pub mod token;
pub mod user;

pub use callback::*;
pub use config::*;
pub use identity::*;
pub use provider::*;
pub use session::*;
pub use token::*;
pub use user::*;
