//! Sessions and Accounts
//!
//! Collaborator interfaces (account store, session store, notification hook)
//! and the reconciliation engine built on them.

pub mod account;
pub mod notify;
pub mod reconcile;
pub mod store;

pub use account::*;
pub use notify::*;
pub use reconcile::*;
pub use store::*;
