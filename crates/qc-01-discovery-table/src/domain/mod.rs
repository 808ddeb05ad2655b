//! Domain Layer - Pure business logic with no I/O
//!
//! This module contains:
//! - Node identifiers, derived distance keys and role tags
//! - Log-distance and XOR ordering over distance keys
//! - The bounded candidate ranking used by lookups
//! - IP diversity checks (Sybil resistance)
//! - Table configuration and error types

mod entities;
mod errors;
pub mod services;
mod value_objects;

pub use entities::*;
pub use errors::*;
pub use services::*;
pub use value_objects::*;
