//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, enums, errors)
//! - `consultation` - Templates, consultation sessions and the stage machine

pub mod consultation;
pub mod foundation;
