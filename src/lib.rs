//! SLA Consultant - template-guided consultation service.
//!
//! Guides a user through a consultation template one stage at a time,
//! generating replies with a language model and deciding after every turn
//! whether the current stage has gathered enough to move on.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
