//! Request and configuration models.

pub mod config;
pub mod edit;
