//! Command handlers for the `modkit` host.

pub mod commands;
