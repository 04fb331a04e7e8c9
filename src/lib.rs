// ABOUTME: Root library module for the enginectl binary
// ABOUTME: Exposes the CLI definition, subcommand handlers and logging setup

pub mod cli;
pub mod commands;
pub mod logging;
