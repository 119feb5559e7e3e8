//! CLI module for the verithrax-thumbnail library
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, CanvasArgs, Cli, Command, ComposeArgs, MaskArgs, RescaleArgs, RunArgs};
