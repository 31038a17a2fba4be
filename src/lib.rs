pub mod app;
pub mod browser;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod locator;
pub mod logging;
pub mod models;
pub mod navigator;
pub mod outcome;
pub mod parse;
pub mod session;
pub mod snapshot;
pub mod utils;
