#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod client;
pub mod config;
pub mod data;
pub mod gallery;
pub mod links;
pub mod logging;
pub mod notify;
pub mod overlay;
pub mod storage;
pub mod sync;
pub mod ui;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
