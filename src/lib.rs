pub mod collectors;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod github;
pub mod logging;
pub mod manifest;
