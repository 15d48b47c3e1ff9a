pub mod config;
pub mod diff;
pub mod error;
pub mod logging;
pub mod model;
pub mod poll;
pub mod report;
pub mod source;
pub mod watch_api;
