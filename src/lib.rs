pub mod completion;
pub mod config;
pub mod core;
pub mod env_file;
pub mod error;
pub mod prompt;
pub mod provision;
pub mod service;
pub mod system;
pub mod ui;
pub mod utils;
