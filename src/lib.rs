pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod output;
pub mod password;
pub mod patch;
pub mod resolve;
pub mod store;
pub mod update;
