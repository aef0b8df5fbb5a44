pub mod cli;
pub mod client;
pub mod commands;
