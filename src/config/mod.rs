pub mod admin;
mod config;
mod help;

pub use config::*;
pub use help::*;
