pub mod admin;
pub mod config;
pub mod errors;
pub mod globals;
pub mod logger;
pub mod utils;
