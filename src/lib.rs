pub mod config;
pub mod errors;
pub mod logging;
pub mod model;
pub mod restart;
pub mod service;
