pub mod catalog;
pub mod config;
pub mod discovery;
pub mod filters;
pub mod generator;
pub mod history;
pub mod metadata;
pub mod pools;
pub mod scoring;
pub mod selection;
pub mod stages;
pub mod utils;

#[cfg(test)]
mod config_tests;

pub use catalog::*;
pub use config::*;
pub use generator::*;
pub use history::*;
pub use metadata::*;
