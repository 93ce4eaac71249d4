pub mod aggregator;
pub mod config;
pub mod filters;
pub mod generator;
pub mod metadata;
pub mod scoring;
pub mod selection;


pub use aggregator::*;
pub use config::*;
pub use generator::*;
pub use metadata::*;
