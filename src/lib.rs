pub mod analyzer;
pub mod app;
pub mod audio;
pub mod config;
pub mod engine;
pub mod field;
pub mod front;
pub mod raster;
pub mod render;
pub mod rhythm;
pub mod scrub;
pub mod shade;
pub mod spring;
pub mod terminal;
pub mod tuning;
