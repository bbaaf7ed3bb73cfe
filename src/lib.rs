pub mod aggregate;
pub mod canvas;
pub mod config;
pub mod report;
