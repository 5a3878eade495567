pub mod cache;
pub mod catalog;
pub mod collector;
pub mod config;
pub mod document;
pub mod error;
pub mod loader;
pub mod model;
pub mod pagination;
pub mod parsers;
pub mod render;
pub mod store;
pub mod window;
