pub mod db;
pub mod decode;
pub mod draft;
pub mod error;
pub mod generator;
pub mod insights;
pub mod interview;
pub mod known_items;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod reconcile;
pub mod schema;
pub mod service;

pub use error::{Error, Result};
