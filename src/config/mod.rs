// src/config/mod.rs
pub mod ai;
pub mod curation;

pub use ai::AiConfig;
pub use curation::CurationConfig;
