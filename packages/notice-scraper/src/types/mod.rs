//! Data types shared across the scraper.

pub mod category;
pub mod config;
pub mod record;
pub mod result;
