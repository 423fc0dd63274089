pub mod client;
pub mod error;
pub mod mode;

pub use client::{CatalogClient, parse_tracks};
pub use error::CatalogError;
pub use mode::RecommendationMode;
