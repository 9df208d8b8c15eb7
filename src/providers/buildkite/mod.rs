mod client;
pub mod decoder;
mod fetcher;
mod slug;
pub mod types;

pub use client::BuildkiteClient;
pub use fetcher::{ApiSource, BuildFetcher, BuildkiteFetcher};
pub use slug::BuildSlug;
