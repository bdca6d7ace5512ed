//! Gallery backend for the Found Fonts Foundry: read-only, cached,
//! paginated consumption of an Are.na channel, with the pagination
//! coordinator the rendering layer drives.

pub mod cache;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod layout;
pub mod models;
pub mod proxy;
pub mod utils;

// Re-export the pieces embedders wire together.
pub use cache::{CacheStats, ResponseCache};
pub use client::{ArenaClient, CacheStatus, ContentFetcher, FetchClient, FetchOutcome};
pub use config::Config;
pub use coordinator::{
    GalleryCoordinator, GallerySnapshot, LoadOutcome, NavigationMode, Phase,
};
pub use error::{GalleryError, Result};
pub use models::{ChannelMetadata, ContentItem, ContentPage};
