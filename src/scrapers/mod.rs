pub mod kleinanzeigen;
pub mod traits;
pub mod types;

pub use kleinanzeigen::KleinanzeigenClient;
pub use traits::PageFetcher;
pub use types::{CrawlOptions, Radius, SearchQuery};
