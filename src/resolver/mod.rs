pub mod dedup;
pub mod links;
pub mod process;
pub mod thumbnail;
pub mod traits;

pub use dedup::{ActiveQuery, FetchOutcome, QueryDeduplicator, QueryGuard, StreamDetails};
pub use process::ProcessResolver;
pub use thumbnail::ThumbnailValidator;
pub use traits::{MetadataResolver, ResolveError, ResolvedMetadata};
