pub mod api;
pub mod cache;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod resolver;

pub use cache::{cache_key, CacheError, FileCache, MemoryCache, ResultCache};
pub use extract::{extract_document, ParseError};
pub use fetch::{
    FailureNotifier, FetchConfig, FetchError, FetchFailure, FixedIdentity, RequestIdentity,
    RequestIdentityProvider, RetryFetcher, RotatingIdentity,
};
pub use models::ExtractedDocument;
pub use resolver::{ResolveError, Resolver};
