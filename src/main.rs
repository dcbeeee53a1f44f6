use std::sync::Arc;

use problem_fetch::{
    api, config::Config, FileCache, MemoryCache, Resolver, ResultCache, RetryFetcher,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let cache: Arc<dyn ResultCache> = match &config.cache_path {
        Some(path) => {
            tracing::info!("using cache file {}", path.display());
            Arc::new(FileCache::open(path).await?)
        }
        None => Arc::new(MemoryCache::new()),
    };
    let fetcher = RetryFetcher::new(config.fetch.clone())?;
    let resolver = Arc::new(Resolver::new(fetcher, cache));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, api::router(resolver)).await?;
    Ok(())
}
