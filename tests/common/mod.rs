#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use problem_fetch::{
    FailureNotifier, FetchConfig, MemoryCache, RequestIdentity, RequestIdentityProvider,
    Resolver, ResultCache, RetryFetcher,
};
use url::Url;
use wiremock::MockServer;

pub const PAGE: &str = include_str!("../fixtures/problem_1000.html");
pub const TEST_AGENT: &str = "problem-fetch-tests/1.0";

/// Fixed identity that remembers every delay it handed out.
pub struct RecordingIdentity {
    delay: Duration,
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingIdentity {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            delays: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> usize {
        self.delays.lock().unwrap().len()
    }
}

impl RequestIdentityProvider for RecordingIdentity {
    fn next_identity(&self) -> RequestIdentity {
        self.delays.lock().unwrap().push(self.delay);
        RequestIdentity {
            user_agent: TEST_AGENT.to_string(),
            delay: self.delay,
        }
    }
}

#[derive(Default)]
pub struct CapturingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl FailureNotifier for CapturingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub struct Harness {
    pub resolver: Resolver,
    pub cache: Arc<MemoryCache>,
    pub identity: Arc<RecordingIdentity>,
    pub notifier: Arc<CapturingNotifier>,
}

pub fn fetch_config(server: &MockServer) -> FetchConfig {
    origin_config(&server.uri())
}

pub fn origin_config(origin: &str) -> FetchConfig {
    let mut config = FetchConfig::new(Url::parse(origin).unwrap());
    config.cooldown = Duration::ZERO;
    config.timeout = Duration::from_secs(5);
    config
}

pub fn fetcher(
    server: &MockServer,
    identity: Arc<RecordingIdentity>,
    notifier: Arc<CapturingNotifier>,
) -> RetryFetcher {
    RetryFetcher::new(fetch_config(server))
        .unwrap()
        .with_identity(identity)
        .with_notifier(notifier)
}

pub fn harness(server: &MockServer) -> Harness {
    harness_with_delay(server, Duration::from_millis(1))
}

pub fn harness_with_delay(server: &MockServer, delay: Duration) -> Harness {
    harness_with_config(fetch_config(server), delay)
}

pub fn harness_with_config(config: FetchConfig, delay: Duration) -> Harness {
    let identity = Arc::new(RecordingIdentity::new(delay));
    let notifier = Arc::new(CapturingNotifier::default());
    let cache = Arc::new(MemoryCache::new());
    let shared: Arc<dyn ResultCache> = cache.clone();
    let fetcher = RetryFetcher::new(config)
        .unwrap()
        .with_identity(identity.clone())
        .with_notifier(notifier.clone());
    let resolver = Resolver::new(fetcher, shared);
    Harness {
        resolver,
        cache,
        identity,
        notifier,
    }
}
