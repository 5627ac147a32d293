//! Per-provider request pacing (§5). Every upstream collaborator — fixture
//! history, odds — gets its own token-bucket-equivalent so fixture workers
//! share one quota per provider instead of each sleeping independently,
//! which would over-serialize the scan.
//!
//! Grounded in `other_examples/.../services-odds-ingestion-rust-src-main.rs.rs`,
//! which paces an odds-API client with `governor::{Quota, RateLimiter}`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::Mutex;

/// One token-bucket-equivalent limiter per provider id, built lazily the
/// first time a provider is seen. `request_delay` is the minimum spacing
/// between requests to a single provider (default 1.5s, §5/§6).
pub struct ProviderLimiters {
    request_delay: Duration,
    limiters: Mutex<HashMap<String, Arc<DefaultDirectRateLimiter>>>,
}

impl ProviderLimiters {
    pub fn new(request_delay: Duration) -> Self {
        Self {
            request_delay,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Block until the named provider's bucket admits one more request.
    pub async fn acquire(&self, provider: &str) {
        let limiter = {
            let mut limiters = self.limiters.lock().await;
            limiters
                .entry(provider.to_string())
                .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota())))
                .clone()
        };
        limiter.until_ready().await;
    }

    fn quota(&self) -> Quota {
        // governor quotas are specified as N per period; one request per
        // `request_delay` is exactly the inter-request spacing §5 asks for.
        Quota::with_period(self.request_delay)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn serializes_requests_to_the_same_provider() {
        let limiters = ProviderLimiters::new(Duration::from_millis(50));
        let start = Instant::now();
        limiters.acquire("api_football").await;
        limiters.acquire("api_football").await;
        limiters.acquire("api_football").await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn distinct_providers_do_not_share_a_bucket() {
        let limiters = ProviderLimiters::new(Duration::from_millis(200));
        let start = Instant::now();
        limiters.acquire("api_football").await;
        limiters.acquire("the_odds_api").await;
        assert!(start.elapsed() < Duration::from_millis(150));
    }
}
