use std::sync::Arc;

use crate::models::OddsQuote;
use crate::providers::OddsProvider;

/// Locates the best available FH Over 0.5 price for a fixture (§4.3).
///
/// Providers are queried in configured priority order; the first usable
/// (>1.0) quote wins. Ties are broken by priority, not best price — the
/// purpose is a repeatable reference line, not arbitrage.
pub struct OddsResolver {
    providers: Vec<Arc<dyn OddsProvider>>,
}

impl OddsResolver {
    pub fn new(providers: Vec<Arc<dyn OddsProvider>>) -> Self {
        Self { providers }
    }

    /// `Ok(None)` is `NO_MARKET` (§7) — not an error, just an absent price.
    /// A provider transport error is swallowed and logged; resolution moves
    /// on to the next provider in priority order rather than failing the
    /// whole fixture, since odds absence never blocks projection.
    pub async fn resolve(&self, fixture_id: &str) -> Option<OddsQuote> {
        for provider in &self.providers {
            match provider.fh_over_05(fixture_id).await {
                Ok(Some(quote)) if quote.price > 1.0 => return Some(quote),
                Ok(Some(quote)) => {
                    tracing::debug!(
                        "discarding non-viable quote {} from {} for fixture {fixture_id}",
                        quote.price,
                        provider.provider_id()
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "odds provider {} failed for fixture {fixture_id}: {e}",
                        provider.provider_id()
                    );
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockOddsProvider;

    #[tokio::test]
    async fn returns_first_priority_providers_quote() {
        let a = Arc::new(MockOddsProvider::new("pinnacle").with_quote("f1", 1.8));
        let b = Arc::new(MockOddsProvider::new("betfair").with_quote("f1", 2.2));
        let resolver = OddsResolver::new(vec![a, b]);

        let quote = resolver.resolve("f1").await.unwrap();
        assert_eq!(quote.provider_id, "pinnacle");
        assert_eq!(quote.price, 1.8);
    }

    #[tokio::test]
    async fn falls_through_to_next_provider_when_first_has_no_market() {
        let a = Arc::new(MockOddsProvider::new("pinnacle"));
        let b = Arc::new(MockOddsProvider::new("betfair").with_quote("f1", 2.2));
        let resolver = OddsResolver::new(vec![a, b]);

        let quote = resolver.resolve("f1").await.unwrap();
        assert_eq!(quote.provider_id, "betfair");
    }

    #[tokio::test]
    async fn no_market_when_nobody_has_a_price() {
        let a = Arc::new(MockOddsProvider::new("pinnacle"));
        let resolver = OddsResolver::new(vec![a]);
        assert!(resolver.resolve("f1").await.is_none());
    }
}
