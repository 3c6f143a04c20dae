use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::client::SearchBackend;
use crate::error::AggregateError;
use crate::types::{Category, WikiResult, normalize_base_query};

pub const DEFAULT_CATEGORY_CONCURRENCY: usize = 3;

/// Fixed strings placed into rendered category text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub source_label: String,
    pub no_results: String,
    pub failure: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            source_label: "Source".to_string(),
            no_results: "No results found.".to_string(),
            failure: "This category could not be loaded.".to_string(),
        }
    }
}

/// Render results as blocks separated by a blank line, in the given order.
#[must_use]
pub fn render_results(results: &[WikiResult], options: &RenderOptions) -> String {
    if results.is_empty() {
        return options.no_results.clone();
    }

    results
        .iter()
        .map(|result| {
            format!(
                "# {}\n{}\n{}\n{}: {}",
                result.title,
                result.snippet,
                result.extract,
                options.source_label,
                result.source_url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Runs one search per [`Category`] and renders each into text.
pub struct ContentAggregator {
    backend: Arc<dyn SearchBackend>,
    concurrency: usize,
    render: RenderOptions,
}

impl ContentAggregator {
    #[must_use]
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            concurrency: DEFAULT_CATEGORY_CONCURRENCY,
            render: RenderOptions::default(),
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    /// One rendered entry per category. A failed category search renders
    /// [`RenderOptions::failure`] for that category only.
    ///
    /// # Errors
    /// Returns [`AggregateError::Cancelled`] if `cancel` fires first; in-flight
    /// searches are dropped.
    pub async fn aggregate(
        &self,
        base_query: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<Category, String>, AggregateError> {
        let base = normalize_base_query(base_query);
        info!("Aggregating wiki content for {base:?}");

        let searches = stream::iter(Category::ALL)
            .map(|category| async move {
                let query = category.query_for(base);
                let text = match self.backend.search(&query).await {
                    Ok(results) => {
                        debug!("{category}: {} results", results.len());
                        render_results(&results, &self.render)
                    }
                    Err(error) => {
                        warn!("{category} search failed: {error}");
                        self.render.failure.clone()
                    }
                };
                (category, text)
            })
            .buffered(self.concurrency)
            .collect::<BTreeMap<_, _>>();

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Wiki aggregation cancelled");
                Err(AggregateError::Cancelled)
            }
            entries = searches => Ok(entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::{ContentAggregator, RenderOptions, render_results};
    use crate::client::SearchBackend;
    use crate::error::{AggregateError, WikiError};
    use crate::types::{Category, WikiResult};

    fn result(title: &str) -> WikiResult {
        WikiResult {
            title: title.to_string(),
            snippet: format!("{title} snippet"),
            extract: format!("{title} extract"),
            source_url: format!("https://wiki.test/{title}"),
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn search(&self, query: &str) -> Result<Vec<WikiResult>, WikiError> {
            self.queries
                .lock()
                .expect("query log should not be poisoned")
                .push(query.to_string());

            if query.ends_with("Ship Boat") {
                return Err(WikiError::Api {
                    code: "internal".to_string(),
                    info: "boom".to_string(),
                });
            }
            if query.ends_with("Gamepass") {
                return Ok(Vec::new());
            }
            Ok(vec![result("First"), result("Second")])
        }
    }

    #[derive(Default)]
    struct CountingBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchBackend for CountingBackend {
        async fn search(&self, _query: &str) -> Result<Vec<WikiResult>, WikiError> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct StallingBackend;

    #[async_trait]
    impl SearchBackend for StallingBackend {
        async fn search(&self, _query: &str) -> Result<Vec<WikiResult>, WikiError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn renders_blocks_in_order_with_blank_line() {
        let text = render_results(
            &[result("A"), result("B")],
            &RenderOptions {
                source_label: "Fonte".to_string(),
                ..RenderOptions::default()
            },
        );
        assert_eq!(
            text,
            "# A\nA snippet\nA extract\nFonte: https://wiki.test/A\n\n\
             # B\nB snippet\nB extract\nFonte: https://wiki.test/B"
        );
    }

    #[test]
    fn empty_results_render_no_results_text() {
        let options = RenderOptions::default();
        assert_eq!(render_results(&[], &options), options.no_results);
    }

    #[tokio::test]
    async fn one_failing_category_does_not_affect_others() {
        let backend = Arc::new(FakeBackend::default());
        let render = RenderOptions::default();
        let aggregated = ContentAggregator::new(backend.clone())
            .with_render_options(render.clone())
            .aggregate("Kraken", &CancellationToken::new())
            .await
            .expect("aggregation should complete");

        assert_eq!(
            aggregated.keys().copied().collect::<Vec<_>>(),
            Category::ALL.to_vec()
        );
        assert_eq!(aggregated[&Category::Ship], render.failure);
        assert_eq!(aggregated[&Category::Gamepass], render.no_results);
        assert!(aggregated[&Category::Boss].starts_with("# First"));
        assert!(aggregated[&Category::TradeValue].contains("# Second"));

        let queries = backend
            .queries
            .lock()
            .expect("query log should not be poisoned")
            .clone();
        assert_eq!(queries.len(), 6);
        assert!(queries.contains(&"Kraken Merchant NPC".to_string()));
    }

    #[tokio::test]
    async fn blank_query_searches_default_base() {
        let backend = Arc::new(FakeBackend::default());
        ContentAggregator::new(backend.clone())
            .with_concurrency(1)
            .aggregate("  ", &CancellationToken::new())
            .await
            .expect("aggregation should complete");

        let queries = backend
            .queries
            .lock()
            .expect("query log should not be poisoned")
            .clone();
        assert_eq!(queries.first().map(String::as_str), Some("Grand Piece Online Boss"));
    }

    #[tokio::test]
    async fn concurrent_searches_never_exceed_limit() {
        for limit in [1, 2, 4] {
            let backend = Arc::new(CountingBackend::default());
            ContentAggregator::new(backend.clone())
                .with_concurrency(limit)
                .aggregate("Kraken", &CancellationToken::new())
                .await
                .expect("aggregation should complete");

            assert_eq!(backend.calls.load(Ordering::SeqCst), Category::ALL.len());
            assert_eq!(backend.peak.load(Ordering::SeqCst), limit);
        }
    }

    #[tokio::test]
    async fn cancellation_stops_in_flight_searches() {
        let cancel = CancellationToken::new();
        let aggregator = ContentAggregator::new(Arc::new(StallingBackend));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            aggregator.aggregate("Kraken", &cancel),
        )
        .await
        .expect("cancellation should finish promptly");
        assert_eq!(outcome, Err(AggregateError::Cancelled));
    }
}
