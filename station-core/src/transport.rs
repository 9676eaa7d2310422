use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{model::CorrelationId, parser::HttpOutcome};

/// Non-blocking request submission. The outcome is delivered later, tagged
/// with the same `context`.
pub trait Transport {
    fn send_get(&self, uri: Url, context: CorrelationId);
}

/// A response (or failure) bound to the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub outcome: HttpOutcome,
    pub context: CorrelationId,
}

#[async_trait]
pub trait HttpFetch: Send + Sync + Debug {
    async fn get(&self, uri: &Url) -> HttpOutcome;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    http: Client,
}

impl ReqwestFetch {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl Default for ReqwestFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, uri: &Url) -> HttpOutcome {
        let res = match self.http.get(uri.clone()).send().await {
            Ok(res) => res,
            Err(e) => {
                return HttpOutcome::Failure {
                    cause: e.to_string(),
                };
            }
        };

        let status = res.status().as_u16();
        match res.text().await {
            Ok(body) => HttpOutcome::Response { status, body },
            Err(e) => HttpOutcome::Failure {
                cause: format!("failed to read response body: {e}"),
            },
        }
    }
}

/// Runs every GET on its own tokio task and sends the result back over a channel.
#[derive(Debug)]
pub struct SpawningTransport<F> {
    fetch: Arc<F>,
    deliveries: mpsc::UnboundedSender<Delivery>,
}

impl<F> SpawningTransport<F> {
    pub fn new(fetch: Arc<F>, deliveries: mpsc::UnboundedSender<Delivery>) -> Self {
        Self { fetch, deliveries }
    }
}

impl<F: HttpFetch + 'static> Transport for SpawningTransport<F> {
    fn send_get(&self, uri: Url, context: CorrelationId) {
        let fetch = Arc::clone(&self.fetch);
        let deliveries = self.deliveries.clone();

        tokio::spawn(async move {
            let outcome = fetch.get(&uri).await;
            trace!(location = %context, "request completed");
            if deliveries.send(Delivery { outcome, context }).is_err() {
                debug!("plugin runtime has stopped; discarding response");
            }
        });
    }
}
