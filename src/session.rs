// =============================================================================
// Session — asynchronously established market-data context
// =============================================================================
//
// `connect` spawns client construction plus one check request and returns at
// once with a `PendingSession`.  The caller can do other work (e.g. read the
// user's input) and later `wait` on it with a timeout.  The established
// `Session` is handed out behind an `Arc` and passed explicitly to whatever
// needs it.
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::market_data::{FugleClient, MarketDataSource, RequestBudget};
use crate::runtime_config::ScannerConfig;

/// Symbol used to check that the key and endpoint work.
pub const CHECK_SYMBOL: &str = "2330";

pub struct Session<S = FugleClient> {
    source: S,
    established_at: DateTime<Utc>,
}

impl<S> Session<S> {
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}

impl<S: MarketDataSource> Session<S> {
    /// Check `source` with one request and wrap it.  A failed check fails the session.
    pub async fn establish(source: S) -> Result<Self> {
        let started = Instant::now();
        let name = source
            .ticker_name(CHECK_SYMBOL)
            .await
            .with_context(|| format!("check request for {CHECK_SYMBOL} failed"))?;

        info!(
            check = CHECK_SYMBOL,
            name = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "market-data session established"
        );
        Ok(Self {
            source,
            established_at: Utc::now(),
        })
    }
}

/// A session still being set up in the background.
pub struct PendingSession<S = FugleClient> {
    rx: oneshot::Receiver<Result<Arc<Session<S>>>>,
}

impl<S: Send + Sync + 'static> PendingSession<S> {
    /// Run `setup` on the runtime and deliver its result through a one-shot
    /// channel.
    pub fn spawn<F>(setup: F) -> Self
    where
        F: Future<Output = Result<Session<S>>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = setup.await.map(Arc::new);
            if tx.send(result).is_err() {
                warn!("session ready but nobody is waiting for it");
            }
        });
        Self { rx }
    }

    /// Wait up to `timeout` for the session.
    pub async fn wait(self, timeout: Duration) -> Result<Arc<Session<S>>> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(anyhow!("session setup task ended without a result")),
            Err(_) => bail!("session not ready after {} ms", timeout.as_millis()),
        }
    }
}

/// Start building the Fugle-backed session described by `config`.
pub fn connect(config: &ScannerConfig) -> PendingSession<FugleClient> {
    let api_key = config.api_key.clone();
    let base_url = config.base_url.clone();
    let timeout = config.http_timeout();
    let budget = Arc::new(RequestBudget::new(config.requests_per_minute));

    PendingSession::spawn(async move {
        let client = FugleClient::new(&api_key, base_url, timeout, budget)?;
        Session::establish(client).await
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::source::fake::FakeSource;
    use crate::market_data::Quote;

    fn reachable_source() -> FakeSource {
        let mut src = FakeSource::default();
        src.quotes.insert(
            CHECK_SYMBOL.into(),
            Quote {
                symbol: CHECK_SYMBOL.into(),
                name: "台積電".into(),
                ..Default::default()
            },
        );
        src
    }

    #[tokio::test]
    async fn established_session_is_delivered() {
        let pending = PendingSession::spawn(Session::establish(reachable_source()));
        let session = pending.wait(Duration::from_secs(1)).await.unwrap();
        let name = session.source().ticker_name(CHECK_SYMBOL).await.unwrap();
        assert_eq!(name, "台積電");
        assert!(session.established_at() <= Utc::now());
    }

    #[tokio::test]
    async fn failed_check_fails_the_session() {
        let pending = PendingSession::spawn(Session::establish(FakeSource::default()));
        let err = pending.wait(Duration::from_secs(1)).await.err().unwrap();
        assert!(format!("{err:#}").contains("check request"));
    }

    #[tokio::test]
    async fn slow_setup_times_out() {
        let pending: PendingSession<FakeSource> = PendingSession::spawn(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Session::establish(reachable_source()).await
        });
        let err = pending.wait(Duration::from_millis(20)).await.err().unwrap();
        assert!(err.to_string().contains("not ready"));
    }

    #[tokio::test]
    async fn connect_without_key_fails_fast() {
        let config = ScannerConfig::default();
        let err = connect(&config).wait(Duration::from_secs(1)).await.err().unwrap();
        assert!(err.to_string().contains("API key is empty"));
    }
}
