//! Main application orchestration.

use crate::config::{AppConfig, BrokerBackend};
use crate::error::AppResult;
use crate::quote::QuoteClient;
use crate::symbols::StoreSymbols;
use preorder_core::{AggregatedPrice, PriceHandler};
use preorder_executor::{
    spawn_keepalive, OrderEvaluator, PaperSessionFactory, SessionFactory, SessionGuard,
};
use preorder_feed::{FeedError, PriceAggregator, TradeIngest};
use preorder_persistence::{JsonFileStore, PreorderStore};
use preorder_ws::{ConnectionManager, FeedMessage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long shutdown waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Capacity of the WebSocket to ingest channel.
const MESSAGE_CHANNEL_CAPACITY: usize = 1000;

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<dyn PreorderStore>,
    factory: Arc<dyn SessionFactory>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create the application with the file store and configured broker backend.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store: Arc<dyn PreorderStore> = Arc::new(JsonFileStore::new(&config.store.path));
        let factory: Arc<dyn SessionFactory> = match config.broker.backend {
            BrokerBackend::Paper => {
                Arc::new(PaperSessionFactory::new(config.broker.paper.clone()))
            }
        };
        Ok(Self::with_components(config, store, factory))
    }

    /// Create the application around an existing store and session factory.
    pub fn with_components(
        config: AppConfig,
        store: Arc<dyn PreorderStore>,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            config,
            store,
            factory,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the application when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(?e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Ctrl-C received, shutting down");
        })
        .await
    }

    /// Run until `stop` completes or the shutdown token is cancelled.
    pub async fn run_until(self, stop: impl Future<Output = ()>) -> AppResult<()> {
        info!("Starting application");

        let aggregator_config = self.config.aggregator_config();
        aggregator_config.validate()?;

        self.check_store()?;

        let guard = Arc::new(
            SessionGuard::connect(
                self.factory.clone(),
                self.config.broker.credentials(),
                self.config.broker.call_timeout(),
            )
            .await?,
        );

        let keepalive = spawn_keepalive(
            guard.clone(),
            self.config.broker.keepalive_config(),
            self.shutdown.clone(),
        );

        let evaluator = Arc::new(OrderEvaluator::new(
            self.store.clone(),
            guard,
            self.config.broker.evaluator_config(),
        ));

        self.bootstrap_quotes(evaluator.as_ref()).await;

        let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();
        tasks.push(("refresh", keepalive.refresh));
        tasks.push(("recreate", keepalive.recreate));

        // Ingest -> aggregator
        let capacity = self.config.feed.channel_capacity;
        let (contribution_tx, contribution_rx) = mpsc::channel(capacity);
        let aggregator = PriceAggregator::new(
            contribution_rx,
            evaluator,
            aggregator_config,
            self.shutdown.clone(),
        );
        tasks.push(("aggregator", tokio::spawn(aggregator.run())));

        if self.config.telemetry.metrics_port != 0 {
            let port = self.config.telemetry.metrics_port;
            let token = self.shutdown.clone();
            tasks.push((
                "metrics",
                tokio::spawn(async move {
                    if let Err(e) = preorder_telemetry::serve_metrics(port, token).await {
                        error!(error = %e, "Metrics server failed");
                    }
                }),
            ));
        }

        // Market data
        let (message_tx, mut message_rx) = mpsc::channel::<FeedMessage>(MESSAGE_CHANNEL_CAPACITY);
        let connection = ConnectionManager::new(
            self.config.feed.connection_config(),
            Arc::new(StoreSymbols::new(self.store.clone())),
            message_tx,
        )
        .with_shutdown_token(self.shutdown.clone());
        tasks.push((
            "feed",
            tokio::spawn(async move {
                if let Err(e) = connection.connect().await {
                    error!(error = %e, "Market data connection failed");
                }
            }),
        ));

        let ingest = TradeIngest::new(contribution_tx, self.config.feed.enqueue_timeout());

        info!("Entering main event loop");
        tokio::pin!(stop);
        loop {
            tokio::select! {
                () = &mut stop => break,
                () = self.shutdown.cancelled() => break,
                msg = message_rx.recv() => {
                    let Some(msg) = msg else {
                        warn!("Market data stream ended");
                        break;
                    };
                    match ingest.handle(&msg).await {
                        Ok(_) => {}
                        Err(FeedError::ChannelClosed) => {
                            error!("Price aggregator stopped");
                            break;
                        }
                        Err(e) => warn!(error = %e, "Ingest error"),
                    }
                }
            }
        }

        info!("Shutting down");
        self.shutdown.cancel();
        drop(ingest);

        for (name, handle) in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(task = name, error = %e, "Task ended abnormally"),
                Err(_) => warn!(task = name, "Task did not stop in time"),
            }
        }

        info!("Application stopped");
        Ok(())
    }

    /// Load and immediately re-save the store so an unreadable or unwritable
    /// path fails at startup.
    fn check_store(&self) -> AppResult<()> {
        let book = self.store.load()?;
        self.store.save(&book)?;
        info!(
            preorders = book.preorders.len(),
            pending = book.pending_count(),
            symbols = ?book.symbols(),
            "Preorder store ready"
        );
        Ok(())
    }

    /// Evaluate every symbol once against the latest REST quote.
    async fn bootstrap_quotes(&self, evaluator: &OrderEvaluator) {
        let feed = &self.config.feed;
        if feed.quote_url.is_empty() {
            return;
        }

        let client = match QuoteClient::new(&feed.quote_url, &feed.token) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Quote bootstrap disabled");
                return;
            }
        };

        let symbols = match self.store.load() {
            Ok(book) => book.symbols(),
            Err(e) => {
                warn!(error = %e, "Quote bootstrap skipped");
                return;
            }
        };

        for symbol in symbols {
            match client.latest_price(&symbol).await {
                Ok(Some(price)) => {
                    info!(symbol = %symbol, price = %price, "Bootstrap quote");
                    evaluator.on_price(AggregatedPrice::new(symbol, price)).await;
                }
                Ok(None) => warn!(symbol = %symbol, "No bootstrap quote"),
                Err(e) => warn!(error = %e, "Bootstrap quote failed"),
            }
        }
    }
}
