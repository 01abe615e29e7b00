//! Per-instrument workers
//!
//! ```text
//!   bars ─────────┐                        ┌─► worker AAPL ─► StrategyEngine
//!                 ├─► EngineHandle ─ mpsc ─┤
//!   BrokerEvent ──┘   (OrderRoutes)        └─► worker MSFT ─► StrategyEngine
//! ```
//!
//! Each instrument gets its own tokio task owning a [`StrategyEngine`] and
//! the bar series of that instrument. Messages of one instrument are
//! processed in order; instruments run independently. Broker events find
//! their worker through the order routes every engine writes to.

use log::{debug, info, warn};
use meridian_core::{CandleItem, CandleSeries, InstrumentId, Timestamp, Tradestrategy};
use meridian_gateway::{BrokerEvent, BrokerGateway};
use meridian_ports::TradestrategyStore;
use meridian_strategy::RuleContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::engine::{OrderRoutes, Strategies, StrategyEngine};
use crate::error::{Result, RunnerError};
use crate::fault::RuleFault;

enum WorkerMessage {
    Add {
        tradestrategy: Box<Tradestrategy>,
        reply: oneshot::Sender<Result<()>>,
    },
    Bar {
        bar_size_minutes: u32,
        bar: CandleItem,
    },
    Event(BrokerEvent),
    Cancel {
        tradestrategy_id: String,
        now: Timestamp,
    },
    CancelAll(Timestamp),
    Reload {
        ctx: RuleContext,
        strategies: Strategies,
    },
    Flush(oneshot::Sender<()>),
}

struct Worker {
    tx: mpsc::Sender<WorkerMessage>,
    task: JoinHandle<()>,
}

/// Messages of one instrument's worker task
async fn run_worker(
    instrument: InstrumentId,
    mut engine: StrategyEngine,
    mut rx: mpsc::Receiver<WorkerMessage>,
) {
    info!("[Worker {}] started", instrument);
    let mut series: HashMap<u32, CandleSeries> = HashMap::new();

    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::Add {
                tradestrategy,
                reply,
            } => {
                let result = engine.add_tradestrategy(*tradestrategy).await;
                if reply.send(result).is_err() {
                    debug!("[Worker {}] add reply dropped", instrument);
                }
            }
            WorkerMessage::Bar {
                bar_size_minutes,
                bar,
            } => {
                let series = series
                    .entry(bar_size_minutes)
                    .or_insert_with(|| CandleSeries::new(instrument.clone(), bar_size_minutes));
                match series.push(bar) {
                    Ok(is_new_bar) => engine.on_bar(series, is_new_bar).await,
                    Err(e) => warn!("[Worker {}] bar dropped: {}", instrument, e),
                }
            }
            WorkerMessage::Event(event) => engine.on_order_event(&event).await,
            WorkerMessage::Cancel {
                tradestrategy_id,
                now,
            } => {
                if let Err(e) = engine.cancel(&tradestrategy_id, now).await {
                    warn!("[Worker {}] {}", instrument, e);
                }
            }
            WorkerMessage::CancelAll(now) => engine.cancel_all(now).await,
            WorkerMessage::Reload { ctx, strategies } => engine.reload(ctx, strategies),
            WorkerMessage::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }
    info!(
        "[Worker {}] stopped, {} rule(s) still active",
        instrument,
        engine.active_count()
    );
}

/// Front door of a running engine: one worker task per instrument
pub struct EngineHandle {
    ctx: RuleContext,
    strategies: Strategies,
    gateway: Arc<dyn BrokerGateway>,
    store: Arc<dyn TradestrategyStore>,
    faults: mpsc::UnboundedSender<RuleFault>,
    routes: OrderRoutes,
    capacity: usize,
    workers: HashMap<InstrumentId, Worker>,
    owners: HashMap<String, InstrumentId>,
}

impl EngineHandle {
    /// A handle with no workers yet, and the receiving end of its fault channel
    pub fn new(
        ctx: RuleContext,
        strategies: Strategies,
        gateway: Arc<dyn BrokerGateway>,
        store: Arc<dyn TradestrategyStore>,
        capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<RuleFault>) {
        let (faults, rx) = mpsc::unbounded_channel();
        let handle = Self {
            ctx,
            strategies,
            gateway,
            store,
            faults,
            routes: OrderRoutes::default(),
            capacity: capacity.max(1),
            workers: HashMap::new(),
            owners: HashMap::new(),
        };
        (handle, rx)
    }

    /// Validate `config`, then spawn a worker for every instrument it schedules
    pub async fn start(
        config: &EngineConfig,
        gateway: Arc<dyn BrokerGateway>,
        store: Arc<dyn TradestrategyStore>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RuleFault>)> {
        config.validate()?;
        let (mut handle, faults) = Self::new(
            config.rule_context()?,
            config.strategy_map(),
            gateway,
            store,
            config.channel_capacity,
        );
        for ts in &config.tradestrategies {
            handle.add_tradestrategy(ts.clone()).await?;
        }
        info!(
            "[Engine] started {} tradestrategies on {} instruments",
            handle.owners.len(),
            handle.workers.len()
        );
        Ok((handle, faults))
    }

    fn worker(&mut self, instrument: &InstrumentId) -> &Worker {
        self.workers.entry(instrument.clone()).or_insert_with(|| {
            let engine = StrategyEngine::with_outlets(
                self.ctx.clone(),
                self.strategies.clone(),
                self.gateway.clone(),
                self.store.clone(),
                self.faults.clone(),
                self.routes.clone(),
            );
            let (tx, rx) = mpsc::channel(self.capacity);
            let task = tokio::spawn(run_worker(instrument.clone(), engine, rx));
            Worker { tx, task }
        })
    }

    async fn send(&self, instrument: &InstrumentId, message: WorkerMessage) -> Result<()> {
        let Some(worker) = self.workers.get(instrument) else {
            return Err(RunnerError::WorkerStopped(instrument.to_string()));
        };
        worker
            .tx
            .send(message)
            .await
            .map_err(|_| RunnerError::WorkerStopped(instrument.to_string()))
    }

    pub async fn add_tradestrategy(&mut self, tradestrategy: Tradestrategy) -> Result<()> {
        if self.owners.contains_key(&tradestrategy.id) {
            return Err(RunnerError::DuplicateTradestrategy(tradestrategy.id));
        }
        let id = tradestrategy.id.clone();
        let instrument = tradestrategy.instrument_id.clone();
        self.worker(&instrument);

        let (reply, answer) = oneshot::channel();
        self.send(
            &instrument,
            WorkerMessage::Add {
                tradestrategy: Box::new(tradestrategy),
                reply,
            },
        )
        .await?;
        answer
            .await
            .map_err(|_| RunnerError::WorkerStopped(instrument.to_string()))??;
        self.owners.insert(id, instrument);
        Ok(())
    }

    /// A bar update; instruments nothing is scheduled on are skipped
    pub async fn on_bar(
        &self,
        instrument: &InstrumentId,
        bar_size_minutes: u32,
        bar: CandleItem,
    ) -> Result<()> {
        if !self.workers.contains_key(instrument) {
            return Ok(());
        }
        self.send(
            instrument,
            WorkerMessage::Bar {
                bar_size_minutes,
                bar,
            },
        )
        .await
    }

    /// A broker notification, routed to the worker that placed the order
    pub async fn on_order_event(&self, event: BrokerEvent) -> Result<()> {
        let owner = self
            .routes
            .get(event.order_id())
            .and_then(|id| self.owners.get(id.value()).cloned());
        let Some(instrument) = owner else {
            debug!("[Engine] no worker for order {}", event.order_id());
            return Ok(());
        };
        self.send(&instrument, WorkerMessage::Event(event)).await
    }

    pub async fn cancel(&self, tradestrategy_id: &str, now: Timestamp) -> Result<()> {
        let Some(instrument) = self.owners.get(tradestrategy_id) else {
            return Err(RunnerError::UnknownTradestrategy(
                tradestrategy_id.to_string(),
            ));
        };
        self.send(
            instrument,
            WorkerMessage::Cancel {
                tradestrategy_id: tradestrategy_id.to_string(),
                now,
            },
        )
        .await
    }

    pub async fn cancel_all(&self, now: Timestamp) -> Result<()> {
        for instrument in self.workers.keys() {
            self.send(instrument, WorkerMessage::CancelAll(now)).await?;
        }
        Ok(())
    }

    /// New calendar, entry limits and strategies for rules added from now on
    pub async fn reload(&mut self, ctx: RuleContext, strategies: Strategies) -> Result<()> {
        self.ctx = ctx.clone();
        self.strategies = strategies.clone();
        for instrument in self.workers.keys() {
            self.send(
                instrument,
                WorkerMessage::Reload {
                    ctx: ctx.clone(),
                    strategies: strategies.clone(),
                },
            )
            .await?;
        }
        Ok(())
    }

    /// Wait until every worker has processed what was sent before
    pub async fn flush(&self) -> Result<()> {
        for instrument in self.workers.keys() {
            let (reply, done) = oneshot::channel();
            self.send(instrument, WorkerMessage::Flush(reply)).await?;
            done.await
                .map_err(|_| RunnerError::WorkerStopped(instrument.to_string()))?;
        }
        Ok(())
    }

    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.workers.keys().cloned().collect()
    }

    /// Close every inbox and wait for the workers to drain
    pub async fn shutdown(self) {
        for (instrument, worker) in self.workers {
            drop(worker.tx);
            if let Err(e) = worker.task.await {
                warn!("[Worker {}] ended abnormally: {}", instrument, e);
            }
        }
    }
}
