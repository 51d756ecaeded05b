//! Background ticks that keep the queue moving.
//!
//! Two loops run until `stop`:
//! - Promotion: fills free slots from the wait-line.
//! - Sweep: expires idle and over-lifetime tickets, then refills.
//!
//! A failed or panicking tick is logged and counted; the next tick runs as
//! usual.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::metrics::QUEUE_TICK_FAILURES;

use super::service::QueueService;
use super::types::QueueError;

pub struct QueueScheduler {
    service: Arc<QueueService>,
    promotion_interval: Duration,
    sweep_interval: Duration,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl QueueScheduler {
    pub fn new(service: Arc<QueueService>, config: &QueueConfig) -> Self {
        Self::with_intervals(
            service,
            config.promotion_tick_interval(),
            config.sweep_interval(),
        )
    }

    pub fn with_intervals(
        service: Arc<QueueService>,
        promotion_interval: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            service,
            promotion_interval,
            sweep_interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn the background loops.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Queue scheduler already running");
            return;
        }

        info!(
            "Starting queue scheduler (promotion every {:?}, sweep every {:?})",
            self.promotion_interval, self.sweep_interval
        );

        let mut handles = self.handles.lock().await;
        handles.push(self.spawn_promotion_loop());
        handles.push(self.spawn_sweep_loop());
    }

    /// Signal the loops and wait for them to finish their current tick.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Queue scheduler not running");
            return;
        }

        info!("Stopping queue scheduler");
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Queue scheduler task ended abnormally: {}", e);
            }
        }

        info!("Queue scheduler stopped");
    }

    fn spawn_promotion_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let service = Arc::clone(&self.service);
        let interval = self.promotion_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!("Promotion loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        run_tick("promotion", &service, |q| q.promote().map(|_| ())).await;
                    }
                }
            }
            debug!("Promotion loop stopped");
        })
    }

    fn spawn_sweep_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let service = Arc::clone(&self.service);
        let interval = self.sweep_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!("Sweep loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        run_tick("sweep", &service, |q| q.sweep().map(|_| ())).await;
                    }
                }
            }
            debug!("Sweep loop stopped");
        })
    }
}

/// Run one tick on the blocking pool. A panic comes back as a `JoinError`
/// and leaves the calling loop alive.
async fn run_tick<F>(task: &'static str, service: &Arc<QueueService>, tick: F)
where
    F: FnOnce(&QueueService) -> Result<(), QueueError> + Send + 'static,
{
    let service = Arc::clone(service);
    match tokio::task::spawn_blocking(move || tick(service.as_ref())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            QUEUE_TICK_FAILURES.with_label_values(&[task]).inc();
            warn!("Queue {} tick failed: {}", task, e);
        }
        Err(e) => {
            QUEUE_TICK_FAILURES.with_label_values(&[task]).inc();
            error!("Queue {} tick panicked: {}", task, e);
        }
    }
}
