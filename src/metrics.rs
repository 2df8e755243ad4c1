use std::{sync::Arc, time::Duration};

use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::{
    config::MetricsConfig,
    manager::{GuardManager, WorkloadMetrics},
};

/// Receiving side of a shutdown request.
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> (ShutdownSender, ShutdownSignal) {
        let (tx, rx) = broadcast::channel(1);
        (ShutdownSender(tx), ShutdownSignal { rx })
    }

    pub async fn recv(&mut self) {
        let _ = self.rx.recv().await;
    }
}

pub struct ShutdownSender(broadcast::Sender<()>);

impl ShutdownSender {
    pub fn send_signal(self) {
        let _ = self.0.send(());
    }
}

/// Handle to a running metrics collector.
pub struct MetricsCollectorHandle {
    tx_shutdown: ShutdownSender,
    task: JoinHandle<()>,
}

impl MetricsCollectorHandle {
    /// Stop the collector and wait until every workload is detached.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.tx_shutdown.send_signal();
        self.task.await?;
        Ok(())
    }
}

pub fn start_metrics_collector(
    manager: Arc<GuardManager>,
    config: MetricsConfig,
) -> MetricsCollectorHandle {
    let (tx_shutdown, shutdown) = ShutdownSignal::new();
    let task = tokio::spawn(run_metrics_collector(manager, config, shutdown));
    MetricsCollectorHandle { tx_shutdown, task }
}

/// Log the metrics of every workload each `config.interval` until `shutdown`
/// fires, then detach every workload.
pub async fn run_metrics_collector(
    manager: Arc<GuardManager>,
    config: MetricsConfig,
    mut shutdown: ShutdownSignal,
) {
    log::info!("Starting metrics collector");
    if config.enabled {
        collect_until(&manager, config.interval, &mut shutdown).await;
    } else {
        shutdown.recv().await;
    }
    log::info!("Stopping metrics collector");
    manager.detach_all();
}

async fn collect_until(manager: &GuardManager, period: Duration, shutdown: &mut ShutdownSignal) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                for metrics in manager.collect_metrics() {
                    log_metrics(&metrics);
                }
            }
            () = shutdown.recv() => break,
        }
    }
}

fn log_metrics(metrics: &WorkloadMetrics) {
    if let Some(stats) = &metrics.firewall {
        for (counter, value) in stats.iter() {
            log::info!("{} l4-firewall {counter}={value}", metrics.workload);
        }
    }
    if let Some(syscalls) = &metrics.syscalls {
        for (pid, count) in syscalls {
            log::info!("{} syscall-counter pid={pid} count={count}", metrics.workload);
        }
    }
}
