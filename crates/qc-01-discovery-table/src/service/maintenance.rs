//! Maintenance loop: refresh, revalidation, persistence, expiry, shutdown.
//!
//! Refresh and revalidation run as spawned tasks so the loop keeps serving
//! refresh requests and the close signal while the network work is in
//! flight. At most one of each runs at a time.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::core::{RefreshRequest, TableCore};
use crate::domain::TableConfig;

/// Random delay in `[0, revalidate_interval)` before the next revalidation.
fn next_revalidate_delay(config: &TableConfig) -> Duration {
    let max_ms = config.revalidate_interval_secs.saturating_mul(1000);
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

fn spawn_refresh(core: &Arc<TableCore>, done: mpsc::Sender<()>) {
    let core = Arc::clone(core);
    tokio::spawn(async move {
        core.do_refresh().await;
        let _ = done.send(()).await;
    });
}

fn spawn_revalidate(core: &Arc<TableCore>, done: mpsc::Sender<()>) {
    let core = Arc::clone(core);
    tokio::spawn(async move {
        core.do_revalidate().await;
        let _ = done.send(()).await;
    });
}

/// Run until `close_rx` fires or its sender is dropped.
pub(crate) async fn run(
    core: Arc<TableCore>,
    mut refresh_rx: mpsc::UnboundedReceiver<RefreshRequest>,
    mut close_rx: oneshot::Receiver<()>,
) {
    let config = core.config.clone();

    // The first tick fires immediately and performs the initial refresh.
    let mut refresh_tick = interval(Duration::from_secs(config.refresh_interval_secs));
    refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let copy_period = Duration::from_secs(config.copy_nodes_interval_secs);
    let mut copy_tick = interval_at(Instant::now() + copy_period, copy_period);
    copy_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let expire_period = Duration::from_secs(config.expire_interval_secs);
    let mut expire_tick = interval_at(Instant::now() + expire_period, expire_period);
    expire_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let revalidate = sleep(next_revalidate_delay(&config));
    tokio::pin!(revalidate);

    let (refresh_done_tx, mut refresh_done_rx) = mpsc::channel::<()>(1);
    let (revalidate_done_tx, mut revalidate_done_rx) = mpsc::channel::<()>(1);
    let mut refreshing = false;
    let mut revalidating = false;
    let mut waiting: Vec<RefreshRequest> = Vec::new();

    loop {
        tokio::select! {
            _ = refresh_tick.tick() => {
                if !refreshing {
                    refreshing = true;
                    spawn_refresh(&core, refresh_done_tx.clone());
                }
            }
            Some(request) = refresh_rx.recv() => {
                waiting.push(request);
                if !refreshing {
                    refreshing = true;
                    spawn_refresh(&core, refresh_done_tx.clone());
                }
            }
            Some(()) = refresh_done_rx.recv() => {
                refreshing = false;
                if !core.is_init_done() {
                    core.mark_init_done();
                    info!(roles = ?core.roles(), "initial refresh complete");
                }
                for request in waiting.drain(..) {
                    let _ = request.send(());
                }
            }
            _ = &mut revalidate, if !revalidating => {
                revalidating = true;
                spawn_revalidate(&core, revalidate_done_tx.clone());
            }
            Some(()) = revalidate_done_rx.recv() => {
                revalidating = false;
                revalidate
                    .as_mut()
                    .reset(Instant::now() + next_revalidate_delay(&config));
            }
            _ = copy_tick.tick() => {
                core.copy_bonded_nodes();
            }
            _ = expire_tick.tick() => {
                let removed = core.store.expire_nodes(core.now(), config.bond_expiration_secs);
                debug!(removed, "expired stale node store records");
            }
            _ = &mut close_rx => {
                break;
            }
        }
    }

    debug!(refreshing, revalidating, "closing, draining in-flight work");
    if refreshing {
        let _ = refresh_done_rx.recv().await;
    }
    if revalidating {
        let _ = revalidate_done_rx.recv().await;
    }

    core.mark_closed();
    core.transport.close();
    for request in waiting.drain(..) {
        let _ = request.send(());
    }
    core.store.close();
    info!("discovery table closed");
}
