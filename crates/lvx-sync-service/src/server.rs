// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! HTTP ingestion: port probing, the patch endpoint, and the engine worker.
//!
//! Requests are acknowledged once queued, not once applied. While a long
//! `Reset` runs, up to the queue depth of later patches are accepted and wait
//! their turn in arrival order; past that, `ingest` blocks on the full queue.

use std::net::{IpAddr, SocketAddr};
use std::panic::{self, AssertUnwindSafe};

use anyhow::{anyhow, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    routing::post,
    Router,
};
use lvx_scene_port::{LevelSource, RenderPort};
use lvx_sync::{Outcome, SyncEngine, ACK_BODY};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Bind the first free port in `base..base + attempts`.
pub(crate) async fn bind_first_available(
    host: IpAddr,
    base: u16,
    attempts: u16,
) -> Result<TcpListener> {
    for offset in 0..attempts {
        let Some(port) = base.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::new(host, port);
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(err) => warn!(%addr, %err, "port unavailable; trying the next one"),
        }
    }
    Err(anyhow!(
        "no free port on {host} in {base}..{}",
        base.saturating_add(attempts)
    ))
}

/// Patch endpoint. Bodies are queued for the worker and acknowledged at once.
pub(crate) fn router(queue: mpsc::Sender<Bytes>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", post(ingest))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(queue)
}

async fn ingest(State(queue): State<mpsc::Sender<Bytes>>, body: Bytes) -> &'static str {
    debug!(bytes = body.len(), "patch received");
    if queue.send(body).await.is_err() {
        error!("engine worker is gone; patch dropped");
    }
    ACK_BODY
}

/// Run the engine on a blocking thread, one body at a time, until the queue
/// closes. Returns the engine for inspection.
///
/// A panic while handling one body is logged and the worker moves on to the
/// next; the level keeps whatever that body had applied before the panic.
pub(crate) fn spawn_worker<R, S>(
    mut engine: SyncEngine<R, S>,
    mut queue: mpsc::Receiver<Bytes>,
) -> JoinHandle<SyncEngine<R, S>>
where
    R: RenderPort + Send + 'static,
    S: LevelSource + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        while let Some(body) = queue.blocking_recv() {
            let handled = panic::catch_unwind(AssertUnwindSafe(|| process(&mut engine, &body)));
            if handled.is_err() {
                error!(bytes = body.len(), "patch handling panicked; continuing with the next");
            }
        }
        engine
    })
}

/// Handle one body and log the warning summary it left behind.
pub(crate) fn process<R: RenderPort, S: LevelSource>(engine: &mut SyncEngine<R, S>, body: &[u8]) {
    match engine.handle_body(body) {
        Ok(Outcome::Reloaded { level, report }) => {
            info!(%level, sectors = report.sectors, objects = report.objects, "reloaded");
        }
        Ok(Outcome::Patched { changes, .. }) if changes.is_empty() => {
            debug!("patch changed nothing");
        }
        Ok(Outcome::Patched { .. } | Outcome::ReloadFailed(_)) => {}
        Err(err) => warn!(%err, "patch rejected"),
    }
    if let Some(summary) = engine.take_warning_summary() {
        warn!("{summary}");
    }
}
