// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Level sync service.
//!
//! Listens on the first free port of a small range, acknowledges each patch
//! envelope posted by the editor, and applies patches one at a time to a live
//! level held by a [`SyncEngine`].

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lvx_app_core::config::{ConfigService, ConfigStore};
use lvx_config_fs::FsConfigStore;
use lvx_scene_port::HeadlessRenderer;
use lvx_sync::SyncEngine;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod server;
mod source;

use source::FsLevelSource;

const PREFS_KEY: &str = "sync_host";
const QUEUE_DEPTH: usize = 16;

#[derive(Parser, Debug)]
#[command(author, version, about = "Applies level editor patches to a live level")]
struct Args {
    /// Interface to listen on
    #[arg(long)]
    host: Option<IpAddr>,
    /// First port to try
    #[arg(long)]
    base_port: Option<u16>,
    /// Number of consecutive ports to try
    #[arg(long)]
    port_attempts: Option<u16>,
    /// Directory of `<LEVEL>.json` files mounted before any GOBPath arrives
    #[arg(long)]
    levels_dir: Option<PathBuf>,
    /// Level loaded at startup
    #[arg(long)]
    level: Option<String>,
    /// Show only this layer
    #[arg(long, allow_hyphen_values = true)]
    layer: Option<i32>,
    /// Largest accepted request body
    #[arg(long)]
    max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct SyncHostPrefs {
    host: IpAddr,
    base_port: u16,
    port_attempts: u16,
    levels_dir: Option<PathBuf>,
    level: Option<String>,
    visible_layer: Option<i32>,
    max_body_bytes: usize,
}

impl Default for SyncHostPrefs {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: 8080,
            port_attempts: 4,
            levels_dir: None,
            level: None,
            visible_layer: None,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

impl SyncHostPrefs {
    /// Command-line flags win over persisted values.
    fn overridden_by(mut self, args: Args) -> Self {
        if let Some(host) = args.host {
            self.host = host;
        }
        if let Some(port) = args.base_port {
            self.base_port = port;
        }
        if let Some(attempts) = args.port_attempts {
            self.port_attempts = attempts;
        }
        if args.levels_dir.is_some() {
            self.levels_dir = args.levels_dir;
        }
        if args.level.is_some() {
            self.level = args.level;
        }
        if args.layer.is_some() {
            self.visible_layer = args.layer;
        }
        if let Some(max) = args.max_body_bytes {
            self.max_body_bytes = max;
        }
        self
    }
}

fn load_prefs() -> SyncHostPrefs {
    match FsConfigStore::new() {
        Ok(store) => prefs_from(&ConfigService::new(store)),
        Err(err) => {
            warn!(%err, "config directory unavailable; using defaults");
            SyncHostPrefs::default()
        }
    }
}

fn prefs_from<S: ConfigStore>(service: &ConfigService<S>) -> SyncHostPrefs {
    match service.load_or_init(PREFS_KEY) {
        Ok(prefs) => prefs,
        Err(err) => {
            warn!(key = PREFS_KEY, %err, "host prefs unusable; using defaults");
            SyncHostPrefs::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let prefs = load_prefs().overridden_by(args);

    let mut engine = SyncEngine::new(
        HeadlessRenderer::new(),
        FsLevelSource::new(prefs.levels_dir.clone()),
    )
    .with_visible_layer(prefs.visible_layer);

    if let Some(level) = &prefs.level {
        engine.load(None, level, true);
        if let Some(summary) = engine.take_warning_summary() {
            warn!("{summary}");
        }
    }

    let listener = match server::bind_first_available(
        prefs.host,
        prefs.base_port,
        prefs.port_attempts,
    )
    .await
    {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, "sync service unavailable");
            return Err(err);
        }
    };
    info!(addr = %listener.local_addr()?, "listening for level patches");

    let (queue, rx) = mpsc::channel(QUEUE_DEPTH);
    let worker = server::spawn_worker(engine, rx);

    axum::serve(listener, server::router(queue, prefs.max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve patches")?;

    let engine = worker.await.context("engine worker")?;
    info!(
        level = engine.level_name(),
        sectors = engine.level().sector_count(),
        objects = engine.level().object_count(),
        "sync service stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for ctrl-c");
    }
}
