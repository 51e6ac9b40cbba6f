//! WebFeature Diff runner
//!
//! Loads the previous and current catalog snapshots, diffs them, reconciles
//! the result against the live catalog and stores the sorted diff.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webfeature_diff::config::{LogFormat, Settings};
use webfeature_diff::reconcile::{InMemoryFeatureFetcher, Reconciler};
use webfeature_diff::snapshot::{DiffEngine, DiffRecord, FileBlobStore, SnapshotStore};
use webfeature_diff::DiffError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the filter reads RUST_LOG
    let settings = Settings::load()?;
    init_tracing(settings.log_format);

    info!("Starting feature diff run");

    let store = SnapshotStore::new(Arc::new(FileBlobStore::new(
        settings.storage.snapshot_dir.clone(),
    )));
    let old = store.load(&settings.storage.old_snapshot_key).await?;
    let new = store.load(&settings.storage.new_snapshot_key).await?;
    info!(
        "Loaded snapshots: {} old features, {} new features",
        old.features.len(),
        new.features.len()
    );

    let catalog = tokio::fs::read(&settings.reconcile.live_catalog_path).await?;
    let fetcher = Arc::new(InMemoryFeatureFetcher::from_json(&catalog)?);
    let reconciler = Reconciler::new(fetcher).with_concurrency(settings.reconcile.concurrency);

    let raw = DiffEngine::calculate_diff(&old.features, &new.features);

    let reconciled = tokio::select! {
        result = reconciler.reconcile_history(raw, &old.features, &new.features) => result,
        _ = shutdown_signal() => Err(DiffError::Cancelled),
    };
    let diff = match reconciled {
        Ok(diff) => diff,
        Err(e) => {
            error!("Reconciliation failed, discarding diff: {}", e);
            return Err(e.into());
        }
    };

    let record = DiffRecord::new(&old.metadata, &new.metadata, diff);
    if record.diff.has_changes() {
        store
            .save_diff(&settings.storage.diff_output_key, &record)
            .await?;
    }

    for line in record.diff.render_summary().lines() {
        info!("{}", line);
    }
    info!("Feature diff run complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,webfeature_diff=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init(),
    }
}

/// Resolves on Ctrl+C or SIGTERM. Without a handler it never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, cancelling reconciliation");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling reconciliation");
        },
    }
}
