use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use embed_core::{
    BroadcastNotifier, CachedMemoStore, ChronoTimestamps, EmbedMount, FailurePolicy,
    HttpMemoStore, RenderGate, ViewState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Render the embed markup for one memo served by a memo server.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:5230")]
    server_url: String,
    /// Raw route segment, passed through the same id resolution as the embed route.
    memo_id: String,
    /// Render an error panel instead of an empty embed when loading fails.
    #[arg(long)]
    show_errors: bool,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    utc_offset_minutes: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let store = CachedMemoStore::new(HttpMemoStore::new(&args.server_url)?);
    let notifier = BroadcastNotifier::default();
    let mut toasts = notifier.subscribe();

    let timestamps = ChronoTimestamps::with_utc_offset_minutes(args.utc_offset_minutes)
        .ok_or_else(|| anyhow!("utc offset out of range: {} minutes", args.utc_offset_minutes))?;
    let policy = if args.show_errors {
        FailurePolicy::ShowError
    } else {
        FailurePolicy::Conceal
    };
    let gate = RenderGate::new()
        .with_timestamp_formatter(timestamps)
        .with_failure_policy(policy);

    let mount = EmbedMount::new(Arc::new(store), Arc::new(notifier));
    let state = mount.load(Some(&args.memo_id)).await;
    match &state {
        ViewState::Pending => info!(raw = %args.memo_id, "no memo id resolved"),
        ViewState::Loaded(memo) => info!(memo_id = memo.id.0, "memo rendered"),
        ViewState::Failed(_) => {}
    }

    while let Ok(toast) = toasts.try_recv() {
        eprintln!("[{:?}] {}", toast.level, toast.message);
    }
    println!("{}", mount.render(&gate).await);

    Ok(())
}
