use std::sync::Arc;

use intake_bot::config::Config;
use intake_bot::flow::{BranchTable, Catalog, Finalizer, SessionEngine, SessionStore};
use intake_bot::health;
use intake_bot::sinks::{GoogleStorage, LogStorage, NotificationSink, OperatorNotifier, StorageSink};
use intake_bot::transport::TelegramTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("🤖 Intake bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Liveness: http://0.0.0.0:{}/", config.port);

    // ── Liveness endpoint ───────────────────────────────────────────────
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(port).await {
            tracing::error!(error = %e, "Liveness endpoint failed");
        }
    });

    // ── Step catalog + branch table ─────────────────────────────────────
    let branches = match &config.schedule_json {
        Some(raw) => BranchTable::from_json(raw)?,
        None => BranchTable::default(),
    };
    let catalog = Catalog::new(branches);

    // ── Transport (also the attachment fetcher) ─────────────────────────
    let transport = Arc::new(TelegramTransport::new(config.bot_token.clone()));

    // ── Sinks ───────────────────────────────────────────────────────────
    let notifier = config.operator_chat_id.map(|chat_id| {
        Arc::new(OperatorNotifier::new(config.bot_token.clone(), chat_id))
    });
    match &notifier {
        Some(n) => {
            eprintln!("   Notifications: enabled");
            n.startup_ping().await;
        }
        None => eprintln!("   Notifications: disabled (no ADMIN_CHAT_ID)"),
    }

    let storage: Arc<dyn StorageSink> = if config.storage_configured() {
        eprintln!("   Storage: Google Sheets + Drive");
        Arc::new(GoogleStorage::new(
            config
                .google_api_token
                .clone()
                .expect("checked by storage_configured"),
            config.sheet_id.clone().expect("checked by storage_configured"),
            config
                .drive_folder_id
                .clone()
                .expect("checked by storage_configured"),
        ))
    } else {
        eprintln!("   Storage: log-only (Google credentials not configured)");
        Arc::new(LogStorage)
    };

    // ── Engine ──────────────────────────────────────────────────────────
    let store = Arc::new(SessionStore::new());
    let finalizer = Finalizer::new(
        notifier.map(|n| n as Arc<dyn NotificationSink>),
        Arc::clone(&transport) as Arc<dyn intake_bot::sinks::AttachmentFetcher>,
        storage,
        catalog.fields(),
    );
    let engine = Arc::new(SessionEngine::new(Arc::clone(&store), catalog, finalizer));

    // Idle-session sweep, hourly; respects the per-user locks.
    let idle_timeout = config.session_idle_timeout;
    let sweep_store = Arc::clone(&store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            let evicted = sweep_store.evict_idle(idle_timeout).await;
            if evicted > 0 {
                tracing::info!(evicted, "Idle session sweep");
            }
        }
    });

    transport.run(engine).await?;
    Ok(())
}
