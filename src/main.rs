use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use hrd::auth::AdminAuth;
use hrd::config::Config;
use hrd::engine::BookingEngine;
use hrd::policy::SystemClock;
use hrd::reaper;
use hrd::service::Service;
use hrd::session::SessionManager;
use hrd::store::WalStore;
use hrd::wire;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    hrd::observability::init_logging();

    let config = Config::from_env()?;
    hrd::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(WalStore::open(&config.wal_path())?);
    let engine = BookingEngine::new(store.clone(), Arc::new(SystemClock))
        .with_booking_timeout(config.booking_timeout);
    let sessions = Arc::new(SessionManager::new(store.clone(), config.session));
    let service = Arc::new(Service::new(
        engine,
        sessions.clone(),
        AdminAuth::new(config.admin_password.clone()),
    ));

    if let Some(ttl) = config.session.ttl {
        let period = (ttl / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            reaper::run_session_reaper(sessions, period).await;
        });
    }
    let compactor_store = store.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        reaper::run_compactor(compactor_store, threshold).await;
    });

    let semaphore = Arc::new(Semaphore::new(config.max_connections));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("hrd listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  max_connections: {}", config.max_connections);
    info!("  booking_timeout: {:?}", config.booking_timeout);
    info!(
        "  session_ttl: {}",
        config.session.ttl.map_or("none".to_string(), |t| format!("{t:?}"))
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(hrd::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(hrd::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(hrd::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let svc = service.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, svc).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(hrd::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == config.max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = config.max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    info!("hrd stopped");
    Ok(())
}
