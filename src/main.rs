//! Demo: a few contenders competing for one resource on an in-process store.
//!
//! The store periodically expires the current holder's lock so leadership
//! keeps moving around. Stop with CTRL+C; metrics are dumped on exit.

use std::sync::Arc;
use std::time::Duration;

use d_election::gather_metrics;
use d_election::Contender;
use d_election::ElectionConfig;
use d_election::ElectionService;
use d_election::Error;
use d_election::LeaderInformation;
use d_election::LeaderSessionId;
use d_election::MemoryCoordinationStore;
use d_election::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const NODES: [&str; 3] = ["127.0.0.1:9081", "127.0.0.1:9082", "127.0.0.1:9083"];
const LOCK_EXPIRY_INTERVAL: Duration = Duration::from_secs(5);

enum Notification {
    Granted(LeaderSessionId),
    Revoked,
}

/// Hands grants to the node task, which confirms them off the event loop.
struct DemoContender {
    address: String,
    tx: mpsc::UnboundedSender<Notification>,
}

impl Contender for DemoContender {
    fn grant_leadership(
        &self,
        session_id: LeaderSessionId,
    ) {
        let _ = self.tx.send(Notification::Granted(session_id));
    }

    fn revoke_leadership(&self) {
        let _ = self.tx.send(Notification::Revoked);
    }

    fn handle_error(
        &self,
        error: Error,
    ) {
        if error.is_transient() {
            warn!("[{}] transient election error: {}", self.address, error);
        } else {
            error!("[{}] election error: {}", self.address, error);
        }
    }

    fn description(&self) -> String {
        format!("DemoContender({})", self.address)
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let settings = ElectionConfig::new()?.validate()?;
    let store = MemoryCoordinationStore::new(settings.resource.clone());

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let mut services = Vec::new();
    let mut tasks = Vec::new();
    for address in NODES {
        let service = ElectionService::new(store.clone(), settings.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        service.start(Arc::new(DemoContender {
            address: address.to_string(),
            tx,
        }))?;
        tasks.push(tokio::spawn(run_node(address, service.clone(), rx)));
        services.push(service);
    }

    tokio::spawn(expire_locks(store.clone(), graceful_rx.clone()));

    info!("Application started. Waiting for CTRL+C signal...");
    graceful_shutdown(graceful_tx).await?;

    for service in &services {
        if let Err(e) = service.close().await {
            error!("close failed: {:?}", e);
        }
    }
    for task in tasks {
        task.abort();
    }

    println!("{}", gather_metrics());
    println!("Exiting program.");
    Ok(())
}

async fn run_node(
    address: &'static str,
    service: Arc<ElectionService>,
    mut rx: mpsc::UnboundedReceiver<Notification>,
) {
    while let Some(notification) = rx.recv().await {
        match notification {
            Notification::Granted(session_id) => {
                info!("[{}] granted {}, publishing address", address, session_id);
                service
                    .confirm_leadership(session_id, LeaderInformation::new(session_id, address))
                    .await;
            }
            Notification::Revoked => {
                info!("[{}] leadership revoked, stepping down", address);
            }
        }
    }
}

async fn expire_locks(
    store: MemoryCoordinationStore,
    mut graceful_rx: watch::Receiver<()>,
) {
    let mut interval = tokio::time::interval(LOCK_EXPIRY_INTERVAL);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = graceful_rx.changed() => return,
            _ = interval.tick() => {
                if let Some(holder) = store.revoke_current_holder() {
                    info!("lock of participant {} expired, current record: {:?}", holder, store.leader_information());
                }
            }
        }
    }
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

fn init_observability() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
