pub mod config;
pub mod consumer;
pub mod net;
pub mod pubsub;
pub mod sink;
pub mod types;

use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::Result;
use config::ServerConfig;
use consumer::spawn_consumers;
use net::server::{bind, run_webhook_server};
use pubsub::PubSub;
use sink::Sink;
use types::Topic;

/// Binds the listener, starts the topic consumers and serves until `shutdown` fires
pub async fn init(config: ServerConfig, sink: Arc<dyn Sink>, shutdown: CancellationToken) -> Result<()> {
    let listener = bind(&config.listen_addr()).await?;
    serve(listener, &config.topics, sink, shutdown).await
}

/// Runs the relay on an already bound listener.
///
/// Returns after the HTTP server has drained and every consumer task has exited.
pub async fn serve(
    listener: TcpListener,
    topics: &[Topic],
    sink: Arc<dyn Sink>,
    shutdown: CancellationToken,
) -> Result<()> {
    let bus = Arc::new(PubSub::new());
    let tracker = TaskTracker::new();

    spawn_consumers(&bus, topics, sink, &shutdown, &tracker);
    tracker.close();

    let served = run_webhook_server(listener, bus, shutdown.clone()).await;

    // Consumers stop with the server, also when it failed
    shutdown.cancel();
    tracker.wait().await;
    info!("All topic consumers stopped");

    served
}
