pub mod adapters;
pub mod app;
mod assets;
pub mod config;
pub mod events;
pub mod logging;
pub mod ports;
pub mod push;
pub mod rides;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use push::vapid::generate_vapid_credentials;

use std::net::SocketAddr;

pub async fn serve(addr: SocketAddr, config: config::AppConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app::app(config)).await
}
