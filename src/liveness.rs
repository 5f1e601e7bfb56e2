use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

/// Uptime check: every path answers `200 OK`, independent of bot state.
pub fn router() -> Router {
  Router::new().route("/", get(alive)).fallback(alive)
}

async fn alive() -> (StatusCode, &'static str) {
  (StatusCode::OK, "OK")
}

pub async fn serve(port: u16) -> Result<()> {
  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  let listener = TcpListener::bind(addr).await?;
  info!(%addr, "liveness endpoint listening");
  serve_on(listener).await
}

pub async fn serve_on(listener: TcpListener) -> Result<()> {
  axum::serve(listener, router()).await?;
  Ok(())
}
