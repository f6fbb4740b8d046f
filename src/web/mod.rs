use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::{
    commands::{Command, CommandRequest},
    engine::{Engine, ResetSummary},
    entities::{PlayerView, TileView, UnitView},
    error::{Error, ValidationError},
};

pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
}

type AppState = Arc<Engine>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } | Error::NoTileFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Generating | Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/map", get(map))
        .route("/tile/:tile_id", get(tile))
        .route("/player/:player_id", get(player))
        .route("/player/:player_id/units", get(units))
        .route("/player/:player_id/units/:unit_id", get(unit))
        .route("/player/:player_id/commands", post(command))
        .route("/player/:player_id/commands/", post(command))
        .route("/reset", post(reset))
        .with_state(engine)
}

pub async fn run(config: WebServerConfig, engine: Arc<Engine>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    serve(listener, engine).await
}

/// Serves on an already bound listener until Ctrl+C.
pub async fn serve(listener: TcpListener, engine: Arc<Engine>) -> Result<()> {
    info!(addr = %listener.local_addr()?, "gaea is running");
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

async fn map(State(engine): State<AppState>) -> Result<String, Error> {
    engine.render_map().await
}

async fn tile(
    State(engine): State<AppState>,
    Path(tile_id): Path<String>,
) -> Result<Json<TileView>, Error> {
    Ok(Json(engine.tile_view(&tile_id).await?))
}

async fn player(
    State(engine): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerView>, Error> {
    Ok(Json(engine.player_view(&player_id).await?))
}

async fn units(
    State(engine): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<Vec<UnitView>>, Error> {
    Ok(Json(engine.units_for_player(&player_id).await?))
}

async fn unit(
    State(engine): State<AppState>,
    Path((player_id, unit_id)): Path<(String, String)>,
) -> Result<Json<UnitView>, Error> {
    Ok(Json(engine.unit_for_player(&player_id, &unit_id).await?))
}

async fn command(
    State(engine): State<AppState>,
    Path(player_id): Path<String>,
    body: String,
) -> Result<&'static str, Error> {
    let request: CommandRequest = serde_json::from_str(&body)
        .map_err(|err| ValidationError::Malformed(err.to_string()))?;
    let command = Command::try_from(request)?;
    // Runs detached so a client hanging up cannot cut a move off halfway.
    let task = {
        let engine = engine.clone();
        let player_id = player_id.clone();
        tokio::spawn(async move { engine.execute(&player_id, command).await })
    };
    let outcome = task
        .await
        .unwrap_or_else(|err| Err(Error::Command(err.to_string())));
    match outcome {
        Ok(()) => Ok("OK"),
        Err(err) => {
            if let Error::Validation(reason) = &err {
                info!(player = %player_id, %reason, "command rejected");
            } else {
                warn!(player = %player_id, error = %err, "command failed");
            }
            Err(err)
        }
    }
}

#[derive(Serialize)]
struct ResetResponse {
    message: &'static str,
    #[serde(flatten)]
    summary: ResetSummary,
}

async fn reset(State(engine): State<AppState>) -> Result<Json<ResetResponse>, Error> {
    let summary = engine.reset().await?;
    Ok(Json(ResetResponse {
        message: "tiles generated.",
        summary,
    }))
}
