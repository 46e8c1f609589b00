// net/server.rs
use anyhow::{Context, Result};
use bytes::Bytes;
use hyper::{
    Method, Request, Response, StatusCode, header::CONTENT_TYPE, header::HeaderValue,
    server::conn::http1, service::service_fn,
};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    error::SimError,
    memory::{block::ProcessId, fit::FitStrategy},
    sched::{process::ProcessSpec, simulation::Simulation},
};

#[derive(Clone)]
pub struct AppState {
    pub sim: Arc<RwLock<Simulation>>,
}

impl AppState {
    pub fn new(sim: Simulation) -> Self {
        AppState {
            sim: Arc::new(RwLock::new(sim)),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct StrategyBody {
    pub strategy: FitStrategy,
}

#[derive(Serialize, Deserialize)]
pub struct AddedBody {
    pub id: ProcessId,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<String> {
    let body = match serde_json::to_string(value) {
        Ok(b) => b,
        Err(e) => return text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response<String> {
    let mut resp = Response::new(body.into());
    *resp.status_mut() = status;
    resp
}

/// Status code for each class of simulation error.
pub fn status_for(err: &SimError) -> StatusCode {
    match err {
        SimError::Validation(_) => StatusCode::BAD_REQUEST,
        SimError::Capacity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SimError::NotStopped(_) => StatusCode::CONFLICT,
        SimError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn sim_error_response(err: &SimError) -> Response<String> {
    json_response(
        status_for(err),
        &ErrorBody {
            error: err.to_string(),
        },
    )
}

fn respond<T: Serialize>(result: Result<T, SimError>) -> Response<String> {
    match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => sim_error_response(&e),
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<String>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, "request");

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/snapshot") => {
            let sim = state.sim.read().await;
            json_response(StatusCode::OK, &sim.snapshot())
        }

        // POST /processes {"name", "priority", "burst", "size"}
        (&Method::POST, "/processes") => {
            let spec: ProcessSpec = match read_json(req).await {
                Ok(s) => s,
                Err(resp) => return Ok(resp),
            };
            let mut sim = state.sim.write().await;
            respond(sim.add_process(spec).map(|id| AddedBody { id }))
        }

        (&Method::POST, "/tick") => {
            let mut sim = state.sim.write().await;
            let result = sim.tick();
            if let Err(e @ SimError::Integrity(_)) = &result {
                error!(error = %e, "stopping simulation after integrity fault");
                sim.stop();
            }
            respond(result)
        }

        (&Method::POST, "/start") => {
            let mut sim = state.sim.write().await;
            respond(sim.start().map(|_| sim.snapshot()))
        }

        (&Method::POST, "/stop") => {
            let mut sim = state.sim.write().await;
            sim.stop();
            json_response(StatusCode::OK, &sim.snapshot())
        }

        (&Method::POST, "/strategy") => {
            let body: StrategyBody = match read_json(req).await {
                Ok(b) => b,
                Err(resp) => return Ok(resp),
            };
            let mut sim = state.sim.write().await;
            respond(sim.set_strategy(body.strategy).map(|_| sim.snapshot()))
        }

        (&Method::POST, "/defragment") => {
            let mut sim = state.sim.write().await;
            respond(sim.defragment())
        }

        (&Method::POST, "/reset") => {
            let mut sim = state.sim.write().await;
            sim.reset();
            json_response(StatusCode::OK, &sim.snapshot())
        }

        // Handle all other routes
        _ => text_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Ok(response)
}

/// Parse a JSON request body, or produce the 4xx/5xx response to send instead.
async fn read_json<T: serde::de::DeserializeOwned>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, Response<String>> {
    let body_bytes = collect_body(req.into_body())
        .await
        .map_err(|_| text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read body"))?;
    serde_json::from_slice(&body_bytes).map_err(|e| {
        json_response(
            StatusCode::BAD_REQUEST,
            &ErrorBody {
                error: format!("Invalid JSON: {}", e),
            },
        )
    })
}

// Helper function to collect the body bytes
async fn collect_body(body: hyper::body::Incoming) -> Result<Bytes, hyper::Error> {
    use http_body_util::BodyExt;

    let collected = body.collect().await?;
    Ok(collected.to_bytes())
}

/// Ticks missed under a held lock are delayed, never replayed as a burst.
fn ticker_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Drive the clock: one `tick()` per period while the simulation is running.
pub async fn run_ticker(state: AppState, period: Duration) {
    let mut interval = ticker_interval(period);
    loop {
        interval.tick().await;
        let mut sim = state.sim.write().await;
        if !sim.is_running() {
            continue;
        }
        match sim.tick() {
            Ok(report) => {
                if !report.completed.is_empty() || !report.placed.is_empty() {
                    info!(
                        tick = report.tick,
                        completed = ?report.completed,
                        placed = ?report.placed,
                        "tick"
                    );
                }
            }
            Err(e) => {
                error!(error = %e, "tick failed, stopping simulation");
                sim.stop();
            }
        }
    }
}

// Public function to be called from main
pub async fn run_server(config: Config) -> Result<()> {
    let state = AppState::new(Simulation::new(&config)?);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", config.listen_addr);

    tokio::spawn(run_ticker(state.clone(), config.tick_interval()));

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!("Error serving connection: {:?}", err);
            }
        });
    }
}
