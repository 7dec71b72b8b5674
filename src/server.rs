//! Local HTTP control surface.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::agent::{Agent, AgentHandle};
use crate::states::StateKind;
use crate::types::AgentError;

/// Application state shared across handlers
pub struct AppState {
    pub handle: AgentHandle,
    pub version: String,
    pub build_time: String,
    pub product_uid: String,
}

impl AppState {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            handle: agent.handle().clone(),
            version: agent.version().to_string(),
            build_time: agent.build_time().to_string(),
            product_uid: agent.firmware().product_uid.clone(),
        }
    }
}

type AppStateArc = Arc<AppState>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub state: StateKind,
    pub version: String,
    pub build_time: String,
    pub product_uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub state: StateKind,
}

pub fn routes() -> Router<AppStateArc> {
    Router::new()
        .route("/info", get(info))
        .route("/probe", post(probe))
}

async fn info(State(state): State<AppStateArc>) -> Json<InfoResponse> {
    Json(InfoResponse {
        state: state.handle.state(),
        version: state.version.clone(),
        build_time: state.build_time.clone(),
        product_uid: state.product_uid.clone(),
    })
}

async fn probe(State(state): State<AppStateArc>) -> Json<ProbeResponse> {
    info!("Probe requested over the control surface");
    Json(ProbeResponse {
        state: state.handle.probe_now(),
    })
}

/// Serve the control surface until the process exits.
pub async fn run(state: AppState, addr: SocketAddr) -> Result<(), AgentError> {
    let app = routes().with_state(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Control surface listening");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_state() -> AppStateArc {
        Arc::new(AppState {
            handle: AgentHandle::new(StateKind::Poll),
            version: "0.2.0".into(),
            build_time: "today".into(),
            product_uid: "product".into(),
        })
    }

    #[tokio::test]
    async fn info_reports_current_state() {
        let state = app_state();
        state.handle.publish(StateKind::UpdateFetch);

        let Json(body) = info(State(state)).await;
        assert_eq!(body.state, StateKind::UpdateFetch);
        assert_eq!(body.product_uid, "product");
        assert_eq!(body.version, "0.2.0");
    }

    #[tokio::test]
    async fn probe_sets_the_flag() {
        let state = app_state();

        let Json(body) = probe(State(state.clone())).await;
        assert_eq!(body.state, StateKind::Poll);
        assert!(state.handle.take_probe_now());
    }

    #[tokio::test]
    async fn serves_over_http() {
        let app = routes().with_state(app_state());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let body: InfoResponse = reqwest::get(format!("http://{addr}/info"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.state, StateKind::Poll);
    }
}
