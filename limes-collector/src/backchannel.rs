//! The Capacity Scrape backchannel (§4.4 step 3, §6, GLOSSARY
//! "Backchannel"): a read-only HTTP callback drivers invoke mid-scrape to
//! read aggregate resource demand. The collector is the server here, not
//! the client — the direction is the opposite of the driver calls in
//! `drivers::LiquidDriver`.

use std::collections::BTreeMap;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use limes_model::driver::{AzResourceDemand, ResourceDemand};

#[derive(Clone)]
struct BackchannelState {
    store: limes_db::Store,
}

pub fn router(store: limes_db::Store) -> Router {
    Router::new()
        .route("/resource-demand/{service_type}/{resource_name}", get(get_resource_demand))
        .with_state(BackchannelState { store })
}

/// `GetResourceDemand(service_type, resource_name) -> map<az, {usage,
/// unused_commitments, pending_commitments}>` (§6).
async fn get_resource_demand(
    State(state): State<BackchannelState>,
    Path((service_type, resource_name)): Path<(String, String)>,
) -> Response {
    let resource = match state
        .store
        .resources()
        .find_by_service_type_and_name(&service_type, &resource_name)
        .await
    {
        Ok(resource) => resource,
        Err(err) => return error_response(err),
    };

    let Some(resource) = resource else {
        return (StatusCode::NOT_FOUND, "unknown resource").into_response();
    };

    let demand = match state.store.commitments().demand_by_az(resource.id).await {
        Ok(demand) => demand,
        Err(err) => return error_response(err),
    };

    let per_az: BTreeMap<String, AzResourceDemand> = demand
        .into_iter()
        .map(|d| {
            (
                d.az.as_str().to_string(),
                AzResourceDemand {
                    usage: d.usage,
                    unused_commitments: d.unused_commitments,
                    pending_commitments: d.pending_commitments,
                },
            )
        })
        .collect();

    axum::Json(ResourceDemand { per_az }).into_response()
}

fn error_response(err: limes_db::Error) -> Response {
    tracing::error!(error = %err, "failed to compute resource demand");
    (StatusCode::INTERNAL_SERVER_ERROR, "failed to compute resource demand").into_response()
}

pub async fn run_server(port: u16, store: limes_db::Store) {
    let app = router(store);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, port, "failed to bind backchannel server");
            return;
        }
    };
    tracing::info!(port, "backchannel server listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "backchannel server exited");
    }
}
