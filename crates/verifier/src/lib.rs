//! Proof verification service.
//!
//! Exposes `POST /api/verify-proof`. A valid proof is placed in an
//! attestation batch; once the batch is confirmed the response carries the
//! attestation id and the Merkle path of the proof's statement leaf.

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{info, warn};

use zkbid_client::{Attestor, BidError, PipelineConfig, VerificationNetwork, VERIFY_PROOF_PATH};
use zkbid_types::rpc::{ProofErrorResponse, VerifiedProofResponse, VerifyProofRequest};

pub const MISSING_FIELDS: &str = "Proof, public signals, or verification key is missing";
pub const PROOF_INCORRECT: &str = "Your proof isn't correct.";

pub struct VerifierService {
    attestor: Attestor,
}

impl VerifierService {
    pub fn new(network: Arc<dyn VerificationNetwork>, config: PipelineConfig) -> Self {
        Self {
            attestor: Attestor::new(network, config),
        }
    }
}

pub fn router(service: Arc<VerifierService>) -> Router {
    Router::new()
        .route(VERIFY_PROOF_PATH, post(verify_proof))
        .with_state(service)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ProofErrorResponse::new(error))).into_response()
}

pub async fn verify_proof(
    State(service): State<Arc<VerifierService>>,
    payload: Result<Json<VerifyProofRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let (proof, vk) = match request.decode() {
        Ok(Some(decoded)) => decoded,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, MISSING_FIELDS),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match service.attestor.attest(&proof, &vk).await {
        Ok(attestation) => {
            info!(
                attestation_id = attestation.attestation_id,
                leaf = %hex::encode(attestation.leaf_digest),
                "Proof attested"
            );
            (StatusCode::OK, Json(VerifiedProofResponse::from(&attestation))).into_response()
        }
        Err(BidError::ProofRejected(_)) => error_response(StatusCode::BAD_REQUEST, PROOF_INCORRECT),
        Err(e) => {
            warn!(error = %e, "Attestation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    service: Arc<VerifierService>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Verifier listening on {}", addr);
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}
