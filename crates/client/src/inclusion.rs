//! Local check that an attestation really covers our statement.
//!
//! The attestation arrives off-chain and may have been altered in transit.
//! Only the root published on the ledger is trusted: the path must fold
//! to exactly that root.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use zkbid_crypto::{compute_root, statement_leaf};
use zkbid_types::{Attestation, Digest};

use crate::config::PipelineConfig;
use crate::error::{BidError, Stage};
use crate::ledger::Ledger;
use crate::pipeline::bounded;

pub struct AttestationInclusionChecker {
    ledger: Arc<dyn Ledger>,
    vk_hash: Digest,
    ledger_timeout: Duration,
}

impl AttestationInclusionChecker {
    pub fn new(ledger: Arc<dyn Ledger>, vk_hash: Digest) -> Self {
        Self {
            ledger,
            vk_hash,
            ledger_timeout: PipelineConfig::default().ledger_timeout(),
        }
    }

    /// Bound on each ledger read.
    pub fn with_ledger_timeout(mut self, timeout: Duration) -> Self {
        self.ledger_timeout = timeout;
        self
    }

    /// `true` only if the recomputed root equals the ledger's root for
    /// this attestation and the ledger's own check agrees. Any error or
    /// mismatch is `false`.
    pub async fn verify(&self, attestation: &Attestation) -> bool {
        let id = attestation.attestation_id;

        let published = match bounded(
            Stage::Ledger,
            self.ledger_timeout,
            self.ledger.attestation_root(id),
        )
        .await
        .and_then(|r| r.map_err(BidError::from))
        {
            Ok(Some(root)) => root,
            Ok(None) => {
                warn!(attestation_id = id, "No root published for attestation");
                return false;
            }
            Err(e) => {
                warn!(attestation_id = id, error = %e, "Could not read attestation root");
                return false;
            }
        };

        let computed = compute_root(
            &attestation.leaf_digest,
            &attestation.path,
            attestation.leaf_count,
            attestation.index,
        );
        if computed != Some(published) {
            warn!(attestation_id = id, "Recomputed root does not match ledger");
            return false;
        }

        let check = self.ledger.verify_proof_attestation(
            id,
            attestation.leaf_digest,
            attestation.path.clone(),
            attestation.leaf_count,
            attestation.index,
        );
        match bounded(Stage::Ledger, self.ledger_timeout, check)
            .await
            .and_then(|r| r.map_err(BidError::from))
        {
            Ok(valid) => valid,
            Err(e) => {
                warn!(attestation_id = id, error = %e, "Ledger attestation check failed");
                false
            }
        }
    }

    /// [`verify`](Self::verify), and additionally require the leaf to be
    /// the statement of `public_signals` under the registered key.
    pub async fn verify_statement(&self, attestation: &Attestation, public_signals: &[Digest]) -> bool {
        if statement_leaf(&self.vk_hash, public_signals) != attestation.leaf_digest {
            warn!(
                attestation_id = attestation.attestation_id,
                "Attested leaf is not our statement"
            );
            return false;
        }
        self.verify(attestation).await
    }
}
