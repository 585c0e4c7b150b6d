//! Parameter persistence
//!
//! Global and per-layer controls are saved as an opaque blob: a JSON
//! envelope holding the serialized snapshot, its SHA-256 and a timestamp.
//! Loading verifies the checksum before anything is applied. Audio content
//! is not part of the blob.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::params::{GlobalSettings, LayerSettings, SharedParameters};
use super::transport::MAX_LAYERS;
use crate::error::{LooperError, Result};

/// Current blob format
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Every persisted control value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub global: GlobalSettings,
    pub layers: [LayerSettings; MAX_LAYERS],
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            global: GlobalSettings::default(),
            layers: [LayerSettings::default(); MAX_LAYERS],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    saved_at: DateTime<Utc>,
    checksum: String,
    payload: String,
}

fn checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl ParameterSnapshot {
    /// Read the current values out of the shared store
    pub fn capture(params: &SharedParameters) -> Self {
        let mut layers = [LayerSettings::default(); MAX_LAYERS];
        for (slot, layer) in layers.iter_mut().zip(params.layers()) {
            *slot = layer.load();
        }
        Self {
            global: params.global.load(),
            layers,
        }
    }

    /// Write every value into the shared store
    pub fn apply(&self, params: &SharedParameters) {
        params.global.store(&self.global);
        for (settings, layer) in self.layers.iter().zip(params.layers()) {
            layer.store(settings);
        }
    }

    /// Serialize into a checksummed blob
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let payload = serde_json::to_string(self)?;
        let envelope = Envelope {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            checksum: checksum(&payload),
            payload,
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    /// Parse and verify a blob produced by [`to_blob`](Self::to_blob)
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let envelope: Envelope =
            serde_json::from_slice(blob).map_err(|e| LooperError::Persistence {
                reason: format!("malformed blob: {}", e),
            })?;

        if envelope.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(LooperError::Persistence {
                reason: format!(
                    "unsupported format version {} (expected {})",
                    envelope.format_version, SNAPSHOT_FORMAT_VERSION
                ),
            });
        }

        if checksum(&envelope.payload) != envelope.checksum {
            warn!("Parameter blob failed checksum verification");
            return Err(LooperError::ChecksumMismatch);
        }

        let snapshot: ParameterSnapshot = serde_json::from_str(&envelope.payload)?;
        debug!("Loaded parameter blob saved at {}", envelope.saved_at);
        Ok(snapshot)
    }
}
