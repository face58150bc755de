//! Ingestion configuration
//!
//! The embedder builds an [`IngestConfig`] in code or deserializes it from
//! whatever configuration source it owns; this crate never reads files.

use crate::blob_view::MAX_VIEW_LENGTH;
use serde::{Deserialize, Serialize};

/// Configuration shared by the chunk reader and the heap profile tracker
///
/// # Example
/// ```
/// use tracefold::config::IngestConfig;
///
/// let config = IngestConfig::default();
/// assert_eq!(config.chunk_size, 1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Size of each raw chunk read from the trace source, in bytes
    ///
    /// Must be non-zero and addressable by a single view.
    ///
    /// Default: 1 MiB
    pub chunk_size: usize,

    /// Index the first profile packet of every sequence is expected to carry
    ///
    /// Producers start counting at 0. A sequence whose first packet carries
    /// any other index has lost packets before the tracker saw it.
    pub first_packet_index: u64,

    /// Skip records identical to the last one applied for the same
    /// (process, callsite) pair
    ///
    /// Redelivered records would otherwise be added twice.
    ///
    /// Default: true
    pub drop_duplicate_records: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            first_packet_index: 0,
            drop_duplicate_records: true,
        }
    }
}

impl IngestConfig {
    /// Configuration with a custom chunk size
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.chunk_size > MAX_VIEW_LENGTH {
            return Err(format!(
                "chunk_size must be <= {}, got {}",
                MAX_VIEW_LENGTH, self.chunk_size
            ));
        }

        Ok(())
    }
}
