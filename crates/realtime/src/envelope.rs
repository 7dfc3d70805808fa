//! Mutation event envelopes delivered to live connections
//!
//! The wire format is a JSON object with a `type` discriminator, an epoch-ms
//! `timestamp`, and a nullable `sessionId` used only for echo suppression.
//! Affected id sets are deduplicated by construction (`BTreeSet`); an empty
//! set is valid and means "something in this scope changed, refetch".

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Envelope carried by the broadcast channel and delivered verbatim to
/// connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationEvent {
    /// Variant and variant-specific fields, flattened into the envelope
    #[serde(flatten)]
    pub payload: MutationPayload,

    /// Publisher timestamp, epoch milliseconds, non-decreasing per publisher
    pub timestamp: i64,

    /// Originating session, if the mutating client supplied one
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Mutation event variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MutationPayload {
    /// One or more entities under a schema changed; clients refetch
    #[serde(rename = "ERD_MUTATED")]
    ErdMutated {
        #[serde(rename = "schemaId")]
        schema_id: String,
        #[serde(rename = "affectedTableIds")]
        affected_table_ids: BTreeSet<String>,
    },

    /// A schema was renamed
    #[serde(rename = "SCHEMA_RENAMED")]
    SchemaRenamed {
        #[serde(rename = "schemaId")]
        schema_id: String,
        name: String,
    },
}

impl MutationEvent {
    /// Serialize to JSON text for transport
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
