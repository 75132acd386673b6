//! Inbound webhook pipeline.
//!
//! Deliveries are checked in a fixed order: event allow-list, signature
//! presence, delivery id presence, body size, signature verification,
//! replay window, payload parse, workspace and project resolution, then
//! enqueue. Each accepted delivery yields one `webhook` job, plus a
//! `repo_sync` job for pushes to tracked branches.

mod event;
mod ingest;
mod signature;

pub use event::{EventFields, WebhookEventKind, first_non_empty};
pub use ingest::{
    AcceptedDelivery, Admission, AdmittedDelivery, IgnoreReason, IngestError, IngestOutcome,
    MAX_DELIVERY_ID_LENGTH, WebhookHeaders, WebhookIngestService, admit,
};
pub use signature::{WebhookSecret, parse_signature_header, sign_payload, verify_signature};
