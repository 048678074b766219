//! Odoo CRM webhook ingestion.
//!
//! Odoo pushes lead records keyed by its own field names. [`mapping`]
//! translates them into student columns and [`ingest`] authenticates the
//! delivery and upserts each record by email.

pub mod ingest;
pub mod mapping;

pub use ingest::{
    ingest, parse_payload, recent_events, sign_payload, verify_signature, verify_token,
    IngestReport, RecordResult,
};
pub use mapping::{map_record, MappedRecord, FIELD_MAP};
