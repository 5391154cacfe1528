//! Structured audit logging for scan dispositions.
//!
//! This module provides functions for emitting structured audit events
//! using the `tracing` crate under the `scanflow::audit` target. Events can
//! be captured by any tracing subscriber (JSON file, OpenTelemetry, etc.)
//! and routed separately from operational logs.

mod events;

pub use events::{
    emit_disposition, emit_file_deleted, emit_penalty_applied, emit_retry_scheduled,
    emit_scan_started, AuditEvent, DispositionAuditEvent,
};
