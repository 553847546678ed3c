//! Append-only record of every exchange round trip.
//!
//! The client hands each request and response to an [`AuditSink`] before it
//! interprets them. Sinks are best-effort: they cannot fail a call.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::sign::QueryParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditKind {
    Request,
    Response,
    TransportFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub kind: AuditKind,
    pub method: String,
    pub endpoint: String,
    /// Request parameters with the signature redacted.
    pub params: Vec<(String, String)>,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn request(method: &str, endpoint: &str, params: &QueryParams) -> Self {
        Self {
            kind: AuditKind::Request,
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            params: params.redacted().pairs().to_vec(),
            status: None,
            body: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn response(method: &str, endpoint: &str, status: u16, body: &str, max_body: usize) -> Self {
        Self {
            kind: AuditKind::Response,
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            params: Vec::new(),
            status: Some(status),
            body: Some(truncate(body, max_body)),
            recorded_at: Utc::now(),
        }
    }

    pub fn failure(method: &str, endpoint: &str, error: &str) -> Self {
        Self {
            kind: AuditKind::TransportFailure,
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            params: Vec::new(),
            status: None,
            body: Some(error.to_string()),
            recorded_at: Utc::now(),
        }
    }
}

/// Cuts `body` to at most `max` characters, marking the cut with `...`.
pub fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Emits entries as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) {
        let params = entry
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        info!(
            target: "fapi_trader::audit",
            kind = ?entry.kind,
            method = %entry.method,
            endpoint = %entry.endpoint,
            params = %params,
            status = ?entry.status,
            body = entry.body.as_deref().unwrap_or(""),
            "exchange round trip"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _entry: &AuditEntry) {}
}

/// In-memory sink. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
    }
}
