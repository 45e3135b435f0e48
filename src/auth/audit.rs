use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::DecisionRequest;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub principal: String,
    pub operation: String,
    pub resource_type: String,
    pub resource_name: String,
    pub allowed: bool,
    pub source: String, // "cache", "remote", "fallback"
    pub duration_ms: u64,
}

pub fn audit_decision(request: &DecisionRequest, allowed: bool, source: &str, duration: Duration) {
    let entry = AuditEntry {
        timestamp: Utc::now(),
        principal: request.session.principal.clone(),
        operation: request.operation.clone(),
        resource_type: request.resource.resource_type.clone(),
        resource_name: request.resource.name.clone(),
        allowed,
        source: source.to_string(),
        duration_ms: duration.as_millis() as u64,
    };

    // Structured JSON entry, separated from application logs by target
    info!(
        target: "audit",
        audit_type = "authorization",
        principal = %entry.principal,
        operation = %entry.operation,
        resource_type = %entry.resource_type,
        resource_name = %entry.resource_name,
        allowed = %entry.allowed,
        source = %entry.source,
        duration_ms = %entry.duration_ms,
        "Authorization decision"
    );
}
