//! Audit trail for access decisions.
//!
//! `record` is fire-and-forget: events go into a bounded in-memory
//! buffer and a background task drains them into structured `tracing`
//! records (the observability collaborator). When the buffer is full
//! the oldest event is dropped — the request path is never blocked and
//! never sees a sink failure.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::auth::{Principal, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Unauthenticated,
    Forbidden,
    RateLimited,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Unauthenticated => "unauthenticated",
            Decision::Forbidden => "forbidden",
            Decision::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    /// None for requests that never authenticated
    pub principal: Option<Uuid>,
    pub role: Option<Role>,
    pub method: String,
    pub path: String,
    pub ip: Option<String>,
    pub decision: Decision,
    /// Structured denial detail (required/actual roles etc.); never
    /// part of the HTTP response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn anonymous(method: &str, path: &str, ip: Option<String>, decision: Decision) -> Self {
        Self {
            timestamp: Utc::now(),
            principal: None,
            role: None,
            method: method.to_string(),
            path: path.to_string(),
            ip,
            decision,
            detail: None,
        }
    }

    pub fn for_principal(
        principal: &Principal,
        method: &str,
        path: &str,
        ip: Option<String>,
        decision: Decision,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            principal: Some(principal.id),
            role: Some(principal.role),
            method: method.to_string(),
            path: path.to_string(),
            ip,
            decision,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

struct AuditBuffer {
    events: VecDeque<AuditEvent>,
    capacity: usize,
    dropped: u64,
}

impl AuditBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append, dropping the oldest buffered event on overflow.
    fn push(&mut self, event: AuditEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    fn drain(&mut self) -> (Vec<AuditEvent>, u64) {
        let dropped = std::mem::take(&mut self.dropped);
        (self.events.drain(..).collect(), dropped)
    }
}

struct Inner {
    buffer: Mutex<AuditBuffer>,
    notify: Notify,
}

#[derive(Clone)]
pub struct AuditSink {
    inner: Arc<Inner>,
}

impl AuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(AuditBuffer::new(capacity.max(1))),
                notify: Notify::new(),
            }),
        }
    }

    /// Record an access decision. Never blocks, never fails.
    pub fn record(&self, event: AuditEvent) {
        self.inner.buffer.lock().push(event);
        self.inner.notify.notify_one();
    }

    /// Spawn the background drain task emitting buffered events as
    /// structured `tracing` records.
    pub fn spawn_drain(&self) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                let (events, dropped) = inner.buffer.lock().drain();
                if events.is_empty() && dropped == 0 {
                    inner.notify.notified().await;
                    continue;
                }
                for event in events {
                    tracing::info!(
                        target: "audit",
                        principal = %event
                            .principal
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "anonymous".to_string()),
                        role = event.role.map(|r| r.as_str()).unwrap_or("-"),
                        method = %event.method,
                        path = %event.path,
                        ip = event.ip.as_deref().unwrap_or("-"),
                        decision = event.decision.as_str(),
                        detail = event.detail.as_deref().unwrap_or(""),
                        "access decision"
                    );
                }
                if dropped > 0 {
                    tracing::warn!(target: "audit", dropped, "audit buffer overflowed");
                }
            }
        })
    }

    #[cfg(test)]
    fn snapshot(&self) -> Vec<AuditEvent> {
        self.inner.buffer.lock().events.iter().cloned().collect()
    }
}
