//! Stacked transient notifications.
//!
//! Conversion, export, and clipboard outcomes surface as short-lived
//! notices. The center keeps them as ordered records: each push appends,
//! each record carries the deadline after which it expires, and
//! [`sweep`](NotificationCenter::sweep) drops the expired ones while
//! preserving the insertion order of the rest. Rendering is the caller's
//! job; the center only owns the list.

use std::time::{Duration, Instant};

/// Severity of a notification, used by renderers to pick styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

/// One transient notice.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Monotonic id, unique within the owning center.
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    /// Instant after which the notice no longer renders.
    pub deadline: Instant,
}

impl Notification {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Ordered store of active notifications.
#[derive(Debug)]
pub struct NotificationCenter {
    ttl: Duration,
    next_id: u64,
    entries: Vec<Notification>,
}

impl NotificationCenter {
    /// A center whose notices live for `ttl` after being pushed.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Append a notice; returns its id.
    pub fn push(&mut self, kind: NotificationKind, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Notification {
            id,
            kind,
            message: message.into(),
            deadline: Instant::now() + self.ttl,
        });
        id
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Info, message)
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Success, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Error, message)
    }

    /// Drop expired notices; returns how many were removed. The survivors
    /// keep their insertion order.
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|n| !n.is_expired());
        before - self.entries.len()
    }

    /// Remove one notice by id, expired or not.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|n| n.id != id);
        before != self.entries.len()
    }

    /// Currently stored notices in insertion order, including any that
    /// expired since the last sweep.
    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
