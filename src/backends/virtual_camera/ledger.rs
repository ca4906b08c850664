// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition/release record for virtual resources

use std::sync::{Arc, Mutex, PoisonError};

/// Every resource type the virtual platform hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Device,
    Graph,
    SourceMembership,
    Grabber,
    GrabberMembership,
    Terminator,
    TerminatorMembership,
    SourceLink,
    SinkLink,
    Callback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    Acquired(ResourceKind),
    Released(ResourceKind),
}

/// Shared, ordered log of acquisitions and releases
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    events: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: LedgerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Record an acquisition; the returned token records the release on drop
    pub(super) fn acquire(&self, kind: ResourceKind) -> LedgerToken {
        self.push(LedgerEvent::Acquired(kind));
        LedgerToken {
            ledger: self.clone(),
            kind,
        }
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Kinds in acquisition order
    pub fn acquired(&self) -> Vec<ResourceKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LedgerEvent::Acquired(kind) => Some(kind),
                LedgerEvent::Released(_) => None,
            })
            .collect()
    }

    /// Kinds in release order
    pub fn released(&self) -> Vec<ResourceKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LedgerEvent::Released(kind) => Some(kind),
                LedgerEvent::Acquired(_) => None,
            })
            .collect()
    }

    /// Resources acquired and not yet released
    pub fn outstanding(&self) -> usize {
        self.events().iter().fold(0usize, |n, e| match e {
            LedgerEvent::Acquired(_) => n + 1,
            LedgerEvent::Released(_) => n.saturating_sub(1),
        })
    }

    pub fn outstanding_of(&self, kind: ResourceKind) -> isize {
        self.events().iter().fold(0isize, |n, e| match e {
            LedgerEvent::Acquired(k) if *k == kind => n + 1,
            LedgerEvent::Released(k) if *k == kind => n - 1,
            _ => n,
        })
    }
}

/// Held by a virtual resource; dropping it records the release
#[derive(Debug)]
pub(super) struct LedgerToken {
    ledger: ResourceLedger,
    kind: ResourceKind,
}

impl Drop for LedgerToken {
    fn drop(&mut self) {
        self.ledger.push(LedgerEvent::Released(self.kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_records_release() {
        let ledger = ResourceLedger::new();
        let device = ledger.acquire(ResourceKind::Device);
        let graph = ledger.acquire(ResourceKind::Graph);
        assert_eq!(ledger.outstanding(), 2);

        drop(graph);
        drop(device);
        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(ledger.released(), vec![ResourceKind::Graph, ResourceKind::Device]);
        assert_eq!(ledger.outstanding_of(ResourceKind::Device), 0);
    }
}
