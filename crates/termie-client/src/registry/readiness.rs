use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashSet;

use crate::model::SessionKey;

/// Counts sessions reaching Ready; fires exactly once, when the last one arrives.
pub struct ReadyBarrier {
    expected: usize,
    arrived: DashSet<SessionKey>,
    count: AtomicUsize,
    fired: AtomicBool,
}

impl ReadyBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            arrived: DashSet::new(),
            count: AtomicUsize::new(0),
            fired: AtomicBool::new(false),
        }
    }

    /// Record `key` as ready. Returns true for exactly one caller: the one completing the set.
    /// Repeated arrivals of the same key are not counted.
    pub fn arrive(&self, key: &SessionKey) -> bool {
        if !self.arrived.insert(key.clone()) {
            return false;
        }
        let n = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        n >= self.expected && !self.fired.swap(true, Ordering::AcqRel)
    }

    pub fn arrived(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
