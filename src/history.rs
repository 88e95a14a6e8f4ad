use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::pipeline::RunRecord;

/// Bounded, newest-first record of completed runs. Shared as
/// `Arc<RunHistory>`; pushes from several threads are serialized.
#[derive(Debug)]
pub struct RunHistory {
    capacity: usize,
    records: Mutex<VecDeque<Arc<RunRecord>>>,
}

impl RunHistory {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<RunRecord>>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, record: Arc<RunRecord>) {
        let mut records = self.lock();
        records.push_front(record);
        records.truncate(self.capacity);
    }

    pub fn snapshot(&self) -> Vec<Arc<RunRecord>> {
        self.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Arc<RunRecord>> {
        self.lock().front().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::sample_record;

    #[test]
    fn keeps_newest_first_and_evicts_oldest() {
        let history = RunHistory::new(2);
        for id in ["a", "b", "c"] {
            history.push(Arc::new(sample_record(id)));
        }
        let ids: Vec<String> = history.snapshot().iter().map(|r| r.run_id.clone()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(history.latest().map(|r| r.run_id.clone()), Some("c".to_string()));
    }

    #[test]
    fn zero_capacity_is_promoted() {
        let history = RunHistory::new(0);
        assert!(history.is_empty());
        history.push(Arc::new(sample_record("x")));
        history.push(Arc::new(sample_record("y")));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn concurrent_pushes_are_not_lost() {
        let history = Arc::new(RunHistory::new(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let history = Arc::clone(&history);
                std::thread::spawn(move || {
                    for i in 0..8 {
                        history.push(Arc::new(sample_record(&format!("{t}-{i}"))));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        assert_eq!(history.len(), 64);

        let small = Arc::new(RunHistory::new(5));
        std::thread::scope(|scope| {
            for t in 0..4 {
                let small = Arc::clone(&small);
                scope.spawn(move || {
                    for i in 0..10 {
                        small.push(Arc::new(sample_record(&format!("{t}-{i}"))));
                    }
                });
            }
        });
        assert_eq!(small.len(), 5);
    }
}
