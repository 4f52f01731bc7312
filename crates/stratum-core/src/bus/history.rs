//! Bounded FIFO record of every send attempt.

use std::collections::VecDeque;
use std::sync::Arc;

use stratum_types::message::LayerMessage;

/// Append-only history capped at a fixed number of entries.
///
/// Entries are kept in `send` call order. Each push past the cap evicts
/// exactly the oldest entry.
#[derive(Debug)]
pub struct HistoryLog {
    entries: VecDeque<Arc<LayerMessage>>,
    capacity: usize,
}

impl HistoryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn push(&mut self, message: Arc<LayerMessage>) {
        self.entries.push_back(message);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Up to `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Arc<LayerMessage>> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.range(start..).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_types::message::kind;

    fn msg(content: &str) -> Arc<LayerMessage> {
        Arc::new(LayerMessage::new("basic", "reflective", kind::PERCEPTION, content, 0.1))
    }

    #[test]
    fn recent_on_empty_history_is_empty() {
        let history = HistoryLog::new(10);
        assert!(history.is_empty());
        assert!(history.recent(5).is_empty());
    }

    #[test]
    fn recent_returns_newest_in_arrival_order() {
        let mut history = HistoryLog::new(10);
        for c in ["a", "b", "c", "d"] {
            history.push(msg(c));
        }

        let recent: Vec<_> = history.recent(2).iter().map(|m| m.content.clone()).collect();
        assert_eq!(recent, vec!["c", "d"]);

        let all: Vec<_> = history.recent(99).iter().map(|m| m.content.clone()).collect();
        assert_eq!(all, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn entry_past_capacity_evicts_the_oldest() {
        let mut history = HistoryLog::new(3);
        for c in ["1", "2", "3"] {
            history.push(msg(c));
        }
        assert_eq!(history.len(), 3);

        history.push(msg("4"));
        assert_eq!(history.len(), 3);
        let contents: Vec<_> = history.recent(3).iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["2", "3", "4"]);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut history = HistoryLog::new(5);
        for i in 0..50 {
            history.push(msg(&i.to_string()));
            assert!(history.len() <= history.capacity());
        }
        assert_eq!(history.recent(1)[0].content, "49");
    }
}
