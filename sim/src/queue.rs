//! The central event queue

use std::collections::{BTreeMap, HashMap};

use crate::clock::SimTime;
use crate::errors::{SimError, SimResult};

/// Handle to a scheduled event, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// Queue key: timestamp first, then insertion order for ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    time: SimTime,
    seq: u64,
}

/// A delivered event.
#[derive(Debug)]
pub struct Scheduled<T> {
    pub id: EventId,
    pub time: SimTime,
    pub node: u64,
    pub payload: T,
}

/// Time-ordered event queue with keyed cancellation.
#[derive(Debug, Default)]
pub struct EventQueue<T> {
    events: BTreeMap<Key, (u64, T)>,
    index: HashMap<EventId, Key>,
    next_seq: u64,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Schedule `payload` for `node` at time `at`.
    pub fn schedule(&mut self, at: SimTime, node: u64, payload: T) -> EventId {
        let id = EventId(self.next_seq);
        let key = Key {
            time: at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.events.insert(key, (node, payload));
        self.index.insert(id, key);
        id
    }

    /// Timestamp of the next event without removing it.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.events.keys().next().map(|k| k.time)
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<Scheduled<T>> {
        let key = *self.events.keys().next()?;
        let (node, payload) = self.events.remove(&key).expect("key just observed");
        let id = EventId(key.seq);
        self.index.remove(&id);
        Some(Scheduled {
            id,
            time: key.time,
            node,
            payload,
        })
    }

    /// Remove a pending event. Cancelling an event that is not queued is a
    /// logic error and surfaces as [`SimError::UnknownEvent`].
    pub fn cancel(&mut self, id: EventId) -> SimResult<T> {
        let key = self.index.remove(&id).ok_or(SimError::UnknownEvent(id))?;
        let (_, payload) = self
            .events
            .remove(&key)
            .expect("index and queue updated together");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule(SimTime(3.0), 0, "late");
        q.schedule(SimTime(1.0), 1, "early");
        q.schedule(SimTime(2.0), 2, "middle");

        let order: Vec<&str> = std::iter::from_fn(|| q.pop().map(|e| e.payload)).collect();
        assert_eq!(order, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_ties_resolve_by_insertion_order() {
        let mut q = EventQueue::new();
        q.schedule(SimTime(1.0), 0, "first");
        q.schedule(SimTime(1.0), 1, "second");
        q.schedule(SimTime(1.0), 2, "third");

        let order: Vec<&str> = std::iter::from_fn(|| q.pop().map(|e| e.payload)).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_cancel_removes_event() {
        let mut q = EventQueue::new();
        let keep = q.schedule(SimTime(1.0), 0, "keep");
        let drop = q.schedule(SimTime(2.0), 0, "drop");

        assert_eq!(q.cancel(drop).unwrap(), "drop");
        assert_eq!(q.len(), 1);

        let only = q.pop().unwrap();
        assert_eq!(only.id, keep);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_cancel_absent_event_is_error() {
        let mut q = EventQueue::new();
        let id = q.schedule(SimTime(1.0), 0, "x");
        q.pop().unwrap();
        assert_eq!(q.cancel(id), Err(SimError::UnknownEvent(id)));
    }

    #[test]
    fn test_pop_reports_node_and_time() {
        let mut q = EventQueue::new();
        q.schedule(SimTime(4.5), 7, "payload");
        let e = q.pop().unwrap();
        assert_eq!(e.node, 7);
        assert_eq!(e.time, SimTime(4.5));
    }
}
