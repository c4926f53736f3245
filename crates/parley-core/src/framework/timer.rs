//! Deadline queue for managed listeners.
//!
//! One min-heap owned by the event loop replaces a timer task per listener.
//! A reset pushes a new entry with a higher generation instead of touching
//! the old one. The queue remembers the newest generation per listener, and
//! once stale entries outnumber live ones the heap is rebuilt without them.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tokio::time::Instant;

use crate::framework::listener::ListenerId;
use crate::framework::registry::TimerRequest;

/// Stale entries tolerated before compaction regardless of the live count.
const COMPACT_SLACK: usize = 32;

#[derive(Default)]
pub(crate) struct TimerQueue {
    heap: BinaryHeap<Reverse<(Instant, u64, ListenerId)>>,
    newest: HashMap<ListenerId, u64>,
}

impl TimerQueue {
    pub fn push(&mut self, request: TimerRequest) {
        let newest = self.newest.entry(request.id).or_insert(request.generation);
        *newest = (*newest).max(request.generation);
        self.heap
            .push(Reverse((request.deadline, request.generation, request.id)));

        if self.heap.len() > 2 * self.newest.len() + COMPACT_SLACK {
            self.compact();
        }
    }

    /// Drops every entry of a removed listener at the next compaction.
    pub fn forget(&mut self, id: ListenerId) {
        self.newest.remove(&id);
    }

    /// The earliest deadline, if any entry is queued.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse((deadline, _, _))| *deadline)
    }

    /// Removes and returns every entry due at `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TimerRequest> {
        let mut due = Vec::new();
        while let Some(Reverse((deadline, _, _))) = self.heap.peek() {
            if *deadline > now {
                break;
            }
            if let Some(Reverse((deadline, generation, id))) = self.heap.pop() {
                if self.newest.get(&id) == Some(&generation) {
                    self.newest.remove(&id);
                }
                due.push(TimerRequest {
                    id,
                    generation,
                    deadline,
                });
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    fn compact(&mut self) {
        let newest = &self.newest;
        self.heap
            .retain(|Reverse((_, generation, id))| newest.get(id) == Some(generation));
    }
}
