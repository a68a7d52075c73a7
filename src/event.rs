//! Priority-ordered event queue driving the yearly update pipeline.
//!
//! Events are ordered by `(year, priority)`; events with the same key run in
//! the order they were added, so a schedule always replays identically.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// Ordering key of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventTime {
    pub year: i32,
    pub priority: u32,
}

impl EventTime {
    pub fn new(year: i32, priority: u32) -> Self {
        Self { year, priority }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.year, self.priority)
    }
}

/// A scheduled command.
#[derive(Clone, Debug)]
pub struct Event<C> {
    pub time: EventTime,
    pub command: C,
    seq: u64,
}

impl<C> Event<C> {
    /// Insertion sequence number, used to break ties.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<C> PartialEq for Event<C> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<C> Eq for Event<C> {}

impl<C> PartialOrd for Event<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so that `BinaryHeap` (a max-heap) pops the earliest event first.
impl<C> Ord for Event<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-priority queue of events.
#[derive(Debug)]
pub struct EventQueue<C> {
    heap: BinaryHeap<Event<C>>,
    next_seq: u64,
}

impl<C> Default for EventQueue<C> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<C> EventQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a command.
    pub fn add(&mut self, time: EventTime, command: C) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Event { time, command, seq });
    }

    /// Drop every pending event.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The next event to run, if any.
    pub fn peek(&self) -> Option<&Event<C>> {
        self.heap.peek()
    }

    /// Pop the next event if `accept` allows it.
    pub fn pop_if<F>(&mut self, accept: F) -> Option<Event<C>>
    where
        F: FnOnce(&Event<C>) -> bool,
    {
        match self.heap.peek() {
            Some(next) if accept(next) => self.heap.pop(),
            _ => None,
        }
    }

    /// Pop and execute events until the queue is empty or `keep_going` rejects
    /// the next one. Returns the number of events executed.
    pub fn run<P, X, E>(&mut self, mut keep_going: P, mut execute: X) -> Result<usize, E>
    where
        P: FnMut(&Event<C>) -> bool,
        X: FnMut(Event<C>) -> Result<(), E>,
    {
        let mut executed = 0;
        while let Some(event) = self.pop_if(&mut keep_going) {
            execute(event)?;
            executed += 1;
        }
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut EventQueue<&'static str>) -> Vec<&'static str> {
        let mut order = Vec::new();
        queue
            .run(
                |_| true,
                |event| {
                    order.push(event.command);
                    Ok::<(), ()>(())
                },
            )
            .unwrap();
        order
    }

    #[test]
    fn test_priority_within_year() {
        let mut queue = EventQueue::new();
        queue.add(EventTime::new(5, 100), "late");
        queue.add(EventTime::new(5, 50), "early");

        assert_eq!(drain(&mut queue), vec!["early", "late"]);
    }

    #[test]
    fn test_year_dominates_priority() {
        let mut queue = EventQueue::new();
        queue.add(EventTime::new(5, 0), "year5");
        queue.add(EventTime::new(4, 999), "year4");

        assert_eq!(drain(&mut queue), vec!["year4", "year5"]);
    }

    #[test]
    fn test_ties_run_in_insertion_order() {
        let mut queue = EventQueue::new();
        for name in ["a", "b", "c", "d"] {
            queue.add(EventTime::new(1, 10), name);
        }
        assert_eq!(drain(&mut queue), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_run_stops_at_rejected_event() {
        let mut queue = EventQueue::new();
        queue.add(EventTime::new(1, 10), "work");
        queue.add(EventTime::new(1, 20), "pause");
        queue.add(EventTime::new(2, 10), "next-year");

        let mut seen = Vec::new();
        let executed = queue
            .run(
                |event| event.command != "pause",
                |event| {
                    seen.push(event.command);
                    Ok::<(), ()>(())
                },
            )
            .unwrap();

        assert_eq!(executed, 1);
        assert_eq!(seen, vec!["work"]);
        assert_eq!(queue.peek().map(|e| e.command), Some("pause"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_run_propagates_errors() {
        let mut queue = EventQueue::new();
        queue.add(EventTime::new(1, 1), "ok");
        queue.add(EventTime::new(1, 2), "boom");
        queue.add(EventTime::new(1, 3), "never");

        let result = queue.run(
            |_| true,
            |event| if event.command == "boom" { Err("failed") } else { Ok(()) },
        );
        assert_eq!(result, Err("failed"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut queue = EventQueue::new();
        queue.add(EventTime::new(1, 1), "x");
        queue.clear();
        assert!(queue.is_empty());
    }
}
