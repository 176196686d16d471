// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered in-memory queue of events waiting to be sent.

use std::collections::VecDeque;

use cubecraft_analytics_core::Event;
use parking_lot::Mutex;

/// FIFO of pending events.
///
/// Events only leave through [`EventBuffer::drain`] and only come back, in
/// their original order, through [`EventBuffer::requeue_front`]. The buffer is
/// unbounded.
#[derive(Debug, Default)]
pub struct EventBuffer {
	events: Mutex<VecDeque<Event>>,
}

impl EventBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an event and returns the new length.
	pub fn enqueue(&self, event: Event) -> usize {
		let mut events = self.events.lock();
		events.push_back(event);
		events.len()
	}

	/// Removes and returns up to `max` events from the front.
	pub fn drain(&self, max: usize) -> Vec<Event> {
		let mut events = self.events.lock();
		let count = max.min(events.len());
		events.drain(..count).collect()
	}

	/// Puts events back at the front, ahead of anything enqueued since they
	/// were drained.
	pub fn requeue_front(&self, drained: Vec<Event>) {
		let mut events = self.events.lock();
		for event in drained.into_iter().rev() {
			events.push_front(event);
		}
	}

	pub fn len(&self) -> usize {
		self.events.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.lock().is_empty()
	}

	pub fn snapshot(&self) -> Vec<Event> {
		self.events.lock().iter().cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use cubecraft_analytics_core::{EventType, Properties};
	use proptest::prelude::*;

	fn event(name: &str) -> Event {
		Event {
			event_type: EventType::Click,
			event_name: name.to_string(),
			session_id: "s".to_string(),
			anonymous_id: "a".to_string(),
			user_id: None,
			client_timestamp: Utc::now(),
			page_url: "/".to_string(),
			page_title: String::new(),
			referrer: None,
			properties: Properties::new(),
			product_id: None,
			product_name: None,
			product_category: None,
			product_price: None,
			quantity: None,
			cart_value: None,
			currency: None,
		}
	}

	fn names(events: &[Event]) -> Vec<String> {
		events.iter().map(|e| e.event_name.clone()).collect()
	}

	#[test]
	fn enqueue_reports_length() {
		let buffer = EventBuffer::new();
		assert_eq!(buffer.enqueue(event("a")), 1);
		assert_eq!(buffer.enqueue(event("b")), 2);
		assert_eq!(buffer.len(), 2);
	}

	#[test]
	fn drain_takes_from_front_up_to_max() {
		let buffer = EventBuffer::new();
		for name in ["a", "b", "c"] {
			buffer.enqueue(event(name));
		}
		assert_eq!(names(&buffer.drain(2)), ["a", "b"]);
		assert_eq!(names(&buffer.snapshot()), ["c"]);
		assert_eq!(names(&buffer.drain(10)), ["c"]);
		assert!(buffer.drain(10).is_empty());
	}

	#[test]
	fn requeue_goes_ahead_of_newer_events() {
		let buffer = EventBuffer::new();
		buffer.enqueue(event("a"));
		buffer.enqueue(event("b"));
		let drained = buffer.drain(10);

		buffer.enqueue(event("c"));
		buffer.requeue_front(drained);

		assert_eq!(names(&buffer.snapshot()), ["a", "b", "c"]);
	}

	#[test]
	fn concurrent_producers_keep_per_thread_order() {
		let buffer = std::sync::Arc::new(EventBuffer::new());
		let producers: Vec<_> = (0..4)
			.map(|t| {
				let buffer = std::sync::Arc::clone(&buffer);
				std::thread::spawn(move || {
					for i in 0..50 {
						buffer.enqueue(event(&format!("t{t}-{i}")));
					}
				})
			})
			.collect();
		for producer in producers {
			producer.join().unwrap();
		}

		let queued = names(&buffer.drain(usize::MAX));
		assert_eq!(queued.len(), 200);
		for t in 0..4 {
			let prefix = format!("t{t}-");
			let own: Vec<&String> = queued.iter().filter(|n| n.starts_with(&prefix)).collect();
			let expected: Vec<String> = (0..50).map(|i| format!("t{t}-{i}")).collect();
			assert_eq!(own, expected.iter().collect::<Vec<_>>());
		}
	}

	proptest! {
		#[test]
		fn drain_then_requeue_preserves_order(
			count in 0usize..40,
			take in 0usize..40,
			later in 0usize..5,
		) {
			let buffer = EventBuffer::new();
			let original: Vec<String> = (0..count).map(|i| format!("e{i}")).collect();
			for name in &original {
				buffer.enqueue(event(name));
			}

			let drained = buffer.drain(take);
			prop_assert_eq!(drained.len(), take.min(count));

			let extra: Vec<String> = (0..later).map(|i| format!("late{i}")).collect();
			for name in &extra {
				buffer.enqueue(event(name));
			}
			buffer.requeue_front(drained);

			let mut expected = original.clone();
			expected.extend(extra);
			prop_assert_eq!(names(&buffer.snapshot()), expected);
		}
	}
}
