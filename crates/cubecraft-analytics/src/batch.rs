// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event batching and background flush for the analytics SDK.
//!
//! A flush is split in two halves. [`BatchFlusher::begin_flush`] runs
//! synchronously: it checks connectivity, takes the in-flight guard and drains
//! up to one batch from the buffer. The returned [`PendingFlush`] then performs
//! the network send. On failure, or if the send is dropped before it settles,
//! the drained events go back to the front of the buffer.
//!
//! A critical or batch-full trigger that lands while a send is in flight is
//! remembered, and a background flush starts as soon as that send succeeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cubecraft_analytics_core::Event;
use cubecraft_common_http::RetryableError;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::buffer::EventBuffer;
use crate::transport::SharedTransport;

/// Configuration for the event batch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
	/// Buffer length that triggers an immediate flush, and the most events
	/// sent in one request.
	pub batch_size: usize,
	/// Interval between automatic flushes.
	pub flush_interval: Duration,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			batch_size: 10,
			flush_interval: Duration::from_secs(5),
		}
	}
}

/// What a flush attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
	/// This many events were accepted by the server.
	Sent(usize),
	/// The send failed and this many events went back to the buffer.
	Requeued(usize),
	/// Nothing was queued.
	Empty,
	/// Skipped because the client is offline.
	Offline,
	/// Skipped because another flush is still in flight.
	InProgress,
}

enum FlushStart {
	Started(PendingFlush),
	Skipped(FlushOutcome),
}

pub struct BatchFlusher {
	config: BatchConfig,
	buffer: Arc<EventBuffer>,
	transport: SharedTransport,
	runtime: Handle,
	in_flight: AtomicBool,
	flush_requested: AtomicBool,
	online: AtomicBool,
	shutdown: AtomicBool,
	shutdown_notify: Notify,
	idle_notify: Notify,
}

impl std::fmt::Debug for BatchFlusher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BatchFlusher")
			.field("config", &self.config)
			.field("queued", &self.buffer.len())
			.field("in_flight", &self.is_flushing())
			.field("online", &self.is_online())
			.finish_non_exhaustive()
	}
}

impl BatchFlusher {
	pub fn new(
		config: BatchConfig,
		buffer: Arc<EventBuffer>,
		transport: SharedTransport,
		runtime: Handle,
	) -> Self {
		Self {
			config,
			buffer,
			transport,
			runtime,
			in_flight: AtomicBool::new(false),
			flush_requested: AtomicBool::new(false),
			online: AtomicBool::new(true),
			shutdown: AtomicBool::new(false),
			shutdown_notify: Notify::new(),
			idle_notify: Notify::new(),
		}
	}

	pub fn config(&self) -> &BatchConfig {
		&self.config
	}

	pub fn buffer(&self) -> &Arc<EventBuffer> {
		&self.buffer
	}

	/// Queues an event, starting a background flush when the batch is full or
	/// the event is critical.
	pub fn enqueue(self: &Arc<Self>, event: Event) {
		let critical = event.event_type.is_critical();
		let event_type = event.event_type.clone();
		let queued = self.buffer.enqueue(event);

		if critical {
			debug!(event_type = %event_type, queued, "critical event queued, flushing now");
			self.request_flush();
		} else if queued >= self.config.batch_size {
			debug!(queued, batch_size = self.config.batch_size, "batch full, flushing now");
			self.request_flush();
		}
	}

	/// Starts a background flush, or marks one as owed to the in-flight send.
	fn request_flush(self: &Arc<Self>) {
		if self.start_background() != Some(FlushOutcome::InProgress) {
			return;
		}
		self.flush_requested.store(true, Ordering::SeqCst);
		// The in-flight send may have released before the flag was set.
		if !self.is_flushing() {
			self.flush_in_background();
		}
	}

	fn begin_flush(self: &Arc<Self>) -> FlushStart {
		if !self.is_online() {
			debug!(queued = self.buffer.len(), "offline, skipping analytics flush");
			return FlushStart::Skipped(FlushOutcome::Offline);
		}

		if self.in_flight.swap(true, Ordering::SeqCst) {
			return FlushStart::Skipped(FlushOutcome::InProgress);
		}

		let events = self.buffer.drain(self.config.batch_size);
		if events.is_empty() {
			self.release(Release::Idle);
			return FlushStart::Skipped(FlushOutcome::Empty);
		}

		FlushStart::Started(PendingFlush {
			flusher: Arc::clone(self),
			events,
			settled: false,
			background: false,
		})
	}

	fn release(self: &Arc<Self>, how: Release) {
		self.in_flight.store(false, Ordering::SeqCst);
		self.idle_notify.notify_waiters();

		if how == Release::Failed || self.is_shutdown() || !self.is_online() {
			return;
		}

		let requested = self.flush_requested.swap(false, Ordering::SeqCst);
		let backlog =
			how == Release::SentInBackground && self.buffer.len() >= self.config.batch_size;
		if requested || backlog {
			debug!(
				queued = self.buffer.len(),
				requested, "send settled with a flush pending, flushing again"
			);
			self.flush_in_background();
		}
	}

	/// Sends up to one batch and waits for the result.
	pub async fn flush(self: &Arc<Self>) -> FlushOutcome {
		match self.begin_flush() {
			FlushStart::Started(pending) => pending.deliver().await,
			FlushStart::Skipped(outcome) => outcome,
		}
	}

	/// Drains one batch now and sends it on the runtime without waiting.
	pub fn flush_in_background(self: &Arc<Self>) {
		self.start_background();
	}

	fn start_background(self: &Arc<Self>) -> Option<FlushOutcome> {
		match self.begin_flush() {
			FlushStart::Started(mut pending) => {
				pending.background = true;
				self.runtime.spawn(pending.deliver());
				None
			}
			FlushStart::Skipped(outcome) => Some(outcome),
		}
	}

	/// Flushes batch after batch until the buffer is empty or a send fails.
	///
	/// Waits for an in-flight flush to settle first so its events are not
	/// skipped.
	pub async fn flush_all(self: &Arc<Self>) -> FlushOutcome {
		let mut sent = 0;
		loop {
			self.wait_idle().await;
			match self.flush().await {
				FlushOutcome::Sent(count) => sent += count,
				FlushOutcome::Empty if sent > 0 => return FlushOutcome::Sent(sent),
				FlushOutcome::InProgress => continue,
				other => return other,
			}
		}
	}

	async fn wait_idle(&self) {
		loop {
			let idle = self.idle_notify.notified();
			if !self.is_flushing() {
				return;
			}
			idle.await;
		}
	}

	/// Updates connectivity. Coming back online flushes straight away.
	pub fn set_online(self: &Arc<Self>, online: bool) {
		let was_online = self.online.swap(online, Ordering::SeqCst);
		if online && !was_online {
			info!(queued = self.buffer.len(), "connectivity restored, flushing analytics");
			self.flush_in_background();
		} else if !online && was_online {
			info!("connectivity lost, analytics will queue locally");
		}
	}

	pub fn is_online(&self) -> bool {
		self.online.load(Ordering::SeqCst)
	}

	pub fn is_flushing(&self) -> bool {
		self.in_flight.load(Ordering::SeqCst)
	}

	pub fn queued_len(&self) -> usize {
		self.buffer.len()
	}

	/// Stops the timer loop started by [`BatchFlusher::run`].
	pub fn shutdown(&self) {
		self.shutdown.store(true, Ordering::SeqCst);
		self.shutdown_notify.notify_one();
	}

	pub fn is_shutdown(&self) -> bool {
		self.shutdown.load(Ordering::SeqCst)
	}

	/// Runs the periodic flush timer until [`BatchFlusher::shutdown`].
	///
	/// Each tick starts a background flush, so a slow request never delays the
	/// next tick.
	pub async fn run(self: Arc<Self>) {
		info!(
			flush_interval_ms = self.config.flush_interval.as_millis() as u64,
			batch_size = self.config.batch_size,
			"starting analytics flush timer"
		);

		let mut interval = tokio::time::interval(self.config.flush_interval);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		interval.tick().await;

		loop {
			tokio::select! {
				_ = interval.tick() => {
					if self.is_shutdown() {
						break;
					}
					if !self.buffer.is_empty() {
						self.flush_in_background();
					}
				}
				_ = self.shutdown_notify.notified() => break,
			}
		}

		info!("analytics flush timer stopped");
	}
}

/// A drained batch that has not been delivered yet.
///
/// Holds the in-flight guard; dropping it releases the guard and, unless the
/// send settled, puts the events back.
pub(crate) struct PendingFlush {
	flusher: Arc<BatchFlusher>,
	events: Vec<Event>,
	settled: bool,
	background: bool,
}

/// How an in-flight guard was given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
	/// Nothing was drained, or the send succeeded on an awaited flush.
	Idle,
	SentInBackground,
	Failed,
}

impl PendingFlush {
	async fn deliver(mut self) -> FlushOutcome {
		let count = self.events.len();
		let transport = Arc::clone(&self.flusher.transport);

		let result = match self.events.as_slice() {
			[event] => transport.send_event(event).await,
			events => transport.send_batch(events).await,
		};

		match result {
			Ok(()) => {
				debug!(count, "flushed analytics events");
				self.settled = true;
				FlushOutcome::Sent(count)
			}
			Err(e) => {
				warn!(
					error = %e,
					count,
					retryable = e.is_retryable(),
					"failed to send analytics events, requeueing"
				);
				FlushOutcome::Requeued(count)
			}
		}
	}
}

impl Drop for PendingFlush {
	fn drop(&mut self) {
		let release = if !self.settled {
			if !self.events.is_empty() {
				self
					.flusher
					.buffer
					.requeue_front(std::mem::take(&mut self.events));
			}
			Release::Failed
		} else if self.background {
			Release::SentInBackground
		} else {
			Release::Idle
		};
		self.flusher.release(release);
	}
}
