// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page lifecycle signals: load, route changes, visibility, activity and unload.
//!
//! The host forwards what it observes; the tracker turns it into page views,
//! time-on-page engagement events and activity timestamps.

use chrono::{DateTime, Utc};
use cubecraft_analytics_core::{EventData, EventType};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::client::AnalyticsClient;
use crate::clock::elapsed_millis;

/// Seconds on a page must exceed this before an engagement event is sent.
const TIME_ON_PAGE_FLOOR_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
	Visible,
	Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
	Click,
	Scroll,
	KeyDown,
	Touch,
}

/// Navigation timestamps in milliseconds on a common origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationTiming {
	pub navigation_start_ms: f64,
	pub load_event_end_ms: f64,
}

impl NavigationTiming {
	pub fn new(navigation_start_ms: f64, load_event_end_ms: f64) -> Self {
		Self {
			navigation_start_ms,
			load_event_end_ms,
		}
	}

	pub fn load_time_ms(&self) -> u64 {
		let ms = (self.load_event_end_ms - self.navigation_start_ms).round();
		if ms.is_finite() && ms > 0.0 {
			ms as u64
		} else {
			0
		}
	}
}

#[derive(Debug)]
pub(crate) struct LifecycleState {
	visible_since: Option<DateTime<Utc>>,
	pending_route: Option<JoinHandle<()>>,
}

impl LifecycleState {
	pub(crate) fn new(now: DateTime<Utc>) -> Self {
		Self {
			visible_since: Some(now),
			pending_route: None,
		}
	}

	pub(crate) fn take_pending_route(&mut self) -> Option<JoinHandle<()>> {
		self.pending_route.take()
	}
}

impl Drop for LifecycleState {
	fn drop(&mut self) {
		if let Some(task) = self.take_pending_route() {
			task.abort();
		}
	}
}

/// Handle for forwarding page lifecycle signals to a client.
#[derive(Debug, Clone)]
pub struct PageLifecycle {
	client: AnalyticsClient,
}

impl PageLifecycle {
	pub(crate) fn new(client: AnalyticsClient) -> Self {
		Self { client }
	}

	/// Initial hard load: one page view with load time and viewport.
	pub fn on_load(&self, timing: NavigationTiming) {
		let page = self.client.page();
		let mut data = page.page_view_data().with_load_time_ms(timing.load_time_ms());
		if let Some(viewport) = page.viewport {
			data = data.with_viewport(viewport.width, viewport.height);
		}
		debug!(page_url = %data.page_url, load_time_ms = ?data.load_time_ms, "page loaded");
		self.client.track_page_view(data);
	}

	/// Client-side navigation. The page view is sent after the settle delay so
	/// that a title set in the meantime is picked up; a newer route change
	/// replaces a still pending one.
	pub fn on_route_change(&self, url: impl Into<String>) {
		let url = url.into();
		debug!(page_url = %url, "route changed");
		self.client.update_page(|page| page.url = url);

		let delay = self.client.config().route_settle_delay;
		let client = self.client.clone();
		let task = self.client.runtime().spawn(async move {
			tokio::time::sleep(delay).await;
			client.track_page_view(client.page().page_view_data());
		});

		let superseded = self
			.client
			.with_lifecycle(|state| state.pending_route.replace(task));
		if let Some(previous) = superseded {
			if !previous.is_finished() {
				debug!("superseded pending route page view");
			}
			previous.abort();
		}
	}

	pub fn set_title(&self, title: impl Into<String>) {
		let title = title.into();
		self.client.update_page(|page| page.title = title);
	}

	pub fn on_visibility_change(&self, visibility: Visibility) {
		match visibility {
			Visibility::Visible => {
				let now = self.client.identity().now();
				self
					.client
					.with_lifecycle(|state| state.visible_since = Some(now));
				self.client.identity().record_activity();
			}
			Visibility::Hidden => {
				self.emit_time_on_page();
			}
		}
	}

	pub fn on_user_activity(&self, kind: ActivityKind) {
		trace!(?kind, "user activity");
		self.client.identity().record_activity();
	}

	pub fn on_connectivity_change(&self, online: bool) {
		self.client.set_online(online);
	}

	/// Page teardown: time on page, then a best-effort flush that is not awaited.
	pub fn on_unload(&self) {
		self.emit_time_on_page();
		self.client.flush_in_background();
	}

	/// Ends the current visible span and sends its engagement event if it was
	/// long enough. Returns the whole seconds sent.
	pub(crate) fn emit_time_on_page(&self) -> Option<u64> {
		let started = self
			.client
			.with_lifecycle(|state| state.visible_since.take())?;

		let elapsed_ms = elapsed_millis(started, self.client.identity().now()).max(0);
		let seconds = (elapsed_ms as f64 / 1000.0).round() as u64;
		if seconds <= TIME_ON_PAGE_FLOOR_SECS {
			trace!(seconds, "time on page below noise floor");
			return None;
		}

		let page_url = self.client.page().url;
		self.client.track(
			EventData::new(EventType::Engagement, "Time on Page")
				.with_property("time_spent_seconds", seconds)
				.with_property("page_url", page_url),
		);
		Some(seconds)
	}
}
