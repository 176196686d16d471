// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wall-clock source, swappable for simulated time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync + std::fmt::Debug {
	fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Mutex::new(start),
		}
	}

	pub fn starting_now() -> Self {
		Self::new(Utc::now())
	}

	pub fn set(&self, now: DateTime<Utc>) {
		*self.now.lock() = now;
	}

	pub fn advance(&self, by: chrono::Duration) {
		let mut now = self.now.lock();
		*now += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock()
	}
}

/// Milliseconds from `earlier` to `later`; negative if the clock went backwards.
pub(crate) fn elapsed_millis(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
	(later - earlier).num_milliseconds()
}

/// `std::time::Duration` as whole milliseconds, saturating.
pub(crate) fn duration_millis(duration: std::time::Duration) -> i64 {
	i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
