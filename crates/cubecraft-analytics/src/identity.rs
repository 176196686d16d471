// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anonymous visitor id, session id and the optional known user id.
//!
//! The anonymous id lives in the durable store and is created once. The session
//! id lives in the session store together with its start time and is replaced
//! once it is older than the session timeout. Expiry is evaluated lazily when
//! the id is read; nothing runs in the background.
//!
//! When storage fails the ids fall back to in-memory values for the lifetime of
//! this store, and a warning is logged. Tracking never fails because of it.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{duration_millis, elapsed_millis, SharedClock};
use crate::storage::{SharedStore, StorageError};

pub const ANONYMOUS_ID_KEY: &str = "analytics_anonymous_id";
pub const SESSION_ID_KEY: &str = "analytics_session_id";
pub const SESSION_START_KEY: &str = "analytics_session_start";

#[derive(Debug, Default)]
struct SessionState {
	/// Set once the session store has failed; from then on `ephemeral` is used.
	degraded: bool,
	ephemeral: Option<(String, DateTime<Utc>)>,
}

#[derive(Debug)]
pub struct IdentityStore {
	durable: SharedStore,
	session: SharedStore,
	clock: SharedClock,
	anonymous_id: OnceLock<String>,
	session_state: Mutex<SessionState>,
	user_id: RwLock<Option<String>>,
	last_activity: Mutex<DateTime<Utc>>,
}

fn new_id() -> String {
	Uuid::new_v4().to_string()
}

fn is_live(start: DateTime<Utc>, now: DateTime<Utc>, timeout: Duration) -> bool {
	elapsed_millis(start, now) < duration_millis(timeout)
}

impl IdentityStore {
	pub fn new(durable: SharedStore, session: SharedStore, clock: SharedClock) -> Self {
		let now = clock.now();
		Self {
			durable,
			session,
			clock,
			anonymous_id: OnceLock::new(),
			session_state: Mutex::new(SessionState::default()),
			user_id: RwLock::new(None),
			last_activity: Mutex::new(now),
		}
	}

	/// Returns the persisted anonymous id, creating and persisting one on first use.
	pub fn get_or_create_anonymous_id(&self) -> String {
		self
			.anonymous_id
			.get_or_init(|| self.load_or_create_anonymous_id())
			.clone()
	}

	fn load_or_create_anonymous_id(&self) -> String {
		match self.durable.get(ANONYMOUS_ID_KEY) {
			Ok(Some(id)) if !id.is_empty() => {
				debug!(anonymous_id = %id, "loaded anonymous id");
				id
			}
			Ok(_) => {
				let id = new_id();
				match self.durable.set(ANONYMOUS_ID_KEY, &id) {
					Ok(()) => info!(anonymous_id = %id, "created anonymous id"),
					Err(e) => {
						warn!(error = %e, "failed to persist anonymous id, using an in-memory id")
					}
				}
				id
			}
			Err(e) => {
				warn!(error = %e, "durable storage unavailable, using an in-memory anonymous id");
				new_id()
			}
		}
	}

	/// Returns the live session id, starting a new session if there is none or
	/// the stored one is at least `timeout` old.
	pub fn get_or_create_session_id(&self, timeout: Duration) -> String {
		let now = self.clock.now();
		let mut state = self.session_state.lock();

		if state.degraded {
			return Self::ephemeral_session_id(&mut state, now, timeout);
		}

		match self.read_session() {
			Ok(Some((id, start))) if is_live(start, now, timeout) => return id,
			Ok(Some((id, _))) => debug!(expired_session_id = %id, "analytics session expired"),
			Ok(None) => {}
			Err(e) => {
				warn!(error = %e, "session storage unavailable, using an in-memory session");
				state.degraded = true;
				return Self::ephemeral_session_id(&mut state, now, timeout);
			}
		}

		let id = new_id();
		if let Err(e) = self.write_session(&id, now) {
			warn!(error = %e, "failed to persist session, using an in-memory session");
			state.degraded = true;
			state.ephemeral = Some((id.clone(), now));
		} else {
			info!(session_id = %id, "started analytics session");
		}
		id
	}

	fn ephemeral_session_id(
		state: &mut SessionState,
		now: DateTime<Utc>,
		timeout: Duration,
	) -> String {
		if let Some((id, start)) = &state.ephemeral {
			if is_live(*start, now, timeout) {
				return id.clone();
			}
		}
		let id = new_id();
		state.ephemeral = Some((id.clone(), now));
		info!(session_id = %id, "started in-memory analytics session");
		id
	}

	fn read_session(&self) -> Result<Option<(String, DateTime<Utc>)>, StorageError> {
		let Some(id) = self.session.get(SESSION_ID_KEY)? else {
			return Ok(None);
		};
		let Some(start) = self.session.get(SESSION_START_KEY)? else {
			return Ok(None);
		};

		let start = start
			.parse::<i64>()
			.ok()
			.and_then(|ms| Utc.timestamp_millis_opt(ms).single());

		Ok(start.filter(|_| !id.is_empty()).map(|start| (id, start)))
	}

	fn write_session(&self, id: &str, start: DateTime<Utc>) -> Result<(), StorageError> {
		self.session.set(SESSION_ID_KEY, id)?;
		self
			.session
			.set(SESSION_START_KEY, &start.timestamp_millis().to_string())
	}

	pub fn user_id(&self) -> Option<String> {
		self.user_id.read().clone()
	}

	/// Sets or clears the known user id. Does not touch the anonymous or session id.
	pub fn set_user_id(&self, user_id: Option<String>) {
		debug!(has_user_id = user_id.is_some(), "analytics user id changed");
		*self.user_id.write() = user_id;
	}

	pub fn record_activity(&self) {
		let now = self.clock.now();
		*self.last_activity.lock() = now;
	}

	pub fn last_activity(&self) -> DateTime<Utc> {
		*self.last_activity.lock()
	}

	/// Time since the last recorded user activity.
	pub fn idle_duration(&self) -> Duration {
		let idle = elapsed_millis(self.last_activity(), self.clock.now());
		Duration::from_millis(u64::try_from(idle).unwrap_or(0))
	}

	pub fn now(&self) -> DateTime<Utc> {
		self.clock.now()
	}
}
