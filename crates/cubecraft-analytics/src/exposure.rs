// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Experiment exposure tracking, at most once per experiment variation.
//!
//! A flag integration calls [`ExposureTracker::track_exposure`] (directly or
//! through [`ExposureHook`]) once it knows which variation a visitor got. The
//! tracker sends one experiment assignment per `experiment_id-variation_id`
//! key and skips repeats until [`ExposureTracker::reset`].
//!
//! Whether an exposure fires as soon as the decision arrives or only once the
//! experiment's element is on screen is the caller's choice; see
//! [`ExposureWatcher`].
//!
//! # Example
//!
//! ```ignore
//! use cubecraft_analytics::{ExposureData, ExposureStrategy, ExposureTracker, ExposureWatcher};
//!
//! let tracker = Arc::new(ExposureTracker::new(client.clone()));
//! let mut watcher = ExposureWatcher::new(
//!     tracker,
//!     ExposureData::new("checkout-button", "green"),
//!     ExposureStrategy::default(),
//! );
//! watcher.start();
//! // later, from the host's visibility observer
//! watcher.on_visibility(0.75);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use cubecraft_analytics_core::FlagEvaluation;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::client::AnalyticsClient;

pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.5;

/// One experiment variation a visitor was exposed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureData {
	pub experiment_id: String,
	pub variation_id: String,
	pub experiment_name: Option<String>,
	pub variation_name: Option<String>,
}

impl ExposureData {
	pub fn new(experiment_id: impl Into<String>, variation_id: impl Into<String>) -> Self {
		Self {
			experiment_id: experiment_id.into(),
			variation_id: variation_id.into(),
			experiment_name: None,
			variation_name: None,
		}
	}

	pub fn with_names(
		mut self,
		experiment_name: impl Into<String>,
		variation_name: impl Into<String>,
	) -> Self {
		self.experiment_name = Some(experiment_name.into());
		self.variation_name = Some(variation_name.into());
		self
	}

	/// Exposure for an evaluation that is part of an experiment, if it is.
	pub fn from_evaluation(evaluation: &FlagEvaluation) -> Option<Self> {
		let (experiment_id, variation_id) = evaluation.experiment()?;
		Some(Self {
			experiment_id: experiment_id.to_string(),
			variation_id: variation_id.to_string(),
			experiment_name: evaluation.experiment_name.clone(),
			variation_name: evaluation.variation_name.clone(),
		})
	}

	/// Dedup key: `experiment_id-variation_id`.
	pub fn key(&self) -> String {
		format!("{}-{}", self.experiment_id, self.variation_id)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureOutcome {
	/// Assignment send started and the key is now recorded.
	Dispatched,
	/// Key was already recorded; nothing sent.
	AlreadyTracked,
	/// Client could not send (offline or shut down); the key stays unrecorded.
	NotDispatched,
}

pub struct ExposureTracker {
	client: AnalyticsClient,
	tracked: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for ExposureTracker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ExposureTracker")
			.field("tracked", &self.tracked_count())
			.finish_non_exhaustive()
	}
}

impl ExposureTracker {
	pub fn new(client: AnalyticsClient) -> Self {
		Self {
			client,
			tracked: Mutex::new(HashSet::new()),
		}
	}

	pub fn track_exposure(&self, data: &ExposureData) -> ExposureOutcome {
		let key = data.key();
		let mut tracked = self.tracked.lock();

		if tracked.contains(&key) {
			debug!(key = %key, "experiment exposure already tracked, skipping");
			return ExposureOutcome::AlreadyTracked;
		}

		let dispatched = self.client.track_experiment_assignment(
			&data.experiment_id,
			&data.variation_id,
			data.experiment_name.as_deref(),
			data.variation_name.as_deref(),
		);
		if !dispatched {
			return ExposureOutcome::NotDispatched;
		}

		info!(
			experiment_id = %data.experiment_id,
			variation_id = %data.variation_id,
			"tracked experiment exposure"
		);
		tracked.insert(key);
		ExposureOutcome::Dispatched
	}

	pub fn is_tracked(&self, data: &ExposureData) -> bool {
		self.tracked.lock().contains(&data.key())
	}

	pub fn tracked_count(&self) -> usize {
		self.tracked.lock().len()
	}

	/// Forgets every recorded exposure.
	pub fn reset(&self) {
		let mut tracked = self.tracked.lock();
		debug!(cleared = tracked.len(), "resetting tracked experiment exposures");
		tracked.clear();
	}
}

/// Receives flag evaluation results from whatever flag system the host uses.
#[async_trait]
pub trait ExposureHook: Send + Sync + 'static {
	async fn on_flag_evaluated(&self, evaluation: &FlagEvaluation);
}

pub type SharedExposureHook = Arc<dyn ExposureHook>;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpExposureHook;

#[async_trait]
impl ExposureHook for NoOpExposureHook {
	async fn on_flag_evaluated(&self, _evaluation: &FlagEvaluation) {}
}

#[async_trait]
impl ExposureHook for ExposureTracker {
	async fn on_flag_evaluated(&self, evaluation: &FlagEvaluation) {
		if let Some(data) = ExposureData::from_evaluation(evaluation) {
			self.track_exposure(&data);
		}
	}
}

/// When a watched exposure counts as seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExposureStrategy {
	/// As soon as the variation is known.
	Immediate,
	/// Once at least `threshold` of the element is visible.
	OnVisible { threshold: f64 },
}

impl Default for ExposureStrategy {
	fn default() -> Self {
		ExposureStrategy::OnVisible {
			threshold: DEFAULT_VISIBILITY_THRESHOLD,
		}
	}
}

/// Fires one exposure under a strategy, then disconnects.
#[derive(Debug)]
pub struct ExposureWatcher {
	tracker: Arc<ExposureTracker>,
	data: ExposureData,
	strategy: ExposureStrategy,
	connected: bool,
}

impl ExposureWatcher {
	pub fn new(tracker: Arc<ExposureTracker>, data: ExposureData, strategy: ExposureStrategy) -> Self {
		Self {
			tracker,
			data,
			strategy,
			connected: true,
		}
	}

	/// Call when the variation becomes known.
	pub fn start(&mut self) -> Option<ExposureOutcome> {
		match self.strategy {
			ExposureStrategy::Immediate => self.fire(),
			ExposureStrategy::OnVisible { .. } => None,
		}
	}

	/// Call with the element's visible fraction in `0.0..=1.0`.
	pub fn on_visibility(&mut self, ratio: f64) -> Option<ExposureOutcome> {
		match self.strategy {
			ExposureStrategy::OnVisible { threshold } if ratio >= threshold => self.fire(),
			_ => None,
		}
	}

	pub fn is_connected(&self) -> bool {
		self.connected
	}

	fn fire(&mut self) -> Option<ExposureOutcome> {
		if !self.connected {
			return None;
		}
		let outcome = self.tracker.track_exposure(&self.data);
		if outcome != ExposureOutcome::NotDispatched {
			self.connected = false;
		}
		Some(outcome)
	}
}
