// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Experiment exposure records and the flag-evaluation shape they come from.
//!
//! The pipeline does not talk to a flag vendor. Whatever evaluates flags hands
//! over a [`FlagEvaluation`]; when that evaluation carries experiment metadata
//! it turns into exactly one [`ExperimentAssignment`] per session and variation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /analytics/experiment-assignment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentAssignment {
	pub session_id: String,
	pub anonymous_id: String,
	pub user_id: Option<String>,
	pub experiment_id: String,
	pub variation_id: String,
	pub experiment_name: Option<String>,
	pub variation_name: Option<String>,
	pub client_timestamp: DateTime<Utc>,
}

/// Result of a feature-flag evaluation, reduced to what analytics needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagEvaluation {
	/// The decided value (boolean, variant string, JSON payload).
	#[serde(default)]
	pub value: serde_json::Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub experiment_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub variation_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub experiment_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub variation_name: Option<String>,
}

impl FlagEvaluation {
	pub fn new(value: impl Into<serde_json::Value>) -> Self {
		Self {
			value: value.into(),
			..Default::default()
		}
	}

	pub fn with_experiment(
		mut self,
		experiment_id: impl Into<String>,
		variation_id: impl Into<String>,
	) -> Self {
		self.experiment_id = Some(experiment_id.into());
		self.variation_id = Some(variation_id.into());
		self
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

	/// True for boolean `true` and for any variant other than `""` or `"off"`.
	pub fn is_enabled(&self) -> bool {
		match &self.value {
			serde_json::Value::Bool(b) => *b,
			serde_json::Value::String(s) => !s.is_empty() && s != "off",
			serde_json::Value::Null => false,
			_ => true,
		}
	}

	/// Experiment and variation ids, when the evaluation came from an experiment.
	pub fn experiment(&self) -> Option<(&str, &str)> {
		match (&self.experiment_id, &self.variation_id) {
			(Some(experiment_id), Some(variation_id)) => {
				Some((experiment_id.as_str(), variation_id.as_str()))
			}
			_ => None,
		}
	}
}
