// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

/// Drives simulated storefront visitors through the analytics pipeline.
#[derive(Parser, Debug, Clone)]
#[command(name = "cubecraft-traffic-sim", version)]
pub struct Args {
	/// Analytics API base URL, overriding the config file and environment
	#[arg(long)]
	pub api_url: Option<String>,

	/// TOML file with analytics client settings
	#[arg(long, env = "CUBECRAFT_ANALYTICS_CONFIG")]
	pub config: Option<PathBuf>,

	/// Number of visitors browsing at the same time
	#[arg(long, env = "CUBECRAFT_SIM_CONCURRENT_VISITORS", default_value_t = 5)]
	pub concurrent_visitors: usize,

	/// Shortest visit, in seconds
	#[arg(long, env = "CUBECRAFT_SIM_SESSION_DURATION_MIN", default_value_t = 30)]
	pub session_duration_min: u64,

	/// Longest visit, in seconds
	#[arg(long, env = "CUBECRAFT_SIM_SESSION_DURATION_MAX", default_value_t = 120)]
	pub session_duration_max: u64,

	/// Shortest pause between two actions, in milliseconds
	#[arg(long, env = "CUBECRAFT_SIM_ACTION_DELAY_MIN_MS", default_value_t = 1000)]
	pub action_delay_min_ms: u64,

	/// Longest pause between two actions, in milliseconds
	#[arg(long, env = "CUBECRAFT_SIM_ACTION_DELAY_MAX_MS", default_value_t = 4000)]
	pub action_delay_max_ms: u64,

	/// Pause before a visitor slot starts its next visit, in milliseconds
	#[arg(long, env = "CUBECRAFT_SIM_RESTART_DELAY_MS", default_value_t = 2000)]
	pub restart_delay_ms: u64,

	/// Experiment to bucket visitors into (control/treatment)
	#[arg(long, env = "CUBECRAFT_SIM_EXPERIMENT_ID")]
	pub experiment_id: Option<String>,
}

impl Args {
	pub fn validate(&self) -> Result<()> {
		if self.concurrent_visitors == 0 {
			bail!("--concurrent-visitors must be at least 1");
		}
		if self.session_duration_min > self.session_duration_max {
			bail!(
				"--session-duration-min ({}) exceeds --session-duration-max ({})",
				self.session_duration_min,
				self.session_duration_max
			);
		}
		if self.action_delay_min_ms > self.action_delay_max_ms {
			bail!(
				"--action-delay-min-ms ({}) exceeds --action-delay-max-ms ({})",
				self.action_delay_min_ms,
				self.action_delay_max_ms
			);
		}
		Ok(())
	}

	pub fn session_duration(&self, rng: &mut fastrand::Rng) -> Duration {
		Duration::from_secs(rng.u64(self.session_duration_min..=self.session_duration_max))
	}

	pub fn action_delay(&self, rng: &mut fastrand::Rng) -> Duration {
		Duration::from_millis(rng.u64(self.action_delay_min_ms..=self.action_delay_max_ms))
	}

	pub fn restart_delay(&self) -> Duration {
		Duration::from_millis(self.restart_delay_ms)
	}
}
