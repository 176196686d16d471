// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod args;
mod catalog;
mod visitor;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cubecraft_analytics::{
	AnalyticsClient, AnalyticsConfig, ExposureTracker, HttpTransport, MemoryStore, PageContext,
	Viewport,
};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;
use visitor::Visitor;

const STATUS_INTERVAL: Duration = Duration::from_secs(30);

const VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1440, 900), (1366, 768), (390, 844), (412, 915)];

const USER_AGENTS: &[&str] = &[
	"Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
	"Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
	"Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
	"Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
];

#[derive(Debug, Default)]
struct Stats {
	active: AtomicUsize,
	sessions: AtomicU64,
	actions: AtomicU64,
	skipped: AtomicU64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let args = Args::parse();
	args.validate()?;

	let mut config = AnalyticsConfig::load(args.config.as_deref())
		.context("failed to load analytics configuration")?;
	if let Some(api_url) = &args.api_url {
		config.api_url = api_url.clone();
	}
	config.validate().context("invalid analytics configuration")?;

	info!(
		api_url = %config.api_url,
		visitors = args.concurrent_visitors,
		experiment_id = ?args.experiment_id,
		"starting traffic simulator"
	);

	let (stop_tx, stop_rx) = watch::channel(false);
	let stats = Arc::new(Stats::default());
	let args = Arc::new(args);
	let config = Arc::new(config);

	let mut slots = JoinSet::new();
	for slot in 0..args.concurrent_visitors {
		slots.spawn(run_slot(
			slot,
			Arc::clone(&args),
			Arc::clone(&config),
			Arc::clone(&stats),
			stop_rx.clone(),
		));
	}
	let status = tokio::spawn(report_status(Arc::clone(&stats), stop_rx));

	shutdown_signal().await;
	info!("received shutdown signal, waiting for visitors to leave");
	let _ = stop_tx.send(true);

	while let Some(result) = slots.join_next().await {
		if let Err(e) = result {
			error!(error = %e, "visitor slot panicked");
		}
	}
	status.abort();

	info!(
		sessions = stats.sessions.load(Ordering::Relaxed),
		actions = stats.actions.load(Ordering::Relaxed),
		skipped = stats.skipped.load(Ordering::Relaxed),
		"traffic simulator stopped"
	);
	Ok(())
}

async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{signal, SignalKind};

		match signal(SignalKind::terminate()) {
			Ok(mut terminate) => {
				tokio::select! {
					_ = tokio::signal::ctrl_c() => {}
					_ = terminate.recv() => {}
				}
				return;
			}
			Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
		}
	}

	if let Err(e) = tokio::signal::ctrl_c().await {
		error!(error = %e, "failed to listen for ctrl-c");
	}
}

/// Sleeps for `duration`. Returns `true` if a stop was requested meanwhile.
async fn pause(duration: Duration, stop: &mut watch::Receiver<bool>) -> bool {
	tokio::select! {
		_ = tokio::time::sleep(duration) => {}
		_ = stop.changed() => return true,
	}
	*stop.borrow()
}

async fn run_slot(
	slot: usize,
	args: Arc<Args>,
	config: Arc<AnalyticsConfig>,
	stats: Arc<Stats>,
	mut stop: watch::Receiver<bool>,
) {
	let mut rng = fastrand::Rng::new();
	loop {
		if *stop.borrow() {
			break;
		}
		if let Err(e) = run_visit(slot, &args, &config, &stats, &mut rng, &mut stop).await {
			warn!(slot, error = %e, "visit failed");
		}
		if pause(args.restart_delay(), &mut stop).await {
			break;
		}
	}
	debug!(slot, "visitor slot stopped");
}

async fn run_visit(
	slot: usize,
	args: &Args,
	config: &AnalyticsConfig,
	stats: &Stats,
	rng: &mut fastrand::Rng,
	stop: &mut watch::Receiver<bool>,
) -> anyhow::Result<()> {
	let (width, height) = VIEWPORTS[rng.usize(..VIEWPORTS.len())];
	let user_agent = USER_AGENTS[rng.usize(..USER_AGENTS.len())];
	let http_client = cubecraft_common_http::builder_with_user_agent(user_agent)
		.timeout(config.request_timeout)
		.build()
		.context("failed to build HTTP client")?;
	let transport = HttpTransport::with_client(&config.api_url, http_client)?;

	let client = AnalyticsClient::builder()
		.config(config.clone())
		.transport(Arc::new(transport))
		.durable_store(Arc::new(MemoryStore::new()))
		.page(PageContext::new("/").with_viewport(Viewport::new(width, height)))
		.build()
		.context("failed to build analytics client")?;

	let mut visitor = Visitor::new(client, rng.fork());
	let duration = args.session_duration(rng);
	stats.active.fetch_add(1, Ordering::Relaxed);
	stats.sessions.fetch_add(1, Ordering::Relaxed);
	info!(
		slot,
		anonymous_id = %visitor.client().anonymous_id(),
		duration_secs = duration.as_secs(),
		"visitor arrived"
	);

	visitor.land();
	if let Some(experiment_id) = &args.experiment_id {
		let tracker = ExposureTracker::new(visitor.client().clone());
		let outcome = visitor.join_experiment(&tracker, experiment_id);
		debug!(slot, experiment_id = %experiment_id, ?outcome, "experiment exposure");
	}

	let deadline = Instant::now() + duration;
	while Instant::now() < deadline {
		if pause(args.action_delay(rng), stop).await {
			break;
		}
		let action = visitor.random_action();
		match visitor.perform(action) {
			Ok(()) => {
				stats.actions.fetch_add(1, Ordering::Relaxed);
			}
			Err(reason) => {
				stats.skipped.fetch_add(1, Ordering::Relaxed);
				debug!(slot, action = action.as_str(), %reason, "action skipped");
			}
		}
	}

	let outcome = visitor.client().shutdown().await;
	stats.active.fetch_sub(1, Ordering::Relaxed);
	info!(
		slot,
		?outcome,
		abandoned_cart_items = visitor.cart().item_count(),
		"visitor left"
	);
	Ok(())
}

async fn report_status(stats: Arc<Stats>, mut stop: watch::Receiver<bool>) {
	let mut interval = tokio::time::interval(STATUS_INTERVAL);
	interval.tick().await;
	loop {
		tokio::select! {
			_ = interval.tick() => {
				info!(
					running = true,
					active_visitors = stats.active.load(Ordering::Relaxed),
					sessions_launched = stats.sessions.load(Ordering::Relaxed),
					actions = stats.actions.load(Ordering::Relaxed),
					skipped = stats.skipped.load(Ordering::Relaxed),
					"status"
				);
			}
			_ = stop.changed() => break,
		}
	}
}
