// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of events, page views and experiment assignments to the analytics API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cubecraft_analytics_core::{BatchEnvelope, Event, ExperimentAssignment, IngestResponse, PageView};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{AnalyticsError, Result};

pub const EVENTS_PATH: &str = "/analytics/events";
pub const EVENTS_BATCH_PATH: &str = "/analytics/events/batch";
pub const PAGE_VIEW_PATH: &str = "/analytics/page-view";
pub const EXPERIMENT_ASSIGNMENT_PATH: &str = "/analytics/experiment-assignment";

/// Sends payloads to the analytics backend.
///
/// Any returned error means the payload was not accepted.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send_event(&self, event: &Event) -> Result<()>;

	async fn send_batch(&self, events: &[Event]) -> Result<()>;

	async fn send_page_view(&self, page_view: &PageView) -> Result<()>;

	async fn send_experiment_assignment(&self, assignment: &ExperimentAssignment) -> Result<()>;
}

pub type SharedTransport = Arc<dyn Transport>;

/// JSON-over-HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	http_client: Client,
	api_url: String,
}

impl HttpTransport {
	/// Creates a transport rooted at `api_url`, e.g. `http://localhost:5001/api`.
	pub fn new(api_url: &str, request_timeout: Duration) -> Result<Self> {
		let http_client = cubecraft_common_http::builder()
			.timeout(request_timeout)
			.build()?;
		Self::with_client(api_url, http_client)
	}

	pub fn with_client(api_url: &str, http_client: Client) -> Result<Self> {
		let api_url = api_url.trim().trim_end_matches('/');
		if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
			return Err(AnalyticsError::InvalidApiUrl(api_url.to_string()));
		}

		Ok(Self {
			http_client,
			api_url: api_url.to_string(),
		})
	}

	pub fn api_url(&self) -> &str {
		&self.api_url
	}

	fn endpoint(&self, path: &str) -> String {
		format!("{}{}", self.api_url, path)
	}

	async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<IngestResponse> {
		let url = self.endpoint(path);
		let response = self.http_client.post(&url).json(body).send().await?;
		let status = response.status();

		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(AnalyticsError::ServerError {
				status: status.as_u16(),
				message,
			});
		}

		// The body is informational; a 2xx is acceptance even if it does not parse.
		let body = response.text().await.unwrap_or_default();
		let ingest: IngestResponse = serde_json::from_str(&body).unwrap_or_default();
		debug!(url = %url, status = status.as_u16(), message = ?ingest.message, "analytics payload accepted");
		Ok(ingest)
	}
}

#[async_trait]
impl Transport for HttpTransport {
	#[instrument(skip_all, fields(event_type = %event.event_type))]
	async fn send_event(&self, event: &Event) -> Result<()> {
		self.post(EVENTS_PATH, event).await.map(|_| ())
	}

	#[instrument(skip_all, fields(count = events.len()))]
	async fn send_batch(&self, events: &[Event]) -> Result<()> {
		self
			.post(EVENTS_BATCH_PATH, &BatchEnvelope::borrowed(events))
			.await
			.map(|_| ())
	}

	#[instrument(skip_all, fields(page_url = %page_view.data.page_url))]
	async fn send_page_view(&self, page_view: &PageView) -> Result<()> {
		self.post(PAGE_VIEW_PATH, page_view).await.map(|_| ())
	}

	#[instrument(skip_all, fields(experiment_id = %assignment.experiment_id))]
	async fn send_experiment_assignment(&self, assignment: &ExperimentAssignment) -> Result<()> {
		self
			.post(EXPERIMENT_ASSIGNMENT_PATH, assignment)
			.await
			.map(|_| ())
	}
}
