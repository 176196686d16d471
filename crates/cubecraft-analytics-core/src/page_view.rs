// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page-view record for the dedicated `POST /analytics/page-view` endpoint.

use serde::{Deserialize, Serialize};

/// What the caller knows about a page view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageViewData {
	pub page_url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub page_title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub referrer: Option<String>,
	/// Only the initial hard load measures this.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub load_time_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub time_on_page_seconds: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub viewport_width: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub viewport_height: Option<u32>,
}

impl PageViewData {
	pub fn new(page_url: impl Into<String>) -> Self {
		Self {
			page_url: page_url.into(),
			..Default::default()
		}
	}

	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.page_title = Some(title.into());
		self
	}

	pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
		self.referrer = Some(referrer.into());
		self
	}

	pub fn with_load_time_ms(mut self, load_time_ms: u64) -> Self {
		self.load_time_ms = Some(load_time_ms);
		self
	}

	pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
		self.viewport_width = Some(width);
		self.viewport_height = Some(height);
		self
	}
}

/// A page view as sent to the dedicated endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
	pub session_id: String,
	pub user_id: Option<String>,
	#[serde(flatten)]
	pub data: PageViewData,
}

impl PageView {
	pub fn new(session_id: impl Into<String>, user_id: Option<String>, data: PageViewData) -> Self {
		Self {
			session_id: session_id.into(),
			user_id,
			data,
		}
	}
}
