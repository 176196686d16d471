// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The page the visitor is currently on.

use cubecraft_analytics_core::PageViewData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
	pub width: u32,
	pub height: u32,
}

impl Viewport {
	pub fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}
}

/// Location, title and referrer used to fill in events that do not carry
/// their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
	pub url: String,
	pub title: String,
	pub referrer: Option<String>,
	pub viewport: Option<Viewport>,
}

impl Default for PageContext {
	fn default() -> Self {
		Self::new("/")
	}
}

impl PageContext {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			title: String::new(),
			referrer: None,
			viewport: None,
		}
	}

	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.title = title.into();
		self
	}

	pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
		self.referrer = Some(referrer.into());
		self
	}

	pub fn with_viewport(mut self, viewport: Viewport) -> Self {
		self.viewport = Some(viewport);
		self
	}

	/// Path component of the url, without query or fragment.
	pub fn path(&self) -> &str {
		let url = self.url.as_str();
		let after_scheme = match url.find("://") {
			Some(idx) => {
				let rest = &url[idx + 3..];
				rest.find('/').map_or("/", |slash| &rest[slash..])
			}
			None => url,
		};
		let end = after_scheme.find(['?', '#']).unwrap_or(after_scheme.len());
		match &after_scheme[..end] {
			"" => "/",
			path => path,
		}
	}

	/// Page-view payload for this page, without load timing.
	pub fn page_view_data(&self) -> PageViewData {
		let mut data = PageViewData::new(self.url.clone());
		if !self.title.is_empty() {
			data = data.with_title(self.title.clone());
		}
		if let Some(referrer) = &self.referrer {
			data = data.with_referrer(referrer.clone());
		}
		data
	}
}
