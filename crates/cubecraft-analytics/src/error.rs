// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics pipeline.
//!
//! None of these reach product-flow code through the tracking calls; they are
//! logged there. They surface from construction and configuration, and from
//! the explicit transport API.

use cubecraft_common_http::{is_retryable_status, RetryableError};
use thiserror::Error;

use crate::config::ConfigError;

/// Analytics pipeline errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// API URL is missing or not http(s).
	#[error("invalid API URL: {0}")]
	InvalidApiUrl(String),

	/// HTTP request failed before a response arrived.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server answered with a non-2xx status.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// The client spawns its timer and sends on a tokio runtime.
	#[error("no tokio runtime available; build the client from within a runtime")]
	NoRuntime,

	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),
}

impl RetryableError for AnalyticsError {
	fn is_retryable(&self) -> bool {
		match self {
			AnalyticsError::RequestFailed(e) => e.is_retryable(),
			AnalyticsError::ServerError { status, .. } => is_retryable_status(*status),
			_ => false,
		}
	}
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
