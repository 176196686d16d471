// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a new HTTP client builder with the standard CubeCraft User-Agent header.
///
/// # Example
/// ```ignore
/// let client = cubecraft_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client builder with a custom User-Agent header.
///
/// The traffic simulator uses this to present its visitors as browsers.
pub fn builder_with_user_agent(user_agent: impl Into<String>) -> ClientBuilder {
	Client::builder().user_agent(user_agent.into())
}

/// Returns the standard CubeCraft User-Agent string.
///
/// Format: `cubecraft/{platform}/{version}`
/// Example: `cubecraft/linux-x86_64/0.1.0`
pub fn user_agent() -> String {
	format!(
		"cubecraft/{}-{}/{}",
		std::env::consts::OS,
		std::env::consts::ARCH,
		CLIENT_VERSION
	)
}
