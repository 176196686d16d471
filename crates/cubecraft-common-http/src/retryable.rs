// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Classification of transient HTTP failures.

/// Errors that can tell whether repeating the same request might succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

/// Status codes that indicate a transient server-side condition.
pub fn is_retryable_status(status: u16) -> bool {
	matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() || self.is_request() {
			return true;
		}
		self
			.status()
			.map(|status| is_retryable_status(status.as_u16()))
			.unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transient_statuses_are_retryable() {
		for status in [408, 429, 500, 502, 503, 504] {
			assert!(is_retryable_status(status), "status {status} should be retryable");
		}
	}

	#[test]
	fn client_errors_are_not_retryable() {
		for status in [400, 401, 403, 404, 422] {
			assert!(!is_retryable_status(status), "status {status} should not be retryable");
		}
	}
}
