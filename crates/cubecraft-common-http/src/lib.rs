// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for CubeCraft.
//!
//! This crate provides:
//! - A pre-configured HTTP client builder with consistent User-Agent header
//! - Classification of transient failures worth retrying

mod client;
mod retryable;

pub use client::{builder, builder_with_user_agent, user_agent};
pub use retryable::{is_retryable_status, RetryableError};
