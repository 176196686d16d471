// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire types for the CubeCraft storefront analytics pipeline.
//!
//! These are the records the browser-side pipeline sends to the ingestion
//! endpoints:
//!
//! - [`Event`]: generic telemetry record, sent singly or inside a [`BatchEnvelope`]
//! - [`PageView`]: richer page-view record for the dedicated page-view endpoint
//! - [`ExperimentAssignment`]: one experiment exposure
//!
//! [`FlagEvaluation`] is the minimal shape the pipeline consumes from whatever
//! feature-flag system the host integrates.

mod event;
mod experiment;
mod page_view;
mod properties;

pub use event::{BatchEnvelope, Event, EventData, EventType, IngestResponse};
pub use experiment::{ExperimentAssignment, FlagEvaluation};
pub use page_view::{PageView, PageViewData};
pub use properties::Properties;
