// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side analytics pipeline for the CubeCraft storefront.
//!
//! Storefront code tracks events through an [`AnalyticsClient`]. Events are
//! stamped with the visitor's anonymous id, session id and page context,
//! queued in memory and sent in batches: every few seconds, as soon as a batch
//! fills up, or immediately for critical events such as purchases. Failed
//! sends are put back at the head of the queue and retried.
//!
//! Page views and experiment assignments additionally have dedicated
//! endpoints. [`ExposureTracker`] makes sure each experiment variation is
//! reported once per session, and [`PageLifecycle`] turns host page signals
//! into page views and time-on-page events.
//!
//! # Example
//!
//! ```ignore
//! use cubecraft_analytics::{AnalyticsClient, NavigationTiming, PageContext};
//!
//! let client = AnalyticsClient::builder()
//!     .api_url("http://localhost:5001/api")
//!     .page(PageContext::new("/").with_title("CubeCraft"))
//!     .build()?;
//!
//! client.lifecycle().on_load(NavigationTiming::new(0.0, 640.0));
//! client.track_product_view("1", "GAN 356 M 3x3 Speed Cube", "speed-cubes", 39.99);
//! client.track_add_to_cart("1", "GAN 356 M 3x3 Speed Cube", 1, 39.99);
//!
//! client.shutdown().await;
//! ```

pub mod batch;
pub mod buffer;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod exposure;
pub mod identity;
pub mod lifecycle;
pub mod page;
pub mod storage;
pub mod transport;

pub use batch::{BatchConfig, BatchFlusher, FlushOutcome};
pub use buffer::EventBuffer;
pub use client::{AnalyticsClient, AnalyticsClientBuilder};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{AnalyticsConfig, AnalyticsConfigLayer, ConfigError, EnvSource, TomlSource};
pub use error::{AnalyticsError, Result};
pub use exposure::{
	ExposureData, ExposureHook, ExposureOutcome, ExposureStrategy, ExposureTracker,
	ExposureWatcher, NoOpExposureHook, SharedExposureHook, DEFAULT_VISIBILITY_THRESHOLD,
};
pub use identity::IdentityStore;
pub use lifecycle::{ActivityKind, NavigationTiming, PageLifecycle, Visibility};
pub use page::{PageContext, Viewport};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore, StorageError};
pub use transport::{HttpTransport, SharedTransport, Transport};

pub use cubecraft_analytics_core::{
	Event, EventData, EventType, ExperimentAssignment, FlagEvaluation, PageView, PageViewData,
	Properties,
};
