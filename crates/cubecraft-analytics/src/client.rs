// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The analytics client: one per page, passed to whatever needs to track.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cubecraft_analytics_core::{
	Event, EventData, EventType, ExperimentAssignment, PageView, PageViewData, Properties,
};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::batch::{BatchFlusher, FlushOutcome};
use crate::buffer::EventBuffer;
use crate::clock::{SharedClock, SystemClock};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::identity::IdentityStore;
use crate::lifecycle::{LifecycleState, PageLifecycle};
use crate::page::PageContext;
use crate::storage::{FileStore, MemoryStore, SharedStore};
use crate::transport::{HttpTransport, SharedTransport};

/// Builder for [`AnalyticsClient`].
pub struct AnalyticsClientBuilder {
	config: AnalyticsConfig,
	transport: Option<SharedTransport>,
	durable_store: Option<SharedStore>,
	session_store: Option<SharedStore>,
	clock: Option<SharedClock>,
	page: PageContext,
}

impl Default for AnalyticsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl AnalyticsClientBuilder {
	pub fn new() -> Self {
		Self {
			config: AnalyticsConfig::default(),
			transport: None,
			durable_store: None,
			session_store: None,
			clock: None,
			page: PageContext::default(),
		}
	}

	pub fn config(mut self, config: AnalyticsConfig) -> Self {
		self.config = config;
		self
	}

	pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
		self.config.api_url = api_url.into();
		self
	}

	pub fn batch_size(mut self, batch_size: usize) -> Self {
		self.config.batch_size = batch_size;
		self
	}

	pub fn flush_interval(mut self, interval: Duration) -> Self {
		self.config.flush_interval = interval;
		self
	}

	pub fn session_timeout(mut self, timeout: Duration) -> Self {
		self.config.session_timeout = timeout;
		self
	}

	pub fn route_settle_delay(mut self, delay: Duration) -> Self {
		self.config.route_settle_delay = delay;
		self
	}

	/// Replaces the HTTP transport built from `api_url`.
	pub fn transport(mut self, transport: SharedTransport) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Store for the anonymous id. Defaults to a [`FileStore`] in the user data dir.
	pub fn durable_store(mut self, store: SharedStore) -> Self {
		self.durable_store = Some(store);
		self
	}

	/// Store for the session id. Defaults to an in-memory store.
	pub fn session_store(mut self, store: SharedStore) -> Self {
		self.session_store = Some(store);
		self
	}

	pub fn clock(mut self, clock: SharedClock) -> Self {
		self.clock = Some(clock);
		self
	}

	pub fn page(mut self, page: PageContext) -> Self {
		self.page = page;
		self
	}

	/// Builds the client and starts its flush timer on the current tokio runtime.
	pub fn build(self) -> Result<AnalyticsClient> {
		let runtime = Handle::try_current().map_err(|_| AnalyticsError::NoRuntime)?;
		self.config.validate()?;

		let transport = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new(
				&self.config.api_url,
				self.config.request_timeout,
			)?),
		};
		let durable = self.durable_store.unwrap_or_else(default_durable_store);
		let session = self
			.session_store
			.unwrap_or_else(|| Arc::new(MemoryStore::new()));
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

		let identity = IdentityStore::new(durable, session, Arc::clone(&clock));
		let flusher = Arc::new(BatchFlusher::new(
			self.config.batch_config(),
			Arc::new(EventBuffer::new()),
			Arc::clone(&transport),
			runtime.clone(),
		));
		let timer = runtime.spawn(Arc::clone(&flusher).run());

		let inner = Arc::new(ClientInner {
			lifecycle: Mutex::new(LifecycleState::new(clock.now())),
			config: self.config,
			identity,
			flusher,
			transport,
			runtime,
			page: RwLock::new(self.page),
			timer: Mutex::new(Some(timer)),
			closed: AtomicBool::new(false),
		});

		let client = AnalyticsClient { inner };
		info!(
			api_url = %client.inner.config.api_url,
			anonymous_id = %client.anonymous_id(),
			session_id = %client.session_id(),
			"analytics client initialized"
		);
		Ok(client)
	}
}

fn default_durable_store() -> SharedStore {
	match FileStore::default_path() {
		Some(path) => Arc::new(FileStore::new(path)),
		None => {
			warn!("no user data directory, anonymous id will not survive restarts");
			Arc::new(MemoryStore::new())
		}
	}
}

struct ClientInner {
	config: AnalyticsConfig,
	identity: IdentityStore,
	flusher: Arc<BatchFlusher>,
	transport: SharedTransport,
	runtime: Handle,
	page: RwLock<PageContext>,
	lifecycle: Mutex<LifecycleState>,
	timer: Mutex<Option<JoinHandle<()>>>,
	closed: AtomicBool,
}

impl Drop for ClientInner {
	fn drop(&mut self) {
		self.flusher.shutdown();
		if let Some(timer) = self.timer.get_mut().take() {
			timer.abort();
		}
	}
}

/// Tracks storefront events and delivers them in batches.
///
/// Cloning is cheap and every clone shares the same buffer, identity and
/// timer. Tracking calls never block and never fail; delivery problems are
/// logged and retried.
///
/// # Example
///
/// ```ignore
/// use cubecraft_analytics::AnalyticsClient;
///
/// let client = AnalyticsClient::builder()
///     .api_url("http://localhost:5001/api")
///     .build()?;
///
/// client.track_add_to_cart("42", "GAN 356 M 3x3 Speed Cube", 2, 79.98);
/// client.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AnalyticsClient {
	inner: Arc<ClientInner>,
}

impl std::fmt::Debug for AnalyticsClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AnalyticsClient")
			.field("api_url", &self.inner.config.api_url)
			.field("flusher", &self.inner.flusher)
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}

impl AnalyticsClient {
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	/// Stamps identity, timestamp and page context onto `data` and queues it.
	pub fn track(&self, data: EventData) {
		if self.is_closed() {
			debug!(event_type = %data.event_type, "analytics client shut down, dropping event");
			return;
		}

		let event = self.stamp(data);
		debug!(
			event_type = %event.event_type,
			event_name = %event.event_name,
			page_url = %event.page_url,
			"tracking analytics event"
		);
		self.inner.flusher.enqueue(event);
	}

	fn stamp(&self, data: EventData) -> Event {
		let EventData {
			event_type,
			event_name,
			page_url,
			page_title,
			referrer,
			properties,
			product_id,
			product_name,
			product_category,
			product_price,
			quantity,
			cart_value,
			currency,
		} = data;
		let page = self.page();

		Event {
			event_name: if event_name.is_empty() {
				event_type.to_string()
			} else {
				event_name
			},
			event_type,
			session_id: self.session_id(),
			anonymous_id: self.anonymous_id(),
			user_id: self.user_id(),
			client_timestamp: self.inner.identity.now(),
			page_url: page_url.filter(|url| !url.is_empty()).unwrap_or(page.url),
			page_title: page_title.unwrap_or(page.title),
			referrer: referrer.or(page.referrer),
			properties,
			product_id,
			product_name,
			product_category,
			product_price,
			quantity,
			cart_value,
			currency,
		}
	}

	/// Queues a `page_view` event and, when online, also posts the page view to
	/// its own endpoint. Either send can fail without affecting the other.
	pub fn track_page_view(&self, data: PageViewData) {
		if self.is_closed() {
			debug!(page_url = %data.page_url, "analytics client shut down, dropping page view");
			return;
		}

		let mut data = data;
		let page = self.page();
		if data.page_url.is_empty() {
			data.page_url = page.url;
		}
		if data.page_title.is_none() && !page.title.is_empty() {
			data.page_title = Some(page.title);
		}
		if data.referrer.is_none() {
			data.referrer = page.referrer;
		}

		let mut properties = Properties::new();
		if let Some(load_time_ms) = data.load_time_ms {
			properties.set("load_time_ms", load_time_ms);
		}
		if let Some(seconds) = data.time_on_page_seconds {
			properties.set("time_on_page_seconds", seconds);
		}
		if let Some(width) = data.viewport_width {
			properties.set("viewport_width", width);
		}
		if let Some(height) = data.viewport_height {
			properties.set("viewport_height", height);
		}

		let mut event = EventData::new(EventType::PageView, "Page Viewed")
			.with_page_url(data.page_url.clone())
			.with_properties(properties);
		event.page_title = data.page_title.clone();
		event.referrer = data.referrer.clone();
		self.track(event);

		if !self.is_online() {
			debug!(page_url = %data.page_url, "offline, skipping dedicated page view");
			return;
		}

		let page_view = PageView::new(self.session_id(), self.user_id(), data);
		let transport = Arc::clone(&self.inner.transport);
		self.inner.runtime.spawn(async move {
			match transport.send_page_view(&page_view).await {
				Ok(()) => debug!(page_url = %page_view.data.page_url, "page view sent"),
				Err(e) => {
					error!(error = %e, page_url = %page_view.data.page_url, "failed to send page view")
				}
			}
		});
	}

	pub fn track_product_view(
		&self,
		product_id: &str,
		product_name: &str,
		product_category: &str,
		product_price: f64,
	) {
		self.track(
			EventData::new(EventType::ProductView, "Product Viewed")
				.with_product(product_id, product_name)
				.with_product_category(product_category)
				.with_product_price(product_price)
				.with_property("product_id", product_id)
				.with_property("product_name", product_name)
				.with_property("product_category", product_category)
				.with_property("product_price", product_price),
		);
	}

	pub fn track_add_to_cart(
		&self,
		product_id: &str,
		product_name: &str,
		quantity: u32,
		cart_value: f64,
	) {
		self.track(
			EventData::new(EventType::AddToCart, "Product Added to Cart")
				.with_product(product_id, product_name)
				.with_quantity(quantity)
				.with_cart_value(cart_value)
				.with_property("product_id", product_id)
				.with_property("product_name", product_name)
				.with_property("quantity", quantity)
				.with_property("cart_value", cart_value),
		);
	}

	pub fn track_remove_from_cart(&self, product_id: &str, product_name: &str, quantity: u32) {
		self.track(
			EventData::new(EventType::RemoveFromCart, "Product Removed from Cart")
				.with_product(product_id, product_name)
				.with_quantity(quantity)
				.with_property("product_id", product_id)
				.with_property("product_name", product_name)
				.with_property("quantity", quantity),
		);
	}

	pub fn track_cart_view(&self, item_count: u32, cart_value: f64) {
		self.track(
			EventData::new(EventType::CartView, "Cart Viewed")
				.with_cart_value(cart_value)
				.with_property("item_count", item_count)
				.with_property("cart_value", cart_value),
		);
	}

	pub fn track_checkout_start(&self, cart_value: f64, item_count: u32) {
		self.track(
			EventData::new(EventType::CheckoutStart, "Checkout Started")
				.with_cart_value(cart_value)
				.with_property("cart_value", cart_value)
				.with_property("item_count", item_count),
		);
	}

	/// Purchases are critical and flush immediately.
	pub fn track_purchase(&self, order_id: &str, cart_value: f64, items: Vec<serde_json::Value>) {
		self.track(
			EventData::new(EventType::Purchase, "Purchase Completed")
				.with_cart_value(cart_value)
				.with_property("order_id", order_id)
				.with_property("cart_value", cart_value)
				.with_property("item_count", items.len())
				.with_property("items", items),
		);
	}

	pub fn track_search(&self, query: &str, results_count: Option<u32>) {
		self.track(
			EventData::new(EventType::Search, "Search Performed")
				.with_property("search_query", query)
				.with_property("results_count", results_count),
		);
	}

	/// `location` defaults to the current page path.
	pub fn track_button_click(&self, button_name: &str, location: Option<&str>) {
		let location = match location {
			Some(location) => location.to_string(),
			None => self.page().path().to_string(),
		};
		self.track(
			EventData::new(EventType::Click, "Button Clicked")
				.with_property("button_name", button_name)
				.with_property("location", location),
		);
	}

	/// Posts an experiment assignment straight to its endpoint, bypassing the
	/// buffer. Returns whether the send was started; it is not while offline
	/// or after shutdown.
	pub fn track_experiment_assignment(
		&self,
		experiment_id: &str,
		variation_id: &str,
		experiment_name: Option<&str>,
		variation_name: Option<&str>,
	) -> bool {
		if self.is_closed() {
			debug!(experiment_id, "analytics client shut down, dropping experiment assignment");
			return false;
		}
		if !self.is_online() {
			debug!(experiment_id, "offline, experiment assignment not sent");
			return false;
		}

		let assignment = ExperimentAssignment {
			session_id: self.session_id(),
			anonymous_id: self.anonymous_id(),
			user_id: self.user_id(),
			experiment_id: experiment_id.to_string(),
			variation_id: variation_id.to_string(),
			experiment_name: experiment_name.map(str::to_string),
			variation_name: variation_name.map(str::to_string),
			client_timestamp: self.inner.identity.now(),
		};
		debug!(experiment_id, variation_id, "sending experiment assignment");

		let transport = Arc::clone(&self.inner.transport);
		self.inner.runtime.spawn(async move {
			if let Err(e) = transport.send_experiment_assignment(&assignment).await {
				error!(
					error = %e,
					experiment_id = %assignment.experiment_id,
					variation_id = %assignment.variation_id,
					"failed to send experiment assignment"
				);
			}
		});
		true
	}

	pub fn set_user_id(&self, user_id: Option<String>) {
		self.inner.identity.set_user_id(user_id);
	}

	pub fn user_id(&self) -> Option<String> {
		self.inner.identity.user_id()
	}

	/// Current session id; starts a new session if the last one timed out.
	pub fn session_id(&self) -> String {
		self
			.inner
			.identity
			.get_or_create_session_id(self.inner.config.session_timeout)
	}

	pub fn anonymous_id(&self) -> String {
		self.inner.identity.get_or_create_anonymous_id()
	}

	pub fn page(&self) -> PageContext {
		self.inner.page.read().clone()
	}

	pub fn set_page(&self, page: PageContext) {
		self.update_page(|current| *current = page);
	}

	pub(crate) fn update_page(&self, update: impl FnOnce(&mut PageContext)) {
		let mut page = self.inner.page.write();
		update(&mut page);
	}

	pub fn lifecycle(&self) -> PageLifecycle {
		PageLifecycle::new(self.clone())
	}

	pub(crate) fn with_lifecycle<T>(&self, f: impl FnOnce(&mut LifecycleState) -> T) -> T {
		f(&mut *self.inner.lifecycle.lock())
	}

	pub(crate) fn identity(&self) -> &IdentityStore {
		&self.inner.identity
	}

	pub(crate) fn runtime(&self) -> &Handle {
		&self.inner.runtime
	}

	pub fn config(&self) -> &AnalyticsConfig {
		&self.inner.config
	}

	pub fn set_online(&self, online: bool) {
		self.inner.flusher.set_online(online);
	}

	pub fn is_online(&self) -> bool {
		self.inner.flusher.is_online()
	}

	pub fn queued_len(&self) -> usize {
		self.inner.flusher.queued_len()
	}

	/// Copies of the events waiting to be sent, oldest first.
	pub fn queued_events(&self) -> Vec<Event> {
		self.inner.flusher.buffer().snapshot()
	}

	/// Sends up to one batch now.
	pub async fn flush(&self) -> FlushOutcome {
		self.inner.flusher.flush().await
	}

	/// Starts a flush without waiting for it.
	pub fn flush_in_background(&self) {
		self.inner.flusher.flush_in_background();
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Records time on page, stops the timer and flushes until the buffer is
	/// empty or a send fails. Tracking calls made afterwards are dropped.
	pub async fn shutdown(&self) -> FlushOutcome {
		if self.is_closed() {
			return FlushOutcome::Empty;
		}
		self.lifecycle().emit_time_on_page();
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return FlushOutcome::Empty;
		}

		if let Some(pending) = self.with_lifecycle(|state| state.take_pending_route()) {
			pending.abort();
		}

		self.inner.flusher.shutdown();
		let timer = self.inner.timer.lock().take();
		if let Some(timer) = timer {
			if let Err(e) = timer.await {
				debug!(error = %e, "flush timer did not stop cleanly");
			}
		}

		let outcome = self.inner.flusher.flush_all().await;
		let remaining = self.queued_len();
		if remaining > 0 {
			warn!(remaining, ?outcome, "analytics client shut down with undelivered events");
		} else {
			info!(?outcome, "analytics client shut down");
		}
		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::batch::tests::{eventually, MockTransport};
	use crate::clock::ManualClock;
	use serde_json::json;

	fn client_with(transport: Arc<MockTransport>) -> AnalyticsClient {
		AnalyticsClient::builder()
			.flush_interval(Duration::from_secs(3600))
			.transport(transport)
			.durable_store(Arc::new(MemoryStore::new()))
			.page(PageContext::new("/products/42").with_title("GAN 356 M"))
			.build()
			.unwrap()
	}

	#[test]
	fn test_build_outside_runtime_fails() {
		let result = AnalyticsClient::builder()
			.transport(Arc::new(MockTransport::new()))
			.durable_store(Arc::new(MemoryStore::new()))
			.build();
		assert!(matches!(result, Err(AnalyticsError::NoRuntime)));
	}

	#[tokio::test]
	async fn test_build_rejects_invalid_config() {
		let result = AnalyticsClient::builder()
			.batch_size(0)
			.transport(Arc::new(MockTransport::new()))
			.durable_store(Arc::new(MemoryStore::new()))
			.build();
		assert!(matches!(result, Err(AnalyticsError::Config(_))));
	}

	#[tokio::test]
	async fn test_track_stamps_identity_and_page_defaults() {
		let transport = Arc::new(MockTransport::new());
		let client = client_with(transport);
		client.set_user_id(Some("user-1".to_string()));

		client.track(EventData::new("wishlist_add", ""));

		let event = &client.queued_events()[0];
		assert_eq!(event.event_type, EventType::Custom("wishlist_add".to_string()));
		assert_eq!(event.event_name, "wishlist_add");
		assert_eq!(event.page_url, "/products/42");
		assert_eq!(event.page_title, "GAN 356 M");
		assert_eq!(event.session_id, client.session_id());
		assert_eq!(event.anonymous_id, client.anonymous_id());
		assert_eq!(event.user_id.as_deref(), Some("user-1"));
		assert!(!event.session_id.is_empty());
	}

	#[tokio::test]
	async fn test_explicit_page_url_wins() {
		let client = client_with(Arc::new(MockTransport::new()));
		client.track(EventData::new(EventType::Click, "Button Clicked").with_page_url("/cart"));
		client.track(EventData::new(EventType::Click, "Button Clicked").with_page_url(""));

		let events = client.queued_events();
		assert_eq!(events[0].page_url, "/cart");
		assert_eq!(events[1].page_url, "/products/42");
	}

	#[tokio::test]
	async fn test_add_to_cart_fields_and_properties() {
		let client = client_with(Arc::new(MockTransport::new()));
		client.track_add_to_cart("42", "GAN 356 M 3x3 Speed Cube", 2, 79.98);

		let event = &client.queued_events()[0];
		assert_eq!(event.event_name, "Product Added to Cart");
		assert_eq!(event.product_id.as_deref(), Some("42"));
		assert_eq!(event.quantity, Some(2));
		assert_eq!(event.cart_value, Some(79.98));
		assert_eq!(event.properties.get("quantity"), Some(&json!(2)));
		assert_eq!(event.properties.get("product_name"), Some(&json!("GAN 356 M 3x3 Speed Cube")));
	}

	#[tokio::test]
	async fn test_typed_helpers_build_expected_events() {
		let client = client_with(Arc::new(MockTransport::new()));
		client.track_product_view("3", "Megaminx Dodecahedron Puzzle", "megaminx", 24.99);
		client.track_remove_from_cart("3", "Megaminx Dodecahedron Puzzle", 1);
		client.track_cart_view(2, 57.98);
		client.track_checkout_start(57.98, 2);
		client.track_search("skewb", None);
		client.track_button_click("checkout", None);
		client.track_button_click("hero_cta", Some("/home"));

		let events = client.queued_events();
		let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
		assert_eq!(
			names,
			[
				"Product Viewed",
				"Product Removed from Cart",
				"Cart Viewed",
				"Checkout Started",
				"Search Performed",
				"Button Clicked",
				"Button Clicked",
			]
		);

		assert_eq!(events[0].product_category.as_deref(), Some("megaminx"));
		assert_eq!(events[0].product_price, Some(24.99));
		assert_eq!(events[2].properties.get("item_count"), Some(&json!(2)));
		assert_eq!(events[3].cart_value, Some(57.98));
		assert_eq!(events[4].properties.get("search_query"), Some(&json!("skewb")));
		assert_eq!(events[4].properties.get("results_count"), Some(&serde_json::Value::Null));
		assert_eq!(events[5].properties.get("location"), Some(&json!("/products/42")));
		assert_eq!(events[6].properties.get("location"), Some(&json!("/home")));
	}

	#[tokio::test]
	async fn test_purchase_flushes_immediately() {
		let transport = Arc::new(MockTransport::new());
		let client = client_with(transport.clone());

		client.track_purchase(
			"order-1001",
			79.98,
			vec![json!({"product_id": "1", "quantity": 2})],
		);
		assert_eq!(client.queued_len(), 0);

		eventually(|| transport.sent_count() == 1).await;
		let sent = transport.requests()[0][0].clone();
		assert_eq!(sent.event_type, EventType::Purchase);
		assert_eq!(sent.properties.get("order_id"), Some(&json!("order-1001")));
		assert_eq!(sent.properties.get("item_count"), Some(&json!(1)));
	}

	#[tokio::test]
	async fn test_tenth_event_drains_buffer() {
		let transport = Arc::new(MockTransport::new());
		let client = client_with(transport.clone());

		for i in 0..10 {
			client.track_search(&format!("query {i}"), Some(i));
		}
		assert_eq!(client.queued_len(), 0);
		eventually(|| transport.sent_count() == 10).await;
	}

	#[tokio::test]
	async fn test_page_view_sends_survive_each_others_failures() {
		let transport = Arc::new(MockTransport::new());
		let client = client_with(transport.clone());

		transport.fail_page_views.store(true, Ordering::SeqCst);
		client.track_page_view(PageViewData::new("/cart"));
		eventually(|| transport.page_view_attempts.load(Ordering::SeqCst) == 1).await;
		assert!(transport.page_views.lock().unwrap().is_empty());
		assert_eq!(client.flush().await, FlushOutcome::Sent(1));
		assert_eq!(transport.requests()[0][0].page_url, "/cart");

		transport.fail_page_views.store(false, Ordering::SeqCst);
		transport.fail_events.store(true, Ordering::SeqCst);
		client.track_page_view(PageViewData::new("/checkout"));
		assert_eq!(client.flush().await, FlushOutcome::Requeued(1));
		eventually(|| transport.page_view_attempts.load(Ordering::SeqCst) == 2).await;

		let delivered: Vec<String> = transport
			.page_views
			.lock()
			.unwrap()
			.iter()
			.map(|view| view.data.page_url.clone())
			.collect();
		assert_eq!(delivered, ["/checkout"]);

		transport.fail_events.store(false, Ordering::SeqCst);
		assert_eq!(client.flush().await, FlushOutcome::Sent(1));
		assert_eq!(transport.requests()[1][0].page_url, "/checkout");
	}

	#[tokio::test]
	async fn test_page_view_fills_context_defaults() {
		let transport = Arc::new(MockTransport::new());
		let client = client_with(transport.clone());

		client.track_page_view(PageViewData::new(""));
		eventually(|| transport.page_views.lock().unwrap().len() == 1).await;

		let page_view = transport.page_views.lock().unwrap()[0].clone();
		assert_eq!(page_view.data.page_url, "/products/42");
		assert_eq!(page_view.data.page_title.as_deref(), Some("GAN 356 M"));
		assert_eq!(page_view.session_id, client.session_id());
	}

	#[tokio::test]
	async fn test_offline_skips_dedicated_sends_but_buffers_events() {
		let transport = Arc::new(MockTransport::new());
		let client = client_with(transport.clone());
		client.set_online(false);

		client.track_page_view(PageViewData::new("/"));
		assert!(!client.track_experiment_assignment("e1", "v1", None, None));
		assert_eq!(client.queued_len(), 1);
		assert_eq!(client.flush().await, FlushOutcome::Offline);

		tokio::task::yield_now().await;
		assert!(transport.page_views.lock().unwrap().is_empty());
		assert!(transport.assignments.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_session_renews_between_events() {
		let clock = Arc::new(ManualClock::starting_now());
		let client = AnalyticsClient::builder()
			.flush_interval(Duration::from_secs(3600))
			.transport(Arc::new(MockTransport::new()))
			.durable_store(Arc::new(MemoryStore::new()))
			.clock(clock.clone())
			.build()
			.unwrap();

		client.track_cart_view(1, 12.99);
		clock.advance(chrono::Duration::minutes(10));
		client.track_cart_view(1, 12.99);
		clock.advance(chrono::Duration::minutes(31));
		client.track_cart_view(1, 12.99);

		let events = client.queued_events();
		assert_eq!(events[0].session_id, events[1].session_id);
		assert_ne!(events[1].session_id, events[2].session_id);
		assert_eq!(events[0].anonymous_id, events[2].anonymous_id);
	}

	#[tokio::test]
	async fn test_shutdown_flushes_everything_and_drops_later_events() {
		let transport = Arc::new(MockTransport::new());
		let client = AnalyticsClient::builder()
			.batch_size(3)
			.flush_interval(Duration::from_secs(3600))
			.transport(transport.clone())
			.durable_store(Arc::new(MemoryStore::new()))
			.build()
			.unwrap();

		client.set_online(false);
		for i in 0..7 {
			client.track_search(&format!("q{i}"), None);
		}
		client.set_online(true);

		let outcome = client.shutdown().await;
		assert!(matches!(outcome, FlushOutcome::Sent(_) | FlushOutcome::Empty));
		assert_eq!(client.queued_len(), 0);
		assert_eq!(transport.sent_count(), 7);

		client.track_search("after", None);
		assert_eq!(client.queued_len(), 0);
		assert_eq!(client.shutdown().await, FlushOutcome::Empty);
	}

	#[tokio::test]
	async fn test_clones_share_state() {
		let client = client_with(Arc::new(MockTransport::new()));
		let clone = client.clone();
		clone.track_cart_view(1, 1.0);
		assert_eq!(client.queued_len(), 1);
		assert_eq!(clone.anonymous_id(), client.anonymous_id());
	}
}
