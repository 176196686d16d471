// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One simulated shopper walking the storefront.

use cubecraft_analytics::{
	ActivityKind, AnalyticsClient, ExposureData, ExposureOutcome, ExposureTracker,
	NavigationTiming,
};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{self, Product};

/// Why an action was not performed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Skipped {
	#[error("cart is empty")]
	EmptyCart,

	#[error("checkout has not been started")]
	CheckoutNotStarted,

	#[error("category {0} has no products")]
	EmptyCategory(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	BrowseProducts,
	ViewProduct,
	AddToCart,
	ViewCart,
	UpdateQuantity,
	BrowseCategory,
	GoHome,
	StartCheckout,
	CompletePurchase,
}

impl Action {
	pub const ALL: [Action; 9] = [
		Action::BrowseProducts,
		Action::ViewProduct,
		Action::AddToCart,
		Action::ViewCart,
		Action::UpdateQuantity,
		Action::BrowseCategory,
		Action::GoHome,
		Action::StartCheckout,
		Action::CompletePurchase,
	];

	pub fn random(rng: &mut fastrand::Rng) -> Self {
		Self::ALL[rng.usize(..Self::ALL.len())]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Action::BrowseProducts => "browse_products",
			Action::ViewProduct => "view_product",
			Action::AddToCart => "add_to_cart",
			Action::ViewCart => "view_cart",
			Action::UpdateQuantity => "update_quantity",
			Action::BrowseCategory => "browse_category",
			Action::GoHome => "go_home",
			Action::StartCheckout => "start_checkout",
			Action::CompletePurchase => "complete_purchase",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
	pub product: &'static Product,
	pub quantity: u32,
}

#[derive(Debug, Default, Clone)]
pub struct Cart {
	lines: Vec<CartLine>,
}

impl Cart {
	pub fn add(&mut self, product: &'static Product, quantity: u32) {
		match self.lines.iter_mut().find(|line| line.product.id == product.id) {
			Some(line) => line.quantity += quantity,
			None => self.lines.push(CartLine { product, quantity }),
		}
	}

	/// Sets the quantity of line `index`, removing the line at zero.
	/// Returns the previous quantity.
	pub fn set_quantity(&mut self, index: usize, quantity: u32) -> Option<u32> {
		let line = self.lines.get_mut(index)?;
		let previous = line.quantity;
		if quantity == 0 {
			self.lines.remove(index);
		} else {
			line.quantity = quantity;
		}
		Some(previous)
	}

	pub fn lines(&self) -> &[CartLine] {
		&self.lines
	}

	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}

	pub fn item_count(&self) -> u32 {
		self.lines.iter().map(|line| line.quantity).sum()
	}

	pub fn total(&self) -> f64 {
		let total: f64 = self
			.lines
			.iter()
			.map(|line| line.product.price * f64::from(line.quantity))
			.sum();
		(total * 100.0).round() / 100.0
	}

	pub fn clear(&mut self) {
		self.lines.clear();
	}
}

/// Splits visitors between `control` and `treatment` by a stable hash of
/// their anonymous id.
pub fn bucket(anonymous_id: &str, experiment_id: &str) -> &'static str {
	// FNV-1a
	let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
	for byte in experiment_id.bytes().chain(anonymous_id.bytes()) {
		hash ^= u64::from(byte);
		hash = hash.wrapping_mul(0x0100_0000_01b3);
	}
	if hash % 2 == 0 {
		"control"
	} else {
		"treatment"
	}
}

pub struct Visitor {
	client: AnalyticsClient,
	rng: fastrand::Rng,
	cart: Cart,
	viewing: Option<&'static Product>,
	checkout_started: bool,
	orders: u32,
}

impl Visitor {
	pub fn new(client: AnalyticsClient, rng: fastrand::Rng) -> Self {
		Self {
			client,
			rng,
			cart: Cart::default(),
			viewing: None,
			checkout_started: false,
			orders: 0,
		}
	}

	pub fn client(&self) -> &AnalyticsClient {
		&self.client
	}

	pub fn cart(&self) -> &Cart {
		&self.cart
	}

	/// Hard load of the home page.
	pub fn land(&mut self) {
		let load_ms = 200.0 + self.rng.f64() * 1800.0;
		let lifecycle = self.client.lifecycle();
		lifecycle.set_title("CubeCraft - Speed Cubes & Puzzles");
		lifecycle.on_load(NavigationTiming::new(0.0, load_ms));
	}

	/// Exposes this visitor to `experiment_id` under its bucketed variation.
	pub fn join_experiment(&self, tracker: &ExposureTracker, experiment_id: &str) -> ExposureOutcome {
		let variation = bucket(&self.client.anonymous_id(), experiment_id);
		tracker.track_exposure(&ExposureData::new(experiment_id, variation))
	}

	pub fn random_action(&mut self) -> Action {
		Action::random(&mut self.rng)
	}

	pub fn perform(&mut self, action: Action) -> Result<(), Skipped> {
		debug!(action = action.as_str(), "visitor action");
		match action {
			Action::BrowseProducts => self.browse_products(),
			Action::ViewProduct => self.view_product(),
			Action::AddToCart => self.add_to_cart(),
			Action::ViewCart => self.view_cart(),
			Action::UpdateQuantity => self.update_quantity(),
			Action::BrowseCategory => self.browse_category(),
			Action::GoHome => self.go_home(),
			Action::StartCheckout => self.start_checkout(),
			Action::CompletePurchase => self.complete_purchase(),
		}
	}

	fn navigate(&mut self, url: &str, title: &str) {
		let lifecycle = self.client.lifecycle();
		lifecycle.on_route_change(url);
		lifecycle.set_title(title);
	}

	fn browse_products(&mut self) -> Result<(), Skipped> {
		self.viewing = None;
		self.navigate("/products", "All Products - CubeCraft");
		self.client.lifecycle().on_user_activity(ActivityKind::Scroll);
		Ok(())
	}

	fn view_product(&mut self) -> Result<(), Skipped> {
		let product = catalog::random_product(&mut self.rng);
		self.viewing = Some(product);
		self.navigate(&format!("/products/{}", product.id), &format!("{} - CubeCraft", product.name));
		self.client
			.track_product_view(product.id, product.name, product.category, product.price);
		Ok(())
	}

	fn add_to_cart(&mut self) -> Result<(), Skipped> {
		let product = match self.viewing {
			Some(product) => product,
			None => catalog::random_product(&mut self.rng),
		};
		let quantity = self.rng.u32(1..=3);
		self.client.lifecycle().on_user_activity(ActivityKind::Click);
		self.cart.add(product, quantity);
		self.client
			.track_add_to_cart(product.id, product.name, quantity, self.cart.total());
		Ok(())
	}

	fn view_cart(&mut self) -> Result<(), Skipped> {
		self.viewing = None;
		self.navigate("/cart", "Your Cart - CubeCraft");
		self.client
			.track_cart_view(self.cart.item_count(), self.cart.total());
		Ok(())
	}

	fn update_quantity(&mut self) -> Result<(), Skipped> {
		if self.cart.is_empty() {
			return Err(Skipped::EmptyCart);
		}
		let index = self.rng.usize(..self.cart.lines().len());
		let product = self.cart.lines()[index].product;
		let quantity = self.rng.u32(0..=5);
		let previous = self.cart.set_quantity(index, quantity).unwrap_or(quantity);

		if quantity > previous {
			self.client
				.track_add_to_cart(product.id, product.name, quantity - previous, self.cart.total());
		} else if quantity < previous {
			self.client
				.track_remove_from_cart(product.id, product.name, previous - quantity);
		}
		Ok(())
	}

	fn browse_category(&mut self) -> Result<(), Skipped> {
		let categories = catalog::categories();
		let category = categories[self.rng.usize(..categories.len())];
		if catalog::in_category(category).next().is_none() {
			return Err(Skipped::EmptyCategory(category));
		}
		self.viewing = None;
		self.client.track_button_click(category, None);
		self.navigate(
			&format!("/products?category={category}"),
			&format!("{category} - CubeCraft"),
		);
		Ok(())
	}

	fn go_home(&mut self) -> Result<(), Skipped> {
		self.viewing = None;
		self.navigate("/", "CubeCraft - Speed Cubes & Puzzles");
		Ok(())
	}

	fn start_checkout(&mut self) -> Result<(), Skipped> {
		if self.cart.is_empty() {
			return Err(Skipped::EmptyCart);
		}
		self.viewing = None;
		self.navigate("/checkout", "Checkout - CubeCraft");
		self.client
			.track_checkout_start(self.cart.total(), self.cart.item_count());
		self.checkout_started = true;
		Ok(())
	}

	fn complete_purchase(&mut self) -> Result<(), Skipped> {
		if !self.checkout_started {
			return Err(Skipped::CheckoutNotStarted);
		}
		if self.cart.is_empty() {
			self.checkout_started = false;
			return Err(Skipped::EmptyCart);
		}

		self.orders += 1;
		let session: String = self.client.session_id().chars().take(8).collect();
		let order_id = format!("ORD-{session}-{}", self.orders);
		let items = self
			.cart
			.lines()
			.iter()
			.map(|line| {
				json!({
					"product_id": line.product.id,
					"product_name": line.product.name,
					"price": line.product.price,
					"quantity": line.quantity,
				})
			})
			.collect();

		self.client.lifecycle().on_user_activity(ActivityKind::Click);
		self.client
			.track_purchase(&order_id, self.cart.total(), items);
		self.cart.clear();
		self.checkout_started = false;
		self.navigate("/order-confirmation", "Order Confirmed - CubeCraft");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};
	use std::time::Duration;

	use async_trait::async_trait;
	use cubecraft_analytics::{
		Event, EventType, ExperimentAssignment, MemoryStore, PageView, Transport,
	};

	#[derive(Default)]
	struct RecordingTransport {
		events: Mutex<Vec<Event>>,
		assignments: Mutex<Vec<ExperimentAssignment>>,
	}

	#[async_trait]
	impl Transport for RecordingTransport {
		async fn send_event(&self, event: &Event) -> cubecraft_analytics::Result<()> {
			self.events.lock().unwrap().push(event.clone());
			Ok(())
		}

		async fn send_batch(&self, events: &[Event]) -> cubecraft_analytics::Result<()> {
			self.events.lock().unwrap().extend_from_slice(events);
			Ok(())
		}

		async fn send_page_view(&self, _page_view: &PageView) -> cubecraft_analytics::Result<()> {
			Ok(())
		}

		async fn send_experiment_assignment(
			&self,
			assignment: &ExperimentAssignment,
		) -> cubecraft_analytics::Result<()> {
			self.assignments.lock().unwrap().push(assignment.clone());
			Ok(())
		}
	}

	fn visitor(transport: Arc<RecordingTransport>) -> Visitor {
		let client = AnalyticsClient::builder()
			.batch_size(1000)
			.flush_interval(Duration::from_secs(3600))
			.transport(transport)
			.durable_store(Arc::new(MemoryStore::new()))
			.build()
			.unwrap();
		Visitor::new(client, fastrand::Rng::with_seed(42))
	}

	fn queued_types(visitor: &Visitor) -> Vec<EventType> {
		visitor
			.client()
			.queued_events()
			.into_iter()
			.map(|e| e.event_type)
			.collect()
	}

	#[test]
	fn cart_totals_and_merges_lines() {
		let mut cart = Cart::default();
		cart.add(&catalog::CATALOG[0], 1);
		cart.add(&catalog::CATALOG[4], 2);
		cart.add(&catalog::CATALOG[0], 1);
		assert_eq!(cart.lines().len(), 2);
		assert_eq!(cart.item_count(), 4);
		assert_eq!(cart.total(), 105.96);

		assert_eq!(cart.set_quantity(1, 0), Some(2));
		assert_eq!(cart.lines().len(), 1);
		assert_eq!(cart.set_quantity(5, 1), None);
	}

	#[test]
	fn bucketing_is_stable() {
		let first = bucket("anon-123", "checkout-button");
		for _ in 0..10 {
			assert_eq!(bucket("anon-123", "checkout-button"), first);
		}
		let buckets: std::collections::HashSet<_> =
			(0..64).map(|i| bucket(&format!("anon-{i}"), "checkout-button")).collect();
		assert_eq!(buckets.len(), 2);
	}

	#[tokio::test]
	async fn checkout_preconditions_are_enforced() {
		let mut visitor = visitor(Arc::new(RecordingTransport::default()));
		assert_eq!(visitor.perform(Action::StartCheckout), Err(Skipped::EmptyCart));
		assert_eq!(
			visitor.perform(Action::CompletePurchase),
			Err(Skipped::CheckoutNotStarted)
		);
		assert_eq!(visitor.perform(Action::UpdateQuantity), Err(Skipped::EmptyCart));
		assert!(visitor.client().queued_events().is_empty());
	}

	#[tokio::test]
	async fn shopping_flow_tracks_funnel() {
		let transport = Arc::new(RecordingTransport::default());
		let mut visitor = visitor(Arc::clone(&transport));

		visitor.perform(Action::ViewProduct).unwrap();
		visitor.perform(Action::AddToCart).unwrap();
		visitor.perform(Action::ViewCart).unwrap();
		visitor.perform(Action::StartCheckout).unwrap();
		assert_eq!(
			queued_types(&visitor),
			[
				EventType::ProductView,
				EventType::AddToCart,
				EventType::CartView,
				EventType::CheckoutStart,
			]
		);

		visitor.perform(Action::CompletePurchase).unwrap();
		assert!(visitor.cart().is_empty());

		visitor.client().shutdown().await;
		let events = transport.events.lock().unwrap();
		let purchase = events
			.iter()
			.find(|e| e.event_type == EventType::Purchase)
			.unwrap();
		assert_eq!(purchase.properties.get("item_count"), Some(&json!(1)));
		assert!(purchase
			.properties
			.get("order_id")
			.and_then(|v| v.as_str())
			.is_some_and(|id| id.starts_with("ORD-")));
	}

	#[tokio::test]
	async fn experiment_exposure_uses_bucket() {
		let transport = Arc::new(RecordingTransport::default());
		let visitor = visitor(Arc::clone(&transport));
		let tracker = ExposureTracker::new(visitor.client().clone());

		assert_eq!(
			visitor.join_experiment(&tracker, "checkout-button"),
			ExposureOutcome::Dispatched
		);
		assert_eq!(
			visitor.join_experiment(&tracker, "checkout-button"),
			ExposureOutcome::AlreadyTracked
		);

		let expected = bucket(&visitor.client().anonymous_id(), "checkout-button");
		for _ in 0..100 {
			if !transport.assignments.lock().unwrap().is_empty() {
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		let assignments = transport.assignments.lock().unwrap();
		assert_eq!(assignments.len(), 1);
		assert_eq!(assignments[0].variation_id, expected);
	}
}
