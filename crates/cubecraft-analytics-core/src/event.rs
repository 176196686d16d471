// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The generic telemetry event and its batch envelope.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::properties::Properties;

/// Category of a telemetry event.
///
/// Known storefront categories get their own variant; anything else round-trips
/// through [`EventType::Custom`]. On the wire this is always a plain string such as
/// `"add_to_cart"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
	PageView,
	ProductView,
	AddToCart,
	RemoveFromCart,
	CartView,
	CheckoutStart,
	Purchase,
	Search,
	Click,
	Engagement,
	Signup,
	Error,
	Custom(String),
}

impl EventType {
	pub fn as_str(&self) -> &str {
		match self {
			EventType::PageView => "page_view",
			EventType::ProductView => "product_view",
			EventType::AddToCart => "add_to_cart",
			EventType::RemoveFromCart => "remove_from_cart",
			EventType::CartView => "cart_view",
			EventType::CheckoutStart => "checkout_start",
			EventType::Purchase => "purchase",
			EventType::Search => "search",
			EventType::Click => "click",
			EventType::Engagement => "engagement",
			EventType::Signup => "signup",
			EventType::Error => "error",
			EventType::Custom(name) => name,
		}
	}

	/// Critical events are flushed immediately instead of waiting for the
	/// next timer tick.
	pub fn is_critical(&self) -> bool {
		matches!(self, EventType::Purchase | EventType::Signup | EventType::Error)
	}
}

impl From<String> for EventType {
	fn from(s: String) -> Self {
		match s.as_str() {
			"page_view" => EventType::PageView,
			"product_view" => EventType::ProductView,
			"add_to_cart" => EventType::AddToCart,
			"remove_from_cart" => EventType::RemoveFromCart,
			"cart_view" => EventType::CartView,
			"checkout_start" => EventType::CheckoutStart,
			"purchase" => EventType::Purchase,
			"search" => EventType::Search,
			"click" => EventType::Click,
			"engagement" => EventType::Engagement,
			"signup" => EventType::Signup,
			"error" => EventType::Error,
			_ => EventType::Custom(s),
		}
	}
}

impl From<&str> for EventType {
	fn from(s: &str) -> Self {
		EventType::from(s.to_string())
	}
}

impl From<EventType> for String {
	fn from(event_type: EventType) -> Self {
		match event_type {
			EventType::Custom(name) => name,
			other => other.as_str().to_string(),
		}
	}
}

impl std::fmt::Display for EventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A telemetry event as queued by the client and accepted by
/// `POST /analytics/events`.
///
/// Identity and timestamp fields are stamped at creation; the record is not
/// modified once it has been queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub event_type: EventType,
	pub event_name: String,
	pub session_id: String,
	pub anonymous_id: String,
	pub user_id: Option<String>,
	pub client_timestamp: DateTime<Utc>,
	pub page_url: String,
	#[serde(default)]
	pub page_title: String,
	pub referrer: Option<String>,
	#[serde(default)]
	pub properties: Properties,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub product_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub product_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub product_category: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub product_price: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub quantity: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cart_value: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub currency: Option<String>,
}

/// The caller-supplied part of an event.
///
/// Everything the client can fill in on its own (identity, timestamp, page
/// context) is optional here.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
	pub event_type: EventType,
	pub event_name: String,
	pub page_url: Option<String>,
	pub page_title: Option<String>,
	pub referrer: Option<String>,
	pub properties: Properties,
	pub product_id: Option<String>,
	pub product_name: Option<String>,
	pub product_category: Option<String>,
	pub product_price: Option<f64>,
	pub quantity: Option<u32>,
	pub cart_value: Option<f64>,
	pub currency: Option<String>,
}

impl EventData {
	pub fn new(event_type: impl Into<EventType>, event_name: impl Into<String>) -> Self {
		Self {
			event_type: event_type.into(),
			event_name: event_name.into(),
			page_url: None,
			page_title: None,
			referrer: None,
			properties: Properties::new(),
			product_id: None,
			product_name: None,
			product_category: None,
			product_price: None,
			quantity: None,
			cart_value: None,
			currency: None,
		}
	}

	pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
		self.page_url = Some(url.into());
		self
	}

	pub fn with_page_title(mut self, title: impl Into<String>) -> Self {
		self.page_title = Some(title.into());
		self
	}

	pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
		self.referrer = Some(referrer.into());
		self
	}

	pub fn with_properties(mut self, properties: Properties) -> Self {
		self.properties = properties;
		self
	}

	pub fn with_property(
		mut self,
		key: impl Into<String>,
		value: impl Into<serde_json::Value>,
	) -> Self {
		self.properties.set(key, value);
		self
	}

	pub fn with_product(
		mut self,
		id: impl Into<String>,
		name: impl Into<String>,
	) -> Self {
		self.product_id = Some(id.into());
		self.product_name = Some(name.into());
		self
	}

	pub fn with_product_category(mut self, category: impl Into<String>) -> Self {
		self.product_category = Some(category.into());
		self
	}

	pub fn with_product_price(mut self, price: f64) -> Self {
		self.product_price = Some(price);
		self
	}

	pub fn with_quantity(mut self, quantity: u32) -> Self {
		self.quantity = Some(quantity);
		self
	}

	pub fn with_cart_value(mut self, cart_value: f64) -> Self {
		self.cart_value = Some(cart_value);
		self
	}

	pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
		self.currency = Some(currency.into());
		self
	}
}

/// Body of `POST /analytics/events/batch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEnvelope<'a> {
	pub events: Cow<'a, [Event]>,
}

impl<'a> BatchEnvelope<'a> {
	pub fn borrowed(events: &'a [Event]) -> Self {
		Self {
			events: Cow::Borrowed(events),
		}
	}
}

/// Response body returned by every ingestion endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestResponse {
	pub success: bool,
	pub message: Option<String>,
	pub data: Option<serde_json::Value>,
}
