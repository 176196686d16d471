// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end tests of the analytics client against a mock ingestion server.

use std::sync::Arc;
use std::time::Duration;

use cubecraft_analytics::{
	AnalyticsClient, EventData, EventType, ExposureData, ExposureOutcome, ExposureTracker,
	FlushOutcome, MemoryStore, PageContext,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn ok_server() -> MockServer {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.mount(&server)
		.await;
	server
}

fn client_for(server: &MockServer, flush_interval: Duration) -> AnalyticsClient {
	AnalyticsClient::builder()
		.api_url(format!("{}/api", server.uri()))
		.flush_interval(flush_interval)
		.durable_store(Arc::new(MemoryStore::new()))
		.page(PageContext::new("/products/42").with_title("GAN 356 M 3x3 Speed Cube"))
		.build()
		.unwrap()
}

async fn requests_to(server: &MockServer, endpoint: &str) -> Vec<Request> {
	server
		.received_requests()
		.await
		.unwrap_or_default()
		.into_iter()
		.filter(|r| r.url.path() == endpoint)
		.collect()
}

async fn wait_for_requests(server: &MockServer, endpoint: &str, count: usize) -> Vec<Request> {
	for _ in 0..300 {
		let requests = requests_to(server, endpoint).await;
		if requests.len() >= count {
			return requests;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("expected {count} requests to {endpoint}");
}

/// Event payloads in the order the server received them.
fn delivered_events(requests: &[Request]) -> Vec<Value> {
	requests
		.iter()
		.flat_map(|r| {
			let body: Value = r.body_json().unwrap();
			match body.get("events") {
				Some(Value::Array(events)) => events.clone(),
				_ => vec![body],
			}
		})
		.collect()
}

#[tokio::test]
async fn add_to_cart_is_delivered_on_timer_tick() {
	let server = ok_server().await;
	let client = client_for(&server, Duration::from_millis(100));

	client.track(
		EventData::new(EventType::AddToCart, "Product Added to Cart")
			.with_product("42", "GAN 356 M 3x3 Speed Cube")
			.with_quantity(2)
			.with_cart_value(79.98),
	);

	let requests = wait_for_requests(&server, "/api/analytics/events", 1).await;
	assert_eq!(requests.len(), 1);
	assert!(requests_to(&server, "/api/analytics/events/batch").await.is_empty());

	let body: Value = requests[0].body_json().unwrap();
	assert_eq!(body["event_type"], "add_to_cart");
	assert_eq!(body["product_id"], "42");
	assert_eq!(body["quantity"], 2);
	assert_eq!(body["cart_value"], 79.98);
	assert!(!body["session_id"].as_str().unwrap().is_empty());
	assert!(!body["anonymous_id"].as_str().unwrap().is_empty());
	assert_eq!(body["page_url"], "/products/42");
}

#[tokio::test]
async fn failed_batch_is_redelivered_in_order() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/analytics/events/batch"))
		.respond_with(ResponseTemplate::new(500))
		.up_to_n_times(1)
		.with_priority(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.with_priority(2)
		.mount(&server)
		.await;

	let client = client_for(&server, Duration::from_secs(3600));
	for query in ["pyraminx", "skewb", "megaminx"] {
		client.track_search(query, Some(1));
	}

	assert_eq!(client.flush().await, FlushOutcome::Requeued(3));
	assert_eq!(client.queued_len(), 3);

	client.track_search("tornado", Some(1));
	assert_eq!(client.flush().await, FlushOutcome::Sent(4));

	let requests = requests_to(&server, "/api/analytics/events/batch").await;
	assert_eq!(requests.len(), 2);
	let delivered = delivered_events(&requests[1..]);
	let queries: Vec<&str> = delivered
		.iter()
		.map(|e| e["properties"]["search_query"].as_str().unwrap())
		.collect();
	assert_eq!(queries, ["pyraminx", "skewb", "megaminx", "tornado"]);
}

#[tokio::test]
async fn full_batch_goes_out_without_timer() {
	let server = ok_server().await;
	let client = client_for(&server, Duration::from_secs(3600));

	for i in 0..10 {
		client.track_button_click(&format!("button-{i}"), None);
	}
	assert_eq!(client.queued_len(), 0);

	let requests = wait_for_requests(&server, "/api/analytics/events/batch", 1).await;
	assert_eq!(delivered_events(&requests).len(), 10);
}

#[tokio::test]
async fn purchase_is_not_held_for_timer() {
	let server = ok_server().await;
	let client = client_for(&server, Duration::from_secs(3600));

	client.track_purchase("order-7", 39.99, vec![json!({"product_id": "1", "quantity": 1})]);

	let requests = wait_for_requests(&server, "/api/analytics/events", 1).await;
	let body: Value = requests[0].body_json().unwrap();
	assert_eq!(body["event_type"], "purchase");
	assert_eq!(body["properties"]["order_id"], "order-7");
}

#[tokio::test]
async fn exposure_posts_once_per_variation() {
	let server = ok_server().await;
	let client = client_for(&server, Duration::from_secs(3600));
	let tracker = ExposureTracker::new(client.clone());

	let v1 = ExposureData::new("e1", "v1");
	assert_eq!(tracker.track_exposure(&v1), ExposureOutcome::Dispatched);
	assert_eq!(tracker.track_exposure(&v1), ExposureOutcome::AlreadyTracked);
	assert_eq!(
		tracker.track_exposure(&ExposureData::new("e1", "v2")),
		ExposureOutcome::Dispatched
	);

	wait_for_requests(&server, "/api/analytics/experiment-assignment", 2).await;
	tokio::time::sleep(Duration::from_millis(100)).await;
	let requests = requests_to(&server, "/api/analytics/experiment-assignment").await;
	assert_eq!(requests.len(), 2);

	let mut variations: Vec<String> = requests
		.iter()
		.map(|r| {
			let body: Value = r.body_json().unwrap();
			assert_eq!(body["anonymous_id"], client.anonymous_id().as_str());
			body["variation_id"].as_str().unwrap().to_string()
		})
		.collect();
	variations.sort();
	assert_eq!(variations, ["v1", "v2"]);
}

#[tokio::test]
async fn page_view_failure_does_not_block_event_delivery() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/analytics/page-view"))
		.respond_with(ResponseTemplate::new(503))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/analytics/events"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.mount(&server)
		.await;

	let client = client_for(&server, Duration::from_secs(3600));
	client.lifecycle().on_route_change("/cart");
	tokio::time::sleep(Duration::from_millis(200)).await;

	wait_for_requests(&server, "/api/analytics/page-view", 1).await;
	assert_eq!(client.flush().await, FlushOutcome::Sent(1));

	let requests = requests_to(&server, "/api/analytics/events").await;
	let body: Value = requests[0].body_json().unwrap();
	assert_eq!(body["event_type"], "page_view");
	assert_eq!(body["page_url"], "/cart");
}

#[tokio::test]
async fn unreachable_server_keeps_events_until_shutdown() {
	let client = AnalyticsClient::builder()
		.api_url("http://127.0.0.1:9/api")
		.flush_interval(Duration::from_secs(3600))
		.durable_store(Arc::new(MemoryStore::new()))
		.build()
		.unwrap();

	client.track_cart_view(2, 51.98);
	client.track_checkout_start(51.98, 2);

	assert_eq!(client.flush().await, FlushOutcome::Requeued(2));
	assert_eq!(client.shutdown().await, FlushOutcome::Requeued(2));
	assert_eq!(client.queued_len(), 2);
}
