// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The storefront's product catalog.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Product {
	pub id: &'static str,
	pub name: &'static str,
	pub category: &'static str,
	pub price: f64,
}

pub const CATALOG: &[Product] = &[
	Product {
		id: "1",
		name: "GAN 356 M 3x3 Speed Cube",
		category: "speed-cubes",
		price: 39.99,
	},
	Product {
		id: "2",
		name: "MoYu Weilong WR M 3x3",
		category: "speed-cubes",
		price: 34.99,
	},
	Product {
		id: "3",
		name: "Megaminx Dodecahedron Puzzle",
		category: "megaminx",
		price: 24.99,
	},
	Product {
		id: "4",
		name: "QiYi Valk 3 Elite M",
		category: "speed-cubes",
		price: 42.99,
	},
	Product {
		id: "5",
		name: "Rubiks Brand 3x3 Cube",
		category: "puzzle-cubes",
		price: 12.99,
	},
	Product {
		id: "6",
		name: "Pyraminx Triangle Puzzle",
		category: "pyraminx",
		price: 18.99,
	},
	Product {
		id: "7",
		name: "Skewb Diamond Cube",
		category: "skewb",
		price: 16.99,
	},
	Product {
		id: "8",
		name: "XMan Design Tornado V3 M",
		category: "speed-cubes",
		price: 45.99,
	},
];

/// Distinct categories, in catalog order.
pub fn categories() -> Vec<&'static str> {
	let mut categories: Vec<&'static str> = Vec::new();
	for product in CATALOG {
		if !categories.contains(&product.category) {
			categories.push(product.category);
		}
	}
	categories
}

pub fn in_category(category: &str) -> impl Iterator<Item = &'static Product> + '_ {
	CATALOG.iter().filter(move |p| p.category == category)
}

pub fn random_product(rng: &mut fastrand::Rng) -> &'static Product {
	&CATALOG[rng.usize(..CATALOG.len())]
}
