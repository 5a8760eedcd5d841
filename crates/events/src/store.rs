// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The events worker's read-only view of the document store: just enough to
//! decide low-stock/near-expiry and eligible-driver fan-out (§4.8). It never
//! writes to these collections — the gateway owns that.

use anyhow::{Context, Result};
use mongodb::{Client as MongoClient, Collection, options::{ClientOptions, ResolverConfig}};
use pharma_sdk::{InventoryRow, User};

use crate::config::EventsConfig;

#[derive(Clone)]
pub struct Collections {
	pub users: Collection<User>,
	pub inventory: Collection<InventoryRow>,
}

pub struct EventsState {
	pub db: Collections,
	pub low_stock_threshold: u32,
	pub expiry_warning_days: i64,
}

impl EventsState {
	pub async fn new(config: &EventsConfig) -> Result<Self> {
		let mongo_opts =
			ClientOptions::parse_with_resolver_config(&config.mongo_uri, ResolverConfig::cloudflare())
				.await
				.context("parsing mongo_uri")?;
		let mongo = MongoClient::with_options(mongo_opts).context("connecting to document store")?;
		let database = mongo.database(&config.mongo_db);

		Ok(Self {
			db: Collections {
				users: database.collection("users"),
				inventory: database.collection("inventory"),
			},
			low_stock_threshold: config.low_stock_threshold,
			expiry_warning_days: config.expiry_warning_days,
		})
	}
}
