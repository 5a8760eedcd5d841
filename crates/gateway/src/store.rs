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

//! Process-wide collaborators: document store, key-value store, event-bus
//! channel and the token signer, bundled into one `AppState` handed to every
//! handler via `web::Data<AppState>`.

use std::time::Duration;

use anyhow::{Context, Result};
use mongodb::{
	Client as MongoClient, Collection, Database, IndexModel,
	bson::doc,
	options::{ClientOptions, IndexOptions, ResolverConfig},
};
use pharma_sdk::{Delivery, InventoryRow, Medicine, Order, Pharmacy, TokenSigner, User};
use redis::aio::ConnectionManager;

use crate::admission::RateLimiters;
use crate::config::GatewayConfig;
use crate::events::EventOutbox;

/// Document-store collections, typed by row.
#[derive(Clone)]
pub struct Collections {
	pub users: Collection<User>,
	pub pharmacies: Collection<Pharmacy>,
	pub medicines: Collection<Medicine>,
	pub inventory: Collection<InventoryRow>,
	pub orders: Collection<Order>,
	pub deliveries: Collection<Delivery>,
}

impl Collections {
	fn new(db: &Database) -> Self {
		Self {
			users: db.collection("users"),
			pharmacies: db.collection("pharmacies"),
			medicines: db.collection("medicines"),
			inventory: db.collection("inventory"),
			orders: db.collection("orders"),
			deliveries: db.collection("deliveries"),
		}
	}

	/// Declares the unique indexes the §8 invariants depend on, so the
	/// document store itself — not a racing read-then-write in the handler —
	/// is the arbiter of uniqueness (§5's "serialized by the document store").
	async fn ensure_indexes(&self) -> Result<()> {
		self.orders
			.create_index(
				IndexModel::builder()
					.keys(doc! { "idempotency_key": 1 })
					.options(
						IndexOptions::builder()
							.unique(true)
							.partial_filter_expression(doc! { "idempotency_key": { "$type": "string" } })
							.build(),
					)
					.build(),
			)
			.await
			.context("creating orders.idempotency_key unique index")?;

		self.deliveries
			.create_index(
				IndexModel::builder()
					.keys(doc! { "order_id": 1 })
					.options(IndexOptions::builder().unique(true).build())
					.build(),
			)
			.await
			.context("creating deliveries.order_id unique index")?;

		self.inventory
			.create_index(
				IndexModel::builder()
					.keys(doc! { "pharmacy_id": 1, "medicine_id": 1, "batch_number": 1 })
					.options(IndexOptions::builder().unique(true).build())
					.build(),
			)
			.await
			.context("creating inventory (pharmacy,medicine,batch) unique index")?;

		Ok(())
	}
}

/// `true` when a document-store write failed because it violated a unique
/// index (Mongo error code 11000) rather than for any other reason. Only
/// `insert_one`/`create_index` surface `WriteFailure::WriteError` this way;
/// bulk operations are not used anywhere in this codebase.
pub fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
	use mongodb::error::{ErrorKind, WriteFailure};
	matches!(
		e.kind.as_ref(),
		ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
	)
}

pub struct AppState {
	pub db: Collections,
	pub redis: ConnectionManager,
	pub events: EventOutbox,
	pub tokens: TokenSigner,
	pub rate_limiters: RateLimiters,
	pub config: GatewayConfig,
}

impl AppState {
	pub async fn new(config: GatewayConfig) -> Result<Self> {
		let mut mongo_opts =
			ClientOptions::parse_with_resolver_config(&config.mongo_uri, ResolverConfig::cloudflare())
				.await
				.context("parsing mongo_uri")?;
		mongo_opts.server_selection_timeout = Some(SELECTION_TIMEOUT);
		mongo_opts.socket_timeout = Some(SOCKET_TIMEOUT);
		let mongo = MongoClient::with_options(mongo_opts).context("connecting to document store")?;
		let db = mongo.database(&config.mongo_db);

		let redis_client =
			redis::Client::open(config.redis_uri.clone()).context("parsing redis_uri")?;
		let redis = ConnectionManager::new(redis_client)
			.await
			.context("connecting to key-value store")?;

		let events = EventOutbox::connect(&config.rabbitmq_uri)
			.await
			.context("connecting to event bus")?;

		let tokens = TokenSigner::new(
			config.token.secret.clone().into_bytes(),
			config.token.issuer.clone(),
			config.token.audience.clone(),
			config.token.access_ttl_secs,
			config.token.refresh_ttl_secs,
		);

		let collections = Collections::new(&db);
		collections.ensure_indexes().await?;

		Ok(Self {
			db: collections,
			redis,
			events,
			tokens,
			rate_limiters: RateLimiters::new(),
			config,
		})
	}
}

/// Selection timeout applied to document-store round trips (§5).
pub const SELECTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Socket timeout applied to document-store round trips (§5).
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(45);
