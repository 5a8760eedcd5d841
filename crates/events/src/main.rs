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

//! Event Processor (§4.8): a message-driven worker, independent of the
//! request-serving gateway process (§9), consuming lifecycle and inventory
//! events and performing fan-out.

mod config;
mod consumer;
mod handlers;
mod logging;
mod store;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use config::EventsConfig;
use store::EventsState;

#[tokio::main]
async fn main() -> Result<()> {
	logging::init_logging()?;

	let config = EventsConfig::from_env().unwrap_or_else(|e| {
		tracing::warn!(error = %e, "falling back to default events configuration");
		EventsConfig::default()
	});

	info!(rabbitmq_uri = %config.rabbitmq_uri, "starting pharma events worker");
	let state = Arc::new(EventsState::new(&config).await?);

	consumer::run(&config.rabbitmq_uri, state).await
}
