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

//! Pharma control-plane gateway: Identity Service, Order Service + Inventory
//! Coordinator, Pharmacist Gateway and Driver Gateway, hosted as modules of
//! one `actix-web` process (§9/§11).

mod admission;
mod auth;
mod catalog;
mod config;
mod driver;
mod events;
mod idempotency;
mod inventory;
mod logging;
mod middleware;
mod orders;
mod otel;
mod payment;
mod pharmacist;
mod request_context;
mod response;
mod routes;
mod state_machine;
mod store;
mod trace_context;
mod users;

use actix_web::{App, HttpServer, web};
use anyhow::Result;
use tracing::info;

use config::GatewayConfig;
use middleware::{CorsMiddleware, LoggingMiddleware};
use store::AppState;

#[actix_web::main]
async fn main() -> Result<()> {
	logging::init_logging()?;

	let config = GatewayConfig::from_env().unwrap_or_else(|e| {
		tracing::warn!(error = %e, "falling back to default gateway configuration");
		GatewayConfig::default()
	});
	let bind_addr = config.bind_addr;
	let workers = config.workers.unwrap_or_else(num_cpus::get);

	info!(%bind_addr, workers, "starting pharma gateway");
	let state = web::Data::new(AppState::new(config).await?);

	HttpServer::new(move || {
		App::new()
			.app_data(state.clone())
			.wrap(LoggingMiddleware)
			.wrap(CorsMiddleware)
			.configure(routes::configure_routes)
	})
	.workers(workers)
	.bind(bind_addr)?
	.run()
	.await?;

	Ok(())
}
