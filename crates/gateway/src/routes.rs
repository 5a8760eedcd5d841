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

//! Route table (§6): every handler module is wired into one `actix_web::App`
//! here, grouped by prefix.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::{auth, catalog, driver, orders, payment, pharmacist, users};

#[derive(Serialize)]
struct Health {
	status: &'static str,
}

async fn health() -> HttpResponse {
	HttpResponse::Ok().json(Health { status: "ok" })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
	cfg.route("/health", web::get().to(health));

	cfg.service(
		web::scope("/api/v1/auth")
			.route("/register", web::post().to(auth::register))
			.route("/verify-otp", web::post().to(auth::verify_otp))
			.route("/login", web::post().to(auth::login))
			.route("/refresh", web::post().to(auth::refresh))
			.route("/logout", web::post().to(auth::logout))
			.route("/me", web::get().to(auth::me))
			.route("/admin/create-pharmacist", web::post().to(auth::create_pharmacist))
			.route("/admin/create-driver", web::post().to(auth::create_driver)),
	);

	// Registered before the bare `/api/v1` scope below: actix-web dispatches to
	// the first service whose prefix matches, so the more specific
	// `/api/v1/pharmacist` and `/api/v1/driver` scopes must come first or every
	// request under them gets claimed (and 404'd) by `/api/v1` instead (§6).
	cfg.service(
		web::scope("/api/v1/pharmacist")
			.route("/orders/{id}/accept", web::post().to(pharmacist::accept_order))
			.route("/orders/{id}/decline", web::post().to(pharmacist::decline_order))
			.route("/orders/{id}/prepared", web::post().to(pharmacist::prepared_order))
			.route("/inventory", web::get().to(pharmacist::list_inventory))
			.route("/inventory", web::post().to(pharmacist::add_inventory))
			.route("/inventory/{id}", web::put().to(pharmacist::update_inventory))
			.route("/inventory/{id}", web::delete().to(pharmacist::delete_inventory)),
	);

	cfg.service(
		web::scope("/api/v1/driver")
			.route("/deliveries/available", web::get().to(driver::list_available))
			.route("/deliveries/{id}/accept", web::post().to(driver::accept_delivery))
			.route("/deliveries/{id}/status", web::post().to(driver::update_status))
			.route("/deliveries/{id}/location", web::post().to(driver::update_location))
			.route("/deliveries/{id}/confirm", web::post().to(driver::confirm_delivery)),
	);

	cfg.service(
		web::scope("/api/v1")
			.route("/orders", web::post().to(orders::create_order))
			.route("/orders", web::get().to(orders::list_orders))
			.route("/orders/{id}", web::get().to(orders::get_order))
			.route("/orders/{id}/cancel", web::post().to(orders::cancel_order))
			.route("/orders/{id}/rate", web::post().to(orders::rate_order))
			.route("/payment/webhook", web::post().to(payment::webhook))
			.route("/payment/simulate", web::post().to(payment::simulate))
			.route("/users/profile", web::get().to(users::get_profile))
			.route("/users/profile", web::put().to(users::update_profile))
			.route("/users/cart", web::get().to(users::get_cart))
			.route("/users/cart", web::put().to(users::update_cart))
			.route("/pharmacies", web::get().to(catalog::list_pharmacies))
			.route("/pharmacies/{id}", web::get().to(catalog::get_pharmacy))
			.route("/pharmacies/{id}/inventory", web::get().to(catalog::pharmacy_inventory))
			.route("/medicines/search", web::get().to(catalog::search_medicines))
			.route("/medicines/{id}", web::get().to(catalog::get_medicine)),
	);
}
