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

//! The `{success, data?, error_code?, message?, details?}` success envelope
//! (§6). Error responses are produced separately by `ApiError`'s
//! `ResponseError` impl — this type only wraps success bodies.

use actix_web::{HttpResponse, http::StatusCode};
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
	pub success: bool,
	pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
	pub fn ok(data: T) -> HttpResponse {
		HttpResponse::Ok().json(Self { success: true, data })
	}

	pub fn created(data: T) -> HttpResponse {
		HttpResponse::build(StatusCode::CREATED).json(Self { success: true, data })
	}
}
