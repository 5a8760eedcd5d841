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

//! The stable `error_code` taxonomy, carried over HTTP as
//! `{success, data?, error_code?, message?, details?}`.

use actix_web::{HttpResponse, http::StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Stable, client-facing error code. `Display` renders the exact wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorCode {
	// authentication / authorization
	#[error("INVALID_CREDENTIALS")]
	InvalidCredentials,
	#[error("TOKEN_EXPIRED")]
	TokenExpired,
	#[error("TOKEN_INVALID")]
	TokenInvalid,
	#[error("UNAUTHORIZED")]
	Unauthorized,
	#[error("FORBIDDEN")]
	Forbidden,
	#[error("USER_EXISTS")]
	UserExists,
	#[error("USER_NOT_FOUND")]
	UserNotFound,
	#[error("OTP_INVALID")]
	OtpInvalid,
	#[error("OTP_EXPIRED")]
	OtpExpired,
	#[error("RATE_LIMITED")]
	RateLimited,
	// validation
	#[error("VALIDATION_ERROR")]
	ValidationError,
	#[error("INVALID_INPUT")]
	InvalidInput,
	#[error("MISSING_FIELD")]
	MissingField,
	#[error("BAD_REQUEST")]
	BadRequest,
	// order / inventory
	#[error("ORDER_NOT_FOUND")]
	OrderNotFound,
	#[error("ORDER_CANNOT_CANCEL")]
	OrderCannotCancel,
	#[error("INVALID_TRANSITION")]
	InvalidTransition,
	#[error("INSUFFICIENT_STOCK")]
	InsufficientStock,
	#[error("INVENTORY_LOCKED")]
	InventoryLocked,
	#[error("IDEMPOTENCY_CONFLICT")]
	IdempotencyConflict,
	#[error("INVENTORY_NOT_FOUND")]
	InventoryNotFound,
	#[error("BATCH_EXISTS")]
	BatchExists,
	#[error("PHARMACY_NOT_FOUND")]
	PharmacyNotFound,
	#[error("MEDICINE_NOT_FOUND")]
	MedicineNotFound,
	// delivery
	#[error("DELIVERY_NOT_FOUND")]
	DeliveryNotFound,
	#[error("DELIVERY_OTP_INVALID")]
	DeliveryOtpInvalid,
	#[error("DRIVER_NOT_AVAILABLE")]
	DriverNotAvailable,
	// infrastructure
	#[error("DATABASE_ERROR")]
	DatabaseError,
	#[error("EXTERNAL_SERVICE_ERROR")]
	ExternalServiceError,
	#[error("SERVICE_UNAVAILABLE")]
	ServiceUnavailable,
	#[error("INTERNAL_ERROR")]
	InternalError,
}

impl ErrorCode {
	/// The HTTP status this error code maps to.
	pub fn status_code(self) -> StatusCode {
		use ErrorCode::*;
		match self {
			InvalidCredentials | TokenExpired | TokenInvalid | Unauthorized => {
				StatusCode::UNAUTHORIZED
			}
			Forbidden => StatusCode::FORBIDDEN,
			UserExists | IdempotencyConflict | BatchExists => StatusCode::CONFLICT,
			UserNotFound | OrderNotFound | InventoryNotFound | PharmacyNotFound
			| MedicineNotFound | DeliveryNotFound => StatusCode::NOT_FOUND,
			OtpInvalid | OtpExpired | DeliveryOtpInvalid => StatusCode::BAD_REQUEST,
			RateLimited => StatusCode::TOO_MANY_REQUESTS,
			ValidationError | InvalidInput | MissingField | BadRequest => {
				StatusCode::BAD_REQUEST
			}
			OrderCannotCancel | InvalidTransition | DriverNotAvailable => StatusCode::CONFLICT,
			InsufficientStock | InventoryLocked => StatusCode::CONFLICT,
			DatabaseError | InternalError => StatusCode::INTERNAL_SERVER_ERROR,
			ExternalServiceError | ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
		}
	}
}

/// Domain error carrying a stable code plus an optional human message and
/// structured detail payload (e.g. per-line reservation failures).
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
	pub code: ErrorCode,
	pub message: String,
	pub details: Option<Value>,
}

impl ApiError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			details: None,
		}
	}

	pub fn with_details(mut self, details: Value) -> Self {
		self.details = Some(details);
		self
	}
}

#[derive(Serialize)]
struct ErrorBody<'a> {
	success: bool,
	error_code: &'static str,
	message: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	details: &'a Option<Value>,
}

impl actix_web::ResponseError for ApiError {
	fn status_code(&self) -> StatusCode {
		self.code.status_code()
	}

	fn error_response(&self) -> HttpResponse {
		HttpResponse::build(self.status_code()).json(ErrorBody {
			success: false,
			error_code: error_code_str(self.code),
			message: &self.message,
			details: &self.details,
		})
	}
}

fn error_code_str(code: ErrorCode) -> &'static str {
	// `ErrorCode`'s `Display` impl (derived via `#[error("...")]`) already
	// renders the exact wire string; leak-free via a match keeps this `&'static str`.
	match code {
		ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
		ErrorCode::TokenExpired => "TOKEN_EXPIRED",
		ErrorCode::TokenInvalid => "TOKEN_INVALID",
		ErrorCode::Unauthorized => "UNAUTHORIZED",
		ErrorCode::Forbidden => "FORBIDDEN",
		ErrorCode::UserExists => "USER_EXISTS",
		ErrorCode::UserNotFound => "USER_NOT_FOUND",
		ErrorCode::OtpInvalid => "OTP_INVALID",
		ErrorCode::OtpExpired => "OTP_EXPIRED",
		ErrorCode::RateLimited => "RATE_LIMITED",
		ErrorCode::ValidationError => "VALIDATION_ERROR",
		ErrorCode::InvalidInput => "INVALID_INPUT",
		ErrorCode::MissingField => "MISSING_FIELD",
		ErrorCode::BadRequest => "BAD_REQUEST",
		ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
		ErrorCode::OrderCannotCancel => "ORDER_CANNOT_CANCEL",
		ErrorCode::InvalidTransition => "INVALID_TRANSITION",
		ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
		ErrorCode::InventoryLocked => "INVENTORY_LOCKED",
		ErrorCode::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
		ErrorCode::InventoryNotFound => "INVENTORY_NOT_FOUND",
		ErrorCode::BatchExists => "BATCH_EXISTS",
		ErrorCode::PharmacyNotFound => "PHARMACY_NOT_FOUND",
		ErrorCode::MedicineNotFound => "MEDICINE_NOT_FOUND",
		ErrorCode::DeliveryNotFound => "DELIVERY_NOT_FOUND",
		ErrorCode::DeliveryOtpInvalid => "DELIVERY_OTP_INVALID",
		ErrorCode::DriverNotAvailable => "DRIVER_NOT_AVAILABLE",
		ErrorCode::DatabaseError => "DATABASE_ERROR",
		ErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
		ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
		ErrorCode::InternalError => "INTERNAL_ERROR",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_codes_match_taxonomy() {
		assert_eq!(
			ErrorCode::InsufficientStock.status_code(),
			StatusCode::CONFLICT
		);
		assert_eq!(ErrorCode::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(ErrorCode::OrderNotFound.status_code(), StatusCode::NOT_FOUND);
	}

	#[test]
	fn error_response_carries_code() {
		let err = ApiError::new(ErrorCode::InsufficientStock, "not enough stock");
		assert_eq!(error_code_str(err.code), "INSUFFICIENT_STOCK");
	}
}
