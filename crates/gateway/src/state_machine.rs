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

//! The §4.2 order lifecycle graph. Pure functions only — actual transitions
//! are applied by callers via the document store's conditional update
//! (`update WHERE id = X AND status = S_from`) so the winner of a race is
//! determined by the store, not by this module.

use pharma_sdk::OrderStatus;

/// Returns `true` when `from -> to` is a legal §4.2 transition.
pub fn is_allowed(from: OrderStatus, to: OrderStatus) -> bool {
	use OrderStatus::*;
	matches!(
		(from, to),
		(Created, AcceptedByPharmacy)
			| (Created, Cancelled)
			| (AcceptedByPharmacy, Prepared)
			| (AcceptedByPharmacy, Cancelled)
			| (Prepared, DriverAssigned)
			| (Prepared, Cancelled)
			| (DriverAssigned, InTransit)
			| (DriverAssigned, Cancelled)
			| (InTransit, Delivered)
			| (InTransit, Failed)
	)
}

/// Status values from which a customer-initiated cancellation is allowed
/// (§4.2, open question (c)): exactly `{created, accepted_by_pharmacy, prepared}`.
pub fn customer_may_cancel(from: OrderStatus) -> bool {
	matches!(
		from,
		OrderStatus::Created | OrderStatus::AcceptedByPharmacy | OrderStatus::Prepared
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use OrderStatus::*;

	#[test]
	fn created_may_move_to_accepted_or_cancelled() {
		assert!(is_allowed(Created, AcceptedByPharmacy));
		assert!(is_allowed(Created, Cancelled));
		assert!(!is_allowed(Created, Prepared));
	}

	#[test]
	fn terminal_states_have_no_outgoing_edges() {
		assert!(!is_allowed(Delivered, Cancelled));
		assert!(!is_allowed(Cancelled, Created));
		assert!(!is_allowed(Failed, Created));
	}

	#[test]
	fn cancellation_forbidden_after_driver_assigned() {
		assert!(!customer_may_cancel(DriverAssigned));
		assert!(!customer_may_cancel(InTransit));
		assert!(customer_may_cancel(Prepared));
	}
}
