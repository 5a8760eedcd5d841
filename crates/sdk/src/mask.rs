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

//! PII masking for log sinks. Applied to password, OTP digits, token
//! material, full phone and full email before any `tracing` emit.

/// Masks `value`: strings longer than 4 chars render as `***<last 4>`,
/// shorter ones as `****`.
pub fn mask(value: &str) -> String {
	let len = value.chars().count();
	if len > 4 {
		let tail: String = value.chars().skip(len - 4).collect();
		format!("***{tail}")
	} else {
		"****".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn masks_long_values() {
		assert_eq!(mask("securePass123"), "***s123");
		assert_eq!(mask("+919876543210"), "***3210");
	}

	#[test]
	fn masks_short_values_fully() {
		assert_eq!(mask("1234"), "****");
		assert_eq!(mask("ab"), "****");
		assert_eq!(mask(""), "****");
	}
}
