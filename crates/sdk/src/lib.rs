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

//! Shared types, error taxonomy and crypto/token primitives for the order
//! fulfillment control plane.
//!
//! The SDK is designed to be lightweight and embeddable:
//! - No background threads
//! - No runtime initialization
//! - No environment or configuration loading (besides the `config` builder helper)

pub mod config;
pub mod crypto;
pub mod error;
pub mod event;
pub mod mask;
pub mod token;
pub mod types;

pub use error::{ApiError, ErrorCode};
pub use event::{EventEnvelope, RoutingKey, Topic};
pub use token::{TokenError, TokenSigner};
pub use types::*;
