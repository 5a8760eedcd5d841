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

//! Shared `config`-crate loading helper. Both services expose a
//! `<Service>Config::from_env()`/`from_file()` pair built on this.

use serde::de::DeserializeOwned;

/// Builds a typed config of type `T` by layering environment variables
/// (prefixed with `prefix`, e.g. `GATEWAY_PORT`) over the `Default` impl of
/// `T`, exactly as `config::Config::builder().add_source(Environment)` is
/// used elsewhere in this codebase.
pub fn load_from_env<T: DeserializeOwned + Default + serde::Serialize>(
	prefix: &str,
) -> Result<T, config::ConfigError> {
	let defaults = config::Config::try_from(&T::default())?;
	let cfg = config::Config::builder()
		.add_source(defaults)
		.add_source(config::Environment::with_prefix(prefix).separator("__"))
		.build()?;
	cfg.try_deserialize()
}

/// Same as [`load_from_env`] but additionally layers a config file (TOML/
/// JSON/YAML — inferred by `config::File` from extension) beneath the
/// environment overrides.
pub fn load_from_file<T: DeserializeOwned + Default + serde::Serialize>(
	prefix: &str,
	path: &str,
) -> Result<T, config::ConfigError> {
	let defaults = config::Config::try_from(&T::default())?;
	let cfg = config::Config::builder()
		.add_source(defaults)
		.add_source(config::File::with_name(path).required(false))
		.add_source(config::Environment::with_prefix(prefix).separator("__"))
		.build()?;
	cfg.try_deserialize()
}
