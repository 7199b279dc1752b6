// Copyright 2025 keypool Authors
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

//! # keypool CLI
//!
//! Command-line interface for the keypool client pool.
//!
//! This crate provides two commands:
//!
//! - **serve**: run a TCP echo endpoint under an endpoint key
//! - **call**: dispatch one request through a [`ClientPool`] built from
//!   `<key>@<addr>` entries and print the JSON result
//!
//! ## Architecture
//!
//! The CLI uses the `argh` crate for argument parsing. The binary only parses
//! arguments and sets up logging; the work lives in [`serve`] and [`call`]
//! so it can be tested without spawning processes.
//!
//! [`ClientPool`]: keypool_client::ClientPool

pub mod call;
pub mod serve;
