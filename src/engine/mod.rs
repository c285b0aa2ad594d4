// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Coordinator, topology, and the line-oriented session driver.

mod config;
mod coordinator;
mod error;
mod session;

pub use config::SystemConfig;
pub use coordinator::Coordinator;
pub use error::EngineError;
pub use session::Session;
