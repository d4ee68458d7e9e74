// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod database;
mod guard;
mod logging;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use guard::{GuardConfig, GuardConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer, LOG_LEVELS};
