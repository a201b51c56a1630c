// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for codeassist
//!
//! Handles loading, saving, and managing user settings and the small
//! key-value state remembered between runs.

pub mod settings;
pub mod state;

pub use settings::*;
pub use state::PersistedState;
