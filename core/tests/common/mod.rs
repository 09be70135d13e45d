// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - An in-memory DAV server standing in for the remote
//! - Agendas wired to it, and recurring event factories

mod fixtures;
mod mock_dav;

#[allow(unused_imports)]
pub use fixtures::{
    RemoteFixture, WORK_COLLECTION, berlin, on_day, remote_agenda, remote_agenda_with, remote_ics,
    series_rows, standup, test_config,
};
#[allow(unused_imports)]
pub use mock_dav::{MockConnector, MockDav};
