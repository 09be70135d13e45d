// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end workflow tests for the calsync-core crate.
//!
//! These tests drive the agenda against an in-memory DAV server: editing
//! recurring series under every save mode, picking up remote changes, and
//! recovering from concurrent writes.

mod conflicts;
mod ics_snapshot;
mod recurring_edits;
mod remote_sync;
