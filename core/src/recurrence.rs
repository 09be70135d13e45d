// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Recurrence rules and their expansion into concrete occurrences.

mod expand;
mod rule;

pub use expand::{Expansion, Limits, Occurrence, expand};
pub(crate) use expand::slots_before;
pub use rule::{Frequency, Recurrence, Until, WeekdayNum};
