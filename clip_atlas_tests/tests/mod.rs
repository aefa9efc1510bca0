// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! This crate contains the integration test suite for `clip_atlas`.
//!
//! - The `util` module contains the fixtures shared by the tests: a scriptable atlas engine,
//!   a counting rasterizer and a recording upload target.
//! - Tests are grouped by topic: `resolve` for lookups and placement, `lifecycle` for
//!   eviction, compaction, resets and uploads, and `consistency` for randomized sequences.

#![allow(missing_docs, reason = "we don't need docs for testing")]
#![allow(clippy::cast_possible_truncation, reason = "not critical for testing")]

mod util;
