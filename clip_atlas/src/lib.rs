// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clip Atlas caches rasterized clip masks inside a shared texture atlas.
//!
//! A combined clip (an ordered list of [`ClipElement`]s belonging to one clip-stack record)
//! is rasterized into an alpha mask once and then reused for every draw that needs the same
//! mask, within a frame and across frames, until the atlas reclaims the space it lives in.
//!
//! The crate is split into:
//! - [`ClipAtlasManager`]: the entry point. Resolves clip masks, records uploads and drives
//!   compaction and teardown.
//! - [`atlas`]: the boundary to the atlas packing engine ([`AtlasEngine`]), the eviction
//!   callback ([`PlotEvictor`]) and the reference engine [`DrawAtlas`].
//! - Key and locator types ([`ClipMaskKey`], [`AtlasLocator`], [`Generation`]).
//!
//! ## Features
//!
//! - `std` (enabled by default): Get floating point functions from the standard library
//!   (likely using your target's libc).
//! - `libm`: Use floating point implementations from [libm].
//!
//! At least one of `std` and `libm` is required; `std` overrides `libm`.
//!
//! [libm]: https://crates.io/crates/libm

// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub use peniko::kurbo;

pub mod atlas;
mod error;
mod index;
mod key;
mod locator;
mod manager;
mod math;

pub use atlas::{AtlasConfig, AtlasEngine, DrawAtlas, PlotEvictor, ReclaimPolicy};
pub use atlas::upload::{MaskTarget, PlotUpload, UploadTarget};
pub use error::{PlacementError, UploadError, UploadErrorKind};
pub use key::{ClipElement, ClipElementId, ClipMaskKey, ClipOp, ClipShape};
pub use locator::{
    AtlasGenerationCounter, AtlasLocator, AtlasToken, Generation, PlotLocator, TextureId,
};
pub use manager::{ClipAtlasManager, ClipAtlasStats, ClipMask, MASK_PADDING, MaskRasterizer};
pub use math::{IntPoint, IntRect};
