// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::locator::TextureId;

/// Why the atlas could not place a mask.
///
/// Placement failures are recoverable: the caller clips without the atlas for this draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlacementError {
    /// The requested area has no pixels.
    Empty,
    /// The request does not fit in a single plot.
    TooLarge,
    /// Every plot is full and in use by the current flush.
    AtlasFull,
}

impl core::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "requested mask area is empty"),
            Self::TooLarge => write!(f, "requested mask does not fit in a plot"),
            Self::AtlasFull => write!(f, "no plot can be reclaimed during this flush"),
        }
    }
}

impl core::error::Error for PlacementError {}

/// Failure to transfer staged mask pixels to a page texture.
///
/// The affected plot stays dirty, so the next successful upload pass retries it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadError {
    kind: UploadErrorKind,
    texture: TextureId,
}

impl UploadError {
    /// Creates an error for an upload into `texture`.
    pub fn new(kind: UploadErrorKind, texture: TextureId) -> Self {
        Self { kind, texture }
    }

    /// The machine-readable category for this error.
    pub fn kind(&self) -> UploadErrorKind {
        self.kind
    }

    /// The page texture the upload targeted.
    pub fn texture(&self) -> TextureId {
        self.texture
    }
}

impl core::fmt::Display for UploadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            UploadErrorKind::Rejected => {
                write!(f, "upload to texture {} was rejected", self.texture.0)
            }
            UploadErrorKind::DeviceLost => {
                write!(f, "device lost while uploading to texture {}", self.texture.0)
            }
        }
    }
}

impl core::error::Error for UploadError {}

/// The non-exhaustive category of an [`UploadError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum UploadErrorKind {
    /// The recording context refused the upload.
    Rejected,
    /// The device was lost; only a full reset recovers.
    DeviceLost,
}
