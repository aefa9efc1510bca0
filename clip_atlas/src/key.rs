// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clip elements and the clip mask cache key.

use core::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::kurbo::{Affine, BezPath, Rect, RoundedRect};
use crate::math::IntRect;

/// Stable identity of a clip element.
///
/// Assigned by the clip stack when an element is recorded. Two elements with the same id
/// must describe the same geometry; the id is what makes geometry comparable in a
/// [`ClipMaskKey`] without hashing paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipElementId(pub u32);

/// How an element combines with the clip accumulated so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClipOp {
    /// Keep only coverage inside the element.
    #[default]
    Intersect,
    /// Remove coverage inside the element.
    Difference,
}

/// Geometry of a clip element, in the element's local space.
#[derive(Clone, Debug)]
pub enum ClipShape {
    /// An axis-aligned rectangle.
    Rect(Rect),
    /// A rounded rectangle.
    RoundedRect(RoundedRect),
    /// An arbitrary path, filled with the non-zero rule.
    Path(BezPath),
}

/// A single element of a clip stack.
#[derive(Clone, Debug)]
pub struct ClipElement {
    /// Unique identity of this element.
    pub id: ClipElementId,
    /// The element geometry.
    pub shape: ClipShape,
    /// Local-to-device transform.
    pub transform: Affine,
    /// Combination rule.
    pub op: ClipOp,
    /// Whether the element edges are anti-aliased.
    pub anti_alias: bool,
}

impl ClipElement {
    /// Creates an anti-aliased intersect element with an identity transform.
    pub fn new(id: u32, shape: ClipShape) -> Self {
        Self {
            id: ClipElementId(id),
            shape,
            transform: Affine::IDENTITY,
            op: ClipOp::Intersect,
            anti_alias: true,
        }
    }

    /// Sets the local-to-device transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the combination rule.
    #[must_use]
    pub fn with_op(mut self, op: ClipOp) -> Self {
        self.op = op;
        self
    }

    /// Sets whether edges are anti-aliased.
    #[must_use]
    pub fn with_anti_alias(mut self, anti_alias: bool) -> Self {
        self.anti_alias = anti_alias;
        self
    }
}

/// The part of an element that contributes to the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ElementKey {
    id: ClipElementId,
    op: ClipOp,
    anti_alias: bool,
}

/// Unique identifier for a rasterized clip mask.
///
/// Two masks with equal keys have identical pixels and can share one atlas slot. The key
/// covers the owning clip-stack record, every element (in order) and the integer device
/// bounds the mask is rasterized for.
#[derive(Clone, Debug)]
pub struct ClipMaskKey {
    stack_record_id: u32,
    bounds: IntRect,
    elements: SmallVec<[ElementKey; 8]>,
}

impl ClipMaskKey {
    /// Creates the key for a combined mask.
    pub fn new(stack_record_id: u32, elements: &[ClipElement], bounds: IntRect) -> Self {
        Self {
            stack_record_id,
            bounds,
            elements: elements
                .iter()
                .map(|element| ElementKey {
                    id: element.id,
                    op: element.op,
                    anti_alias: element.anti_alias,
                })
                .collect(),
        }
    }

    /// The owning clip-stack record.
    #[inline]
    pub fn stack_record_id(&self) -> u32 {
        self.stack_record_id
    }

    /// Device bounds of the mask.
    #[inline]
    pub fn bounds(&self) -> IntRect {
        self.bounds
    }

    /// Number of elements combined into the mask.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

impl Hash for ClipMaskKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stack_record_id.hash(state);
        self.bounds.hash(state);
        // Length prefix keeps `[a, b]` and `[a], [b]` splits apart.
        self.elements.len().hash(state);
        for element in &self.elements {
            element.hash(state);
        }
    }
}

impl PartialEq for ClipMaskKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.stack_record_id == other.stack_record_id
            && self.bounds == other.bounds
            && self.elements == other.elements
    }
}

impl Eq for ClipMaskKey {}
