//! Display-class descriptors.
//!
//! A [`VisualInfo`] tells the engine what kind of display it is allocating
//! against: an indexed display with a scarce shared colormap, or a
//! true/direct-color display where pixel values encode color arithmetically.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the display derives color from pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualClass {
    /// Pixels index a small shared table of RGB triples; cells must be
    /// negotiated from the resource.
    Indexed,
    /// Pixel bits encode the color directly; no negotiation.
    TrueColor,
    /// Pixel bits index per-channel sub-palettes; no negotiation, but
    /// channel values pass through a sub-palette remap first.
    DirectColor,
}

impl VisualClass {
    /// True for the classes whose colors are computed, not negotiated.
    #[inline]
    pub fn is_direct(self) -> bool {
        matches!(self, VisualClass::TrueColor | VisualClass::DirectColor)
    }
}

/// Malformed or mismatched display descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VisualError {
    /// A channel mask of a direct-class visual is zero.
    #[error("{channel} channel mask is zero")]
    ZeroMask { channel: &'static str },

    /// A channel mask has holes; fields must be one contiguous bit run.
    #[error("{channel} channel mask is not a contiguous bit run")]
    NonContiguousMask { channel: &'static str },

    /// A DirectColor sub-palette needs at least two entries per channel.
    #[error("sub-palette length {0} is too short")]
    SubPaletteTooShort(usize),

    /// Direct-color mapping was requested on an indexed display.
    #[error("direct-color mapping requires a TrueColor or DirectColor display")]
    NotDirectClass,

    /// Cell negotiation was requested on a non-indexed display.
    #[error("cell allocation requires an indexed display")]
    NotIndexedClass,
}

/// Description of the display the engine is allocating against.
///
/// Deserializable so integrating applications can carry display definitions
/// in their configuration files.
///
/// # Example
///
/// ```
/// use cellmap::{VisualClass, VisualInfo};
///
/// let indexed = VisualInfo::indexed(256);
/// assert_eq!(indexed.class, VisualClass::Indexed);
///
/// let rgb565 = VisualInfo::true_color(0xF800, 0x07E0, 0x001F);
/// assert!(rgb565.class.is_direct());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualInfo {
    pub class: VisualClass,

    /// Channel bit masks; zero (and ignored) for indexed displays.
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,

    /// Indexed: total cells in the shared colormap.
    /// DirectColor: per-channel sub-palette length.
    /// TrueColor: ignored.
    pub colormap_len: usize,
}

impl VisualInfo {
    /// Descriptor for an indexed display with `colormap_len` cells.
    pub fn indexed(colormap_len: usize) -> Self {
        Self {
            class: VisualClass::Indexed,
            red_mask: 0,
            green_mask: 0,
            blue_mask: 0,
            colormap_len,
        }
    }

    /// Descriptor for a TrueColor display with the given channel masks.
    pub fn true_color(red_mask: u32, green_mask: u32, blue_mask: u32) -> Self {
        Self {
            class: VisualClass::TrueColor,
            red_mask,
            green_mask,
            blue_mask,
            colormap_len: 0,
        }
    }

    /// Descriptor for a DirectColor display: channel masks plus the
    /// per-channel sub-palette length.
    pub fn direct_color(
        red_mask: u32,
        green_mask: u32,
        blue_mask: u32,
        sub_palette_len: usize,
    ) -> Self {
        Self {
            class: VisualClass::DirectColor,
            red_mask,
            green_mask,
            blue_mask,
            colormap_len: sub_palette_len,
        }
    }
}
