use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::common::RgbaColor;

bitflags! {
    /// Rendering hints carried alongside a material.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MaterialFlags: u32 {
        /// Disable back-face culling
        const DOUBLE_SIDED = 0b0001;
        /// Alpha-blend this slot
        const TRANSPARENT = 0b0010;
        /// Selection/hover highlight; renderers may draw it on top
        const HIGHLIGHT = 0b0100;
    }
}

impl Default for MaterialFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// A flat display material.
///
/// The merged draw buffers keep one `Material` per slot, so recoloring a single
/// entity is an array write and never touches the buffer topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default)]
    pub name: Option<String>,
    pub color: RgbaColor,
    #[serde(default)]
    pub flags: MaterialFlags,
}

impl Material {
    pub fn new(color: RgbaColor) -> Self {
        Self {
            name: None,
            color,
            flags: MaterialFlags::empty(),
        }
    }

    /// The shared material used when the source geometry carries none.
    pub fn fallback() -> Self {
        Self::new(RgbaColor::GRAY).with_name("fallback")
    }

    /// A highlight material of the given color.
    pub fn highlight(color: RgbaColor) -> Self {
        let mut material = Self::new(color).with_name("highlight");
        material.flags |= MaterialFlags::HIGHLIGHT;
        if color.a < 1.0 {
            material.flags |= MaterialFlags::TRANSPARENT;
        }
        material
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_highlight(&self) -> bool {
        self.flags.contains(MaterialFlags::HIGHLIGHT)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::fallback()
    }
}
