//! Decoders for Arena's binary asset formats.

pub(crate) mod compression;
mod flc;
mod img;
mod voc;

pub use flc::FlcFile;
pub use img::{ImgFile, ImgMetadata};
pub use voc::VocFile;

use serde::{Deserialize, Serialize};

/// Number of entries in an 8-bit palette.
pub const PALETTE_SIZE: usize = 256;

/// Byte length of a serialized 256-entry RGB palette.
pub const PALETTE_BYTES: usize = PALETTE_SIZE * 3;

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Packs the color as `0xAARRGGBB`, the layout the renderer consumes.
    pub fn to_argb(self) -> u32 {
        (u32::from(self.a) << 24)
            | (u32::from(self.r) << 16)
            | (u32::from(self.g) << 8)
            | u32::from(self.b)
    }
}

/// A 256-color lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [Color; PALETTE_SIZE],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: [Color::default(); PALETTE_SIZE],
        }
    }
}

impl Palette {
    /// Builds a palette from 768 bytes of 6-bit VGA components, as stored in
    /// IMG files with built-in palettes. Old VGA hardware had 6-bit DACs, so
    /// components range 0..=63 and are rescaled to 0..=255. Entry 0 is
    /// transparent; the rest are opaque.
    pub fn from_vga(data: &[u8]) -> Option<Self> {
        let data = data.get(..PALETTE_BYTES)?;
        let mut palette = Self::default();
        for (index, rgb) in data.chunks_exact(3).enumerate() {
            let alpha = if index == 0 { 0 } else { 255 };
            palette.colors[index] = Color::new(
                scale_vga_component(rgb[0]),
                scale_vga_component(rgb[1]),
                scale_vga_component(rgb[2]),
                alpha,
            );
        }
        Some(palette)
    }

    /// Builds a palette from 768 bytes of full-range RGB components, as
    /// stored in FLC color chunks. All entries are opaque.
    pub fn from_rgb(data: &[u8]) -> Option<Self> {
        let data = data.get(..PALETTE_BYTES)?;
        let mut palette = Self::default();
        for (index, rgb) in data.chunks_exact(3).enumerate() {
            palette.colors[index] = Color::new(rgb[0], rgb[1], rgb[2], 255);
        }
        Some(palette)
    }

    pub fn get(&self, index: u8) -> Color {
        self.colors[usize::from(index)]
    }

    pub fn colors(&self) -> &[Color; PALETTE_SIZE] {
        &self.colors
    }
}

fn scale_vga_component(component: u8) -> u8 {
    let component = u32::from(component.min(63));
    (component * 255 / 63) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vga_palette_scales_six_bit_components() {
        let mut data = vec![0u8; PALETTE_BYTES];
        data[3] = 63; // Entry 1, red at full 6-bit intensity.
        data[4] = 31;
        // Components above 63 clamp before scaling.
        data[5] = 200;

        let palette = Palette::from_vga(&data).unwrap();
        assert_eq!(palette.get(0).a, 0);
        assert_eq!(palette.get(1), Color::new(255, 125, 255, 255));
    }

    #[test]
    fn rgb_palette_is_fully_opaque() {
        let mut data = vec![0u8; PALETTE_BYTES];
        data[0] = 10;
        let palette = Palette::from_rgb(&data).unwrap();
        assert_eq!(palette.get(0), Color::new(10, 0, 0, 255));
    }

    #[test]
    fn short_palette_data_is_rejected() {
        assert!(Palette::from_vga(&[0u8; 100]).is_none());
        assert!(Palette::from_rgb(&[0u8; 767]).is_none());
    }

    #[test]
    fn argb_packing() {
        let color = Color::new(0x11, 0x22, 0x33, 0x44);
        assert_eq!(color.to_argb(), 0x4411_2233);
    }
}
