//! Pixel formats.
//!
//! Mirrors the underlying API's DXGI-style format enum. Only the subset
//! actually reachable from the RHI's resource-creation surface is
//! enumerated here; callers never see the native integer values, only this
//! enum, and the RHI maps to the native enum at resource creation time
//! (inside a concrete `GpuDevice` implementation, out of scope for this
//! crate).

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    Unknown,

    R8Unorm,
    R8Uint,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    R8G8B8A8Uint,
    B8G8R8A8Unorm,
    B8G8R8A8UnormSrgb,

    R16Float,
    R16G16Float,
    R16G16B16A16Float,
    R16G16B16A16Unorm,

    R32Float,
    R32G32Float,
    R32G32B32Float,
    R32G32B32A32Float,
    R32G32B32A32Uint,

    Bc1UnormSrgb,
    Bc3UnormSrgb,
    Bc4Unorm,
    Bc5Unorm,
    Bc7Unorm,
    Bc7UnormSrgb,

    D24UnormS8Uint,
    D32Float,
}

impl PixelFormat {
    /// Whether a surface of this format stores values outside the 0..1 range
    /// meaningfully, i.e. whether the display/tonemap path should treat it
    /// as HDR source data rather than display-referred color.
    pub fn is_hdr(self) -> bool {
        matches!(
            self,
            PixelFormat::R16Float
                | PixelFormat::R16G16Float
                | PixelFormat::R16G16B16A16Float
                | PixelFormat::R32Float
                | PixelFormat::R32G32Float
                | PixelFormat::R32G32B32Float
                | PixelFormat::R32G32B32A32Float
        )
    }

    /// Whether this format carries a depth and/or stencil aspect.
    pub fn is_depth_stencil(self) -> bool {
        matches!(self, PixelFormat::D24UnormS8Uint | PixelFormat::D32Float)
    }

    /// Whether this format is block-compressed.
    pub fn is_block_compressed(self) -> bool {
        matches!(
            self,
            PixelFormat::Bc1UnormSrgb
                | PixelFormat::Bc3UnormSrgb
                | PixelFormat::Bc4Unorm
                | PixelFormat::Bc5Unorm
                | PixelFormat::Bc7Unorm
                | PixelFormat::Bc7UnormSrgb
        )
    }

    /// Bytes per texel for uncompressed formats. Block-compressed formats
    /// are sized per-block by the caller; this returns `None` for them.
    pub fn texel_size(self) -> Option<u32> {
        use PixelFormat::*;
        Some(match self {
            Unknown => return None,
            R8Unorm | R8Uint => 1,
            R16Float => 2,
            R16G16Float => 4,
            R8G8B8A8Unorm
            | R8G8B8A8UnormSrgb
            | R8G8B8A8Uint
            | B8G8R8A8Unorm
            | B8G8R8A8UnormSrgb
            | R32Float
            | D24UnormS8Uint
            | D32Float => 4,
            R16G16B16A16Float | R16G16B16A16Unorm | R32G32Float => 8,
            R32G32B32Float => 12,
            R32G32B32A32Float | R32G32B32A32Uint => 16,
            Bc1UnormSrgb | Bc3UnormSrgb | Bc4Unorm | Bc5Unorm | Bc7Unorm | Bc7UnormSrgb => {
                return None
            }
        })
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hdr_formats_are_float() {
        assert!(PixelFormat::R16G16B16A16Float.is_hdr());
        assert!(!PixelFormat::R8G8B8A8Unorm.is_hdr());
    }

    #[test]
    fn block_compressed_has_no_texel_size() {
        assert_eq!(PixelFormat::Bc7Unorm.texel_size(), None);
        assert_eq!(PixelFormat::R8G8B8A8Unorm.texel_size(), Some(4));
    }
}
