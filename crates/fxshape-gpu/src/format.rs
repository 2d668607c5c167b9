//! Pixel-format policy.
//!
//! Maps the host's description of an image tile (component depth + encoding)
//! to the render-target format used for pipeline lookup. Pipelines are keyed
//! by format, so this must run before any pipeline request.

/// Numeric encoding of each color component in a host frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComponentEncoding {
    /// Integer components normalized to `[0, 1]`.
    UnsignedNormalized,
    /// IEEE floating point components.
    Float,
}

/// The part of a host image tile that determines the GPU pixel format.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FrameDescriptor {
    pub bits_per_component: u32,
    pub encoding: ComponentEncoding,
}

impl FrameDescriptor {
    #[inline]
    pub const fn new(bits_per_component: u32, encoding: ComponentEncoding) -> Self {
        Self {
            bits_per_component,
            encoding,
        }
    }

    #[inline]
    pub const fn unorm8() -> Self {
        Self::new(8, ComponentEncoding::UnsignedNormalized)
    }

    #[inline]
    pub const fn float16() -> Self {
        Self::new(16, ComponentEncoding::Float)
    }

    #[inline]
    pub const fn float32() -> Self {
        Self::new(32, ComponentEncoding::Float)
    }
}

/// Closed set of render-target formats the overlay pipelines are built for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
}

impl PixelFormat {
    /// Format used when a frame descriptor is not recognized.
    pub const FALLBACK: PixelFormat = PixelFormat::Rgba8Unorm;

    pub const ALL: [PixelFormat; 3] = [
        PixelFormat::Rgba8Unorm,
        PixelFormat::Rgba16Float,
        PixelFormat::Rgba32Float,
    ];

    #[inline]
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }

    /// Short lowercase name used in labels and log lines.
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgba8Unorm => "rgba8unorm",
            PixelFormat::Rgba16Float => "rgba16float",
            PixelFormat::Rgba32Float => "rgba32float",
        }
    }
}

/// Resolves the render-target format for a host frame.
///
/// | bits | encoding | format        |
/// |------|----------|---------------|
/// | 8    | any      | `Rgba8Unorm`  |
/// | 16   | any      | `Rgba16Float` |
/// | 32   | float    | `Rgba32Float` |
///
/// 16-bit integer frames are promoted to half float because the portable
/// wgpu format set has no blendable 16-bit normalized target. Anything else
/// resolves to [`PixelFormat::FALLBACK`].
pub fn resolve_pixel_format(frame: &FrameDescriptor) -> PixelFormat {
    match (frame.bits_per_component, frame.encoding) {
        (8, _) => PixelFormat::Rgba8Unorm,
        (16, _) => PixelFormat::Rgba16Float,
        (32, ComponentEncoding::Float) => PixelFormat::Rgba32Float,
        _ => {
            log::debug!(
                "unrecognized frame ({} bpc, {:?}); using {}",
                frame.bits_per_component,
                frame.encoding,
                PixelFormat::FALLBACK.name()
            );
            PixelFormat::FALLBACK
        }
    }
}
