//! Bit-exact guest register encodings and their host-side interpretations.
//!
//! The guest accepts two encoding families for most fixed-function enums: a
//! compact one and a GL-style one. Both decode here. Unknown raw values are a
//! recoverable guest malformation: they log at `debug!` and fall back to the
//! safe default documented per type, never failing the draw.

use tracing::debug;

/// Comparison function shared by depth, stencil and alpha tests.
///
/// Guest encodings: `1..=8` or `0x200..=0x207`. Fallback: `Always`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

impl CompareOp {
    pub fn from_guest(raw: u32) -> Self {
        let index = match raw {
            1..=8 => raw - 1,
            0x200..=0x207 => raw - 0x200,
            _ => {
                debug!(raw, "unknown comparison op");
                return Self::Always;
            }
        };
        match index {
            0 => Self::Never,
            1 => Self::Less,
            2 => Self::Equal,
            3 => Self::LessOrEqual,
            4 => Self::Greater,
            5 => Self::NotEqual,
            6 => Self::GreaterOrEqual,
            _ => Self::Always,
        }
    }
}

/// Stencil side operation.
///
/// Guest encodings: `1..=8` or the GL token values. Fallback: `Keep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

impl StencilOp {
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            1 | 0x1E00 => Self::Keep,
            2 | 0 => Self::Zero,
            3 | 0x1E01 => Self::Replace,
            4 | 0x1E02 => Self::IncrementClamp,
            5 | 0x1E03 => Self::DecrementClamp,
            6 | 0x150A => Self::Invert,
            7 | 0x8507 => Self::IncrementWrap,
            8 | 0x8508 => Self::DecrementWrap,
            _ => {
                debug!(raw, "unknown stencil op");
                Self::Keep
            }
        }
    }
}

/// Blend factor. Guest encodings: `0x01..=0x13` or the GL token family.
/// Fallback: `One`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    Src1Color,
    OneMinusSrc1Color,
    Src1Alpha,
    OneMinusSrc1Alpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

impl BlendFactor {
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            0x01 | 0x4000 => Self::Zero,
            0x02 | 0x4001 => Self::One,
            0x03 | 0x4300 => Self::SrcColor,
            0x04 | 0x4301 => Self::OneMinusSrcColor,
            0x05 | 0x4302 => Self::SrcAlpha,
            0x06 | 0x4303 => Self::OneMinusSrcAlpha,
            0x07 | 0x4304 => Self::DstAlpha,
            0x08 | 0x4305 => Self::OneMinusDstAlpha,
            0x09 | 0x4306 => Self::DstColor,
            0x0A | 0x4307 => Self::OneMinusDstColor,
            0x0B | 0x4308 => Self::SrcAlphaSaturate,
            0x10 | 0xC900 => Self::Src1Color,
            0x11 | 0xC901 => Self::OneMinusSrc1Color,
            0x12 | 0xC902 => Self::Src1Alpha,
            0x13 | 0xC903 => Self::OneMinusSrc1Alpha,
            0x0E | 0xC001 => Self::ConstantColor,
            0x0F | 0xC002 => Self::OneMinusConstantColor,
            0xC003 => Self::ConstantAlpha,
            0xC004 => Self::OneMinusConstantAlpha,
            _ => {
                debug!(raw, "unknown blend factor");
                Self::One
            }
        }
    }
}

/// Blend equation. Guest encodings: `1..=5` or GL tokens. Fallback: `Add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl BlendOp {
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            1 | 0x8006 => Self::Add,
            2 | 0x800A => Self::Subtract,
            3 | 0x800B => Self::ReverseSubtract,
            4 | 0x8007 => Self::Min,
            5 | 0x8008 => Self::Max,
            _ => {
                debug!(raw, "unknown blend op");
                Self::Add
            }
        }
    }
}

/// Triangle winding considered front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

impl FrontFace {
    /// Guest encodings: `0x900` (CW) / `0x901` (CCW). Fallback: `CounterClockwise`.
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            0x900 => Self::Clockwise,
            0x901 => Self::CounterClockwise,
            _ => {
                debug!(raw, "unknown front face");
                Self::CounterClockwise
            }
        }
    }

    pub fn inverted(self) -> Self {
        match self {
            Self::Clockwise => Self::CounterClockwise,
            Self::CounterClockwise => Self::Clockwise,
        }
    }
}

/// Which faces get culled. Guest encodings: `0x404`/`0x405`/`0x408`.
/// Fallback: `Back`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    Front,
    Back,
    FrontAndBack,
}

impl CullFace {
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            0x404 => Self::Front,
            0x405 => Self::Back,
            0x408 => Self::FrontAndBack,
            _ => {
                debug!(raw, "unknown cull face");
                Self::Back
            }
        }
    }
}

/// Polygon rasterization mode. Guest encodings: `0x1B00..=0x1B02`.
/// Fallback: `Fill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Point,
    Line,
    Fill,
}

impl PolygonMode {
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            0x1B00 => Self::Point,
            0x1B01 => Self::Line,
            0x1B02 => Self::Fill,
            _ => {
                debug!(raw, "unknown polygon mode");
                Self::Fill
            }
        }
    }
}

/// Framebuffer logic operation. Guest encodings: `0x1500..=0x150F` or the
/// bare index. Fallback: `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    Clear,
    And,
    AndReverse,
    Copy,
    AndInverted,
    Noop,
    Xor,
    Or,
    Nor,
    Equiv,
    Invert,
    OrReverse,
    CopyInverted,
    OrInverted,
    Nand,
    Set,
}

impl LogicOp {
    pub fn from_guest(raw: u32) -> Self {
        const TABLE: [LogicOp; 16] = [
            LogicOp::Clear,
            LogicOp::And,
            LogicOp::AndReverse,
            LogicOp::Copy,
            LogicOp::AndInverted,
            LogicOp::Noop,
            LogicOp::Xor,
            LogicOp::Or,
            LogicOp::Nor,
            LogicOp::Equiv,
            LogicOp::Invert,
            LogicOp::OrReverse,
            LogicOp::CopyInverted,
            LogicOp::OrInverted,
            LogicOp::Nand,
            LogicOp::Set,
        ];
        let index = raw.wrapping_sub(if raw >= 0x1500 { 0x1500 } else { 0 });
        match TABLE.get(index as usize) {
            Some(&op) => op,
            None => {
                debug!(raw, "unknown logic op");
                Self::Copy
            }
        }
    }
}

/// Draw primitive topology as issued by the begin-draw method.
/// Fallback: `Triangles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    QuadStrip,
    Polygon,
    LinesAdjacency,
    LineStripAdjacency,
    TrianglesAdjacency,
    TriangleStripAdjacency,
    Patches,
}

impl PrimitiveTopology {
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            0 => Self::Points,
            1 => Self::Lines,
            2 => Self::LineLoop,
            3 => Self::LineStrip,
            4 => Self::Triangles,
            5 => Self::TriangleStrip,
            6 => Self::TriangleFan,
            7 => Self::Quads,
            8 => Self::QuadStrip,
            9 => Self::Polygon,
            10 => Self::LinesAdjacency,
            11 => Self::LineStripAdjacency,
            12 => Self::TrianglesAdjacency,
            13 => Self::TriangleStripAdjacency,
            14 => Self::Patches,
            _ => {
                debug!(raw, "unknown primitive topology");
                Self::Triangles
            }
        }
    }
}

/// Index buffer element kind. Guest encoding: 0/1/2. Fallback: `U32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    U8,
    U16,
    U32,
}

impl IndexKind {
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            0 => Self::U8,
            1 => Self::U16,
            2 => Self::U32,
            _ => {
                debug!(raw, "unknown index kind");
                Self::U32
            }
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Number of distinct index values the kind can encode, used to bound
    /// vertex buffer sizes on small-index draws.
    pub fn value_count(self) -> Option<u64> {
        match self {
            Self::U8 => Some(1 << 8),
            Self::U16 => Some(1 << 16),
            Self::U32 => None,
        }
    }
}

/// Depth clip space the guest expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthMode {
    ZeroToOne,
    MinusOneToOne,
}

/// Per-axis multisample layout. Fallback: 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsaaMode {
    Ms1x1,
    Ms2x1,
    Ms2x2,
    Ms4x2,
    Ms4x4,
}

impl MsaaMode {
    pub fn from_guest(raw: u32) -> Self {
        match raw {
            0 => Self::Ms1x1,
            1 => Self::Ms2x1,
            2 => Self::Ms2x2,
            4 => Self::Ms4x2,
            6 => Self::Ms4x4,
            _ => {
                debug!(raw, "unknown multisample mode");
                Self::Ms1x1
            }
        }
    }

    pub fn samples_in_x(self) -> u32 {
        match self {
            Self::Ms1x1 => 1,
            Self::Ms2x1 | Self::Ms2x2 => 2,
            Self::Ms4x2 | Self::Ms4x4 => 4,
        }
    }

    pub fn samples_in_y(self) -> u32 {
        match self {
            Self::Ms1x1 | Self::Ms2x1 => 1,
            Self::Ms2x2 | Self::Ms4x2 => 2,
            Self::Ms4x4 => 4,
        }
    }
}

/// Component layout of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentLayout {
    R8,
    R8G8,
    R8G8B8,
    R8G8B8A8,
    R16,
    R16G16,
    R16G16B16,
    R16G16B16A16,
    R32,
    R32G32,
    R32G32B32,
    R32G32B32A32,
    R10G10B10A2,
    R11G11B10,
}

/// Numeric interpretation of a vertex attribute's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Snorm,
    Unorm,
    Sint,
    Uint,
    Uscaled,
    Sscaled,
    Float,
}

impl ComponentKind {
    fn from_type_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Snorm),
            2 => Some(Self::Unorm),
            3 => Some(Self::Sint),
            4 => Some(Self::Uint),
            5 => Some(Self::Uscaled),
            6 => Some(Self::Sscaled),
            7 => Some(Self::Float),
            _ => None,
        }
    }
}

/// Host-side vertex attribute format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    pub layout: ComponentLayout,
    pub kind: ComponentKind,
}

impl VertexFormat {
    /// Substituted when the guest programs a format the host cannot express.
    pub const RGBA32_FLOAT: Self = Self {
        layout: ComponentLayout::R32G32B32A32,
        kind: ComponentKind::Float,
    };

    /// Decode the packed size/type codes of a vertex attribute word.
    ///
    /// Returns `None` for combinations the hardware does not define; the
    /// caller substitutes [`Self::RGBA32_FLOAT`].
    pub fn from_codes(size_code: u32, type_code: u32) -> Option<Self> {
        use ComponentLayout::*;

        let kind = ComponentKind::from_type_code(type_code)?;
        let layout = match size_code {
            0x01 => R32G32B32A32,
            0x02 => R32G32B32,
            0x03 => R16G16B16A16,
            0x04 => R32G32,
            0x05 => R16G16B16,
            0x06 => R16G16,
            0x07 => R32,
            0x09 => R16,
            0x0A => R8G8B8A8,
            0x0B => R8G8B8,
            0x0D => R8G8,
            0x0E => R8,
            0x30 => R10G10B10A2,
            0x31 => R11G11B10,
            _ => return None,
        };

        let valid = match layout {
            R8 | R8G8 | R8G8B8 | R8G8B8A8 => !matches!(kind, ComponentKind::Float),
            R16 | R16G16 | R16G16B16 | R16G16B16A16 => true,
            R32 | R32G32 | R32G32B32 | R32G32B32A32 => {
                matches!(
                    kind,
                    ComponentKind::Float | ComponentKind::Sint | ComponentKind::Uint
                )
            }
            R10G10B10A2 => matches!(
                kind,
                ComponentKind::Unorm | ComponentKind::Snorm | ComponentKind::Uint | ComponentKind::Sint
            ),
            R11G11B10 => matches!(kind, ComponentKind::Float),
        };
        valid.then_some(Self { layout, kind })
    }

    /// The shading-language scalar type a shader reads this attribute as,
    /// which participates in shader specialization.
    pub fn attribute_type(self) -> AttributeType {
        match self.kind {
            ComponentKind::Sint => AttributeType::Sint,
            ComponentKind::Uint => AttributeType::Uint,
            _ => AttributeType::Float,
        }
    }
}

/// Scalar type a vertex attribute resolves to in the shader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AttributeType {
    #[default]
    Float,
    Sint,
    Uint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_op_accepts_both_encodings() {
        assert_eq!(CompareOp::from_guest(2), CompareOp::Less);
        assert_eq!(CompareOp::from_guest(0x201), CompareOp::Less);
        assert_eq!(CompareOp::from_guest(8), CompareOp::Always);
        assert_eq!(CompareOp::from_guest(0x207), CompareOp::Always);
        assert_eq!(CompareOp::from_guest(0xDEAD), CompareOp::Always);
    }

    #[test]
    fn stencil_op_accepts_both_encodings() {
        assert_eq!(StencilOp::from_guest(1), StencilOp::Keep);
        assert_eq!(StencilOp::from_guest(0x1E00), StencilOp::Keep);
        assert_eq!(StencilOp::from_guest(0x8507), StencilOp::IncrementWrap);
        assert_eq!(StencilOp::from_guest(0xFFFF_FFFF), StencilOp::Keep);
    }

    #[test]
    fn blend_factor_accepts_both_encodings() {
        assert_eq!(BlendFactor::from_guest(0x05), BlendFactor::SrcAlpha);
        assert_eq!(BlendFactor::from_guest(0x4302), BlendFactor::SrcAlpha);
        assert_eq!(BlendFactor::from_guest(0xC001), BlendFactor::ConstantColor);
        assert_eq!(BlendFactor::from_guest(0x9999), BlendFactor::One);
    }

    #[test]
    fn front_face_inversion() {
        assert_eq!(
            FrontFace::from_guest(0x900).inverted(),
            FrontFace::CounterClockwise
        );
        assert_eq!(FrontFace::from_guest(0x901).inverted(), FrontFace::Clockwise);
    }

    #[test]
    fn vertex_format_table_decodes_common_formats() {
        let f = VertexFormat::from_codes(0x01, 7).unwrap();
        assert_eq!(f, VertexFormat::RGBA32_FLOAT);

        let f = VertexFormat::from_codes(0x0A, 2).unwrap();
        assert_eq!(f.layout, ComponentLayout::R8G8B8A8);
        assert_eq!(f.kind, ComponentKind::Unorm);
        assert_eq!(f.attribute_type(), AttributeType::Float);

        let f = VertexFormat::from_codes(0x07, 3).unwrap();
        assert_eq!(f.layout, ComponentLayout::R32);
        assert_eq!(f.attribute_type(), AttributeType::Sint);
    }

    #[test]
    fn vertex_format_rejects_undefined_combinations() {
        // 8-bit float does not exist.
        assert_eq!(VertexFormat::from_codes(0x0E, 7), None);
        // 32-bit unorm does not exist.
        assert_eq!(VertexFormat::from_codes(0x07, 2), None);
        // Packed 11_11_10 is float-only.
        assert_eq!(VertexFormat::from_codes(0x31, 4), None);
        // Unknown size code.
        assert_eq!(VertexFormat::from_codes(0x3F, 7), None);
    }

    #[test]
    fn index_kind_limits() {
        assert_eq!(IndexKind::from_guest(1), IndexKind::U16);
        assert_eq!(IndexKind::U16.value_count(), Some(0x10000));
        assert_eq!(IndexKind::U32.value_count(), None);
        assert_eq!(IndexKind::from_guest(7), IndexKind::U32);
    }

    #[test]
    fn msaa_mode_per_axis_samples() {
        assert_eq!(MsaaMode::from_guest(2).samples_in_x(), 2);
        assert_eq!(MsaaMode::from_guest(2).samples_in_y(), 2);
        assert_eq!(MsaaMode::from_guest(4).samples_in_x(), 4);
        assert_eq!(MsaaMode::from_guest(4).samples_in_y(), 2);
        assert_eq!(MsaaMode::from_guest(99), MsaaMode::Ms1x1);
    }
}
