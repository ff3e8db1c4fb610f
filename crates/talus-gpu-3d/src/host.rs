//! Downward interface to the host renderer.
//!
//! The translator never creates host-API objects itself; it derives
//! value-typed descriptors from guest state and forwards them through
//! [`HostRenderer`]. Implementations wrap a Vulkan-class or GL-class backend
//! and are free to queue; within one draw, calls arrive in the dependency
//! order described by the update-group layout.

use bitflags::bitflags;

use crate::types::{
    BlendFactor, BlendOp, CompareOp, CullFace, DepthMode, FrontFace, LogicOp, PolygonMode,
    PrimitiveTopology, StencilOp, VertexFormat,
};

/// Opaque handle to a host program object, produced by the shader cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

impl ProgramHandle {
    pub const NONE: Self = Self(0);
}

/// Host-family behavior the translator must adapt to.
#[derive(Debug, Clone, Copy)]
pub struct HostCapabilities {
    /// Whether viewports can swizzle components natively; without it a
    /// NegativeY swizzle is folded into the viewport Y flip.
    pub supports_viewport_swizzle: bool,
    /// Whether primitive restart may stay enabled during non-indexed draws.
    /// Hosts without it need the restart enable re-evaluated on every
    /// indexed/non-indexed transition.
    pub supports_non_indexed_restart: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            supports_viewport_swizzle: false,
            supports_non_indexed_restart: true,
        }
    }
}

/// One vertex attribute location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribDescriptor {
    pub buffer_index: usize,
    pub offset: u32,
    pub is_constant: bool,
    pub bgra: bool,
    pub format: VertexFormat,
}

impl Default for VertexAttribDescriptor {
    fn default() -> Self {
        Self {
            buffer_index: 0,
            offset: 0,
            is_constant: false,
            bgra: false,
            format: VertexFormat::RGBA32_FLOAT,
        }
    }
}

/// Per-target blend configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendDescriptor {
    pub enable: bool,
    pub color_op: BlendOp,
    pub color_src_factor: BlendFactor,
    pub color_dst_factor: BlendFactor,
    pub alpha_op: BlendOp,
    pub alpha_src_factor: BlendFactor,
    pub alpha_dst_factor: BlendFactor,
    pub constant: [f32; 4],
}

impl Default for BlendDescriptor {
    fn default() -> Self {
        Self {
            enable: false,
            color_op: BlendOp::Add,
            color_src_factor: BlendFactor::One,
            color_dst_factor: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
            alpha_src_factor: BlendFactor::One,
            alpha_dst_factor: BlendFactor::Zero,
            constant: [0.0; 4],
        }
    }
}

/// One stencil side (front or back).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilSide {
    pub func: CompareOp,
    pub ref_value: u32,
    pub func_mask: u32,
    pub mask: u32,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
}

impl Default for StencilSide {
    fn default() -> Self {
        Self {
            func: CompareOp::Always,
            ref_value: 0,
            func_mask: u32::MAX,
            mask: u32::MAX,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StencilTestDescriptor {
    pub enable: bool,
    pub front: StencilSide,
    pub back: StencilSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthTestDescriptor {
    pub enable: bool,
    pub write_enable: bool,
    pub func: CompareOp,
}

impl Default for DepthTestDescriptor {
    fn default() -> Self {
        Self {
            enable: false,
            write_enable: false,
            func: CompareOp::Always,
        }
    }
}

/// Host viewport rectangle. A Y flip is expressed as `y + height` origin
/// with negated height, Vulkan style.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub depth_near: f32,
    pub depth_far: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthBiasDescriptor {
    pub point_enable: bool,
    pub line_enable: bool,
    pub fill_enable: bool,
    pub factor: f32,
    pub units: f32,
    pub clamp: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointParameters {
    pub size: f32,
    pub program_size_enable: bool,
    pub sprite_enable: bool,
    pub origin_upper_left: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineParameters {
    pub width: f32,
    pub smooth: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultisampleDescriptor {
    pub alpha_to_coverage: bool,
    pub alpha_to_one: bool,
    pub anti_alias: bool,
    pub sample_mask: u32,
}

bitflags! {
    /// Per-target color channel write mask.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const R = 0b0001;
        const G = 0b0010;
        const B = 0b0100;
        const A = 0b1000;
    }
}

impl ColorMask {
    /// Unpack the guest mask word (R at bit 0, G at bit 4, B at bit 8, A at
    /// bit 12).
    pub fn from_guest(raw: u32) -> Self {
        let mut mask = Self::empty();
        if raw & 0x0001 != 0 {
            mask |= Self::R;
        }
        if raw & 0x0010 != 0 {
            mask |= Self::G;
        }
        if raw & 0x0100 != 0 {
            mask |= Self::B;
        }
        if raw & 0x1000 != 0 {
            mask |= Self::A;
        }
        mask
    }
}

/// The host renderer surface the translator drives.
pub trait HostRenderer {
    fn set_vertex_attribs(&mut self, attribs: &[VertexAttribDescriptor]);
    fn set_blend_state(&mut self, index: usize, descriptor: BlendDescriptor);
    fn set_face_culling(&mut self, enable: bool, face: CullFace);
    fn set_front_face(&mut self, front_face: FrontFace);
    fn set_stencil_test(&mut self, descriptor: StencilTestDescriptor);
    fn set_depth_test(&mut self, descriptor: DepthTestDescriptor);
    fn set_patch_parameters(&mut self, vertices: u32);
    fn set_viewports(&mut self, viewports: &[Viewport]);
    fn set_scissors(&mut self, scissors: &[ScissorRect]);
    fn set_depth_mode(&mut self, mode: DepthMode);
    fn set_logic_op_state(&mut self, enable: bool, op: LogicOp);
    fn set_depth_clamp(&mut self, enable: bool);
    fn set_polygon_mode(&mut self, front: PolygonMode, back: PolygonMode);
    fn set_depth_bias(&mut self, descriptor: DepthBiasDescriptor);
    fn set_primitive_restart(&mut self, enable: bool, index: u32);
    fn set_line_parameters(&mut self, parameters: LineParameters);
    fn set_render_target_color_masks(&mut self, masks: &[ColorMask]);
    fn set_rasterizer_discard(&mut self, discard: bool);
    fn set_alpha_test(&mut self, enable: bool, func: CompareOp, reference: f32);
    fn set_point_parameters(&mut self, parameters: PointParameters);
    fn set_user_clip_distance(&mut self, index: usize, enable: bool);
    fn set_multisample_state(&mut self, descriptor: MultisampleDescriptor);
    fn set_program(&mut self, program: ProgramHandle);
    fn set_render_target_scale(&mut self, scale: f32);
    fn begin_transform_feedback(&mut self, topology: PrimitiveTopology);
    fn end_transform_feedback(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mask_unpacks_guest_nibbles() {
        assert_eq!(ColorMask::from_guest(0x1111), ColorMask::all());
        assert_eq!(ColorMask::from_guest(0x0001), ColorMask::R);
        assert_eq!(ColorMask::from_guest(0x1010), ColorMask::G | ColorMask::A);
        assert_eq!(ColorMask::from_guest(0), ColorMask::empty());
    }
}
