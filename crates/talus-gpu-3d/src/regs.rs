//! Structured view over the guest 3D-engine register bank.
//!
//! The bank is a fixed block of 32-bit words written by the command-stream
//! processor and read-only for the state translator. [`Registers`] is a
//! `repr(C)` overlay giving every architectural field a name and a stable
//! word offset; that offset is the identity key used by the dirty tracker.
//!
//! Layout is pinned twice: by explicit `_reserved` pads in the struct and by
//! `offset_of!`-derived constants asserted in the tests at the bottom of this
//! file. Word widths, bit packings and sign conventions are part of the guest
//! contract and must not change.

use bytemuck::{Pod, Zeroable};
use core::mem::{offset_of, size_of};

/// Number of 32-bit words in the 3D-engine register bank.
pub const REG_WORDS: usize = 0xE00;

/// Split 40-bit-class GPU virtual address, high word first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuVa {
    pub high: u32,
    pub low: u32,
}

impl GpuVa {
    pub fn address(self) -> u64 {
        (u64::from(self.high) << 32) | u64::from(self.low)
    }
}

/// Per-slot color render target state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RtColorState {
    pub address_high: u32,
    pub address_low: u32,
    /// Width in pixels for tiled surfaces; byte stride for linear surfaces.
    /// Zero disables the slot (inherited guest-driver behavior).
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub tile_mode: u32,
    pub layer_count: u32,
    pub layer_stride: u32,
}

impl RtColorState {
    pub fn address(&self) -> u64 {
        GpuVa {
            high: self.address_high,
            low: self.address_low,
        }
        .address()
    }

    pub fn is_enabled(&self) -> bool {
        self.format != 0 && self.width != 0
    }
}

/// Depth-stencil render target state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RtDepthStencilState {
    pub address_high: u32,
    pub address_low: u32,
    pub format: u32,
    pub tile_mode: u32,
    pub layer_count: u32,
    pub layer_stride: u32,
}

impl RtDepthStencilState {
    pub fn address(&self) -> u64 {
        GpuVa {
            high: self.address_high,
            low: self.address_low,
        }
        .address()
    }
}

/// Render-target control word: attachment count plus a slot permutation map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RtControl(pub u32);

impl RtControl {
    /// Number of active color attachments (low 4 bits).
    pub fn unpack_count(self) -> usize {
        (self.0 & 0xF) as usize
    }

    /// Maps attachment index `index` to a color slot (3 bits per entry,
    /// starting at bit 4).
    pub fn unpack_map(self, index: usize) -> usize {
        ((self.0 >> (4 + index * 3)) & 7) as usize
    }
}

/// Viewport scale/translate plus the component swizzle word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ViewportTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub scale_z: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    pub translate_z: f32,
    /// 3 bits per component: x at bit 0, y at bit 4, z at bit 8, w at bit 12.
    pub swizzle: u32,
    pub _reserved: u32,
}

impl ViewportTransform {
    pub fn unpack_swizzle_y(&self) -> u32 {
        (self.swizzle >> 4) & 7
    }
}

/// Viewport rectangle and depth extents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ViewportExtents {
    /// x in the low half, width in the high half.
    pub x_width: u32,
    /// y in the low half, height in the high half.
    pub y_height: u32,
    pub depth_near: f32,
    pub depth_far: f32,
}

impl ViewportExtents {
    pub fn x(&self) -> u32 {
        self.x_width & 0xFFFF
    }

    pub fn width(&self) -> u32 {
        self.x_width >> 16
    }

    pub fn y(&self) -> u32 {
        self.y_height & 0xFFFF
    }

    pub fn height(&self) -> u32 {
        self.y_height >> 16
    }
}

/// First/count pair for non-indexed draws, written by the draw methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct VertexBufferDrawState {
    pub first: u32,
    pub count: u32,
}

/// One transform-feedback buffer record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TfBufferState {
    pub enable: u32,
    pub address_high: u32,
    pub address_low: u32,
    pub size: u32,
    pub offset: u32,
    pub _reserved: [u32; 3],
}

impl TfBufferState {
    pub fn address(&self) -> u64 {
        GpuVa {
            high: self.address_high,
            low: self.address_low,
        }
        .address()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PrimitiveRestartState {
    pub enable: u32,
    pub index: u32,
}

/// Index buffer range and element kind (0 = u8, 1 = u16, 2 = u32).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct IndexBufferState {
    pub address_high: u32,
    pub address_low: u32,
    pub end_address_high: u32,
    pub end_address_low: u32,
    pub kind: u32,
    pub first: u32,
}

impl IndexBufferState {
    pub fn address(&self) -> u64 {
        GpuVa {
            high: self.address_high,
            low: self.address_low,
        }
        .address()
    }

    pub fn end_address(&self) -> u64 {
        GpuVa {
            high: self.end_address_high,
            low: self.end_address_low,
        }
        .address()
    }
}

/// Window-space scissor applied on top of every render target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ScreenScissorState {
    /// x in the low half, width in the high half.
    pub x_width: u32,
    /// y in the low half, height in the high half.
    pub y_height: u32,
}

impl ScreenScissorState {
    pub fn x(&self) -> u32 {
        self.x_width & 0xFFFF
    }

    pub fn width(&self) -> u32 {
        self.x_width >> 16
    }

    pub fn y(&self) -> u32 {
        self.y_height & 0xFFFF
    }

    pub fn height(&self) -> u32 {
        self.y_height >> 16
    }
}

/// Per-viewport scissor rectangle. x1/y1 are inclusive, x2/y2 exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ScissorState {
    pub enable: u32,
    /// x1 in the low half, x2 in the high half.
    pub x_packed: u32,
    /// y1 in the low half, y2 in the high half.
    pub y_packed: u32,
    pub _reserved: u32,
}

impl ScissorState {
    pub fn x1(&self) -> u32 {
        self.x_packed & 0xFFFF
    }

    pub fn x2(&self) -> u32 {
        self.x_packed >> 16
    }

    pub fn y1(&self) -> u32 {
        self.y_packed & 0xFFFF
    }

    pub fn y2(&self) -> u32 {
        self.y_packed >> 16
    }
}

/// Polygon-offset state. Enable bits: 0 = point, 1 = line, 2 = fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DepthBiasState {
    pub flags: u32,
    /// Guest units are half the host unit.
    pub units: f32,
    pub clamp: f32,
    pub factor: f32,
}

impl DepthBiasState {
    pub fn point_enable(&self) -> bool {
        self.flags & 1 != 0
    }

    pub fn line_enable(&self) -> bool {
        self.flags & 2 != 0
    }

    pub fn fill_enable(&self) -> bool {
        self.flags & 4 != 0
    }
}

/// Front-side stencil block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StencilTestState {
    pub enable: u32,
    pub front_fail_op: u32,
    pub front_depth_fail_op: u32,
    pub front_pass_op: u32,
    pub front_func: u32,
    pub front_ref: u32,
    pub front_func_mask: u32,
    pub front_mask: u32,
}

/// Back-side stencil ops; only honored when `two_sided` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StencilBackState {
    pub two_sided: u32,
    pub back_fail_op: u32,
    pub back_depth_fail_op: u32,
    pub back_pass_op: u32,
    pub back_func: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StencilBackMasks {
    pub ref_value: u32,
    pub func_mask: u32,
    pub mask: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct AlphaTestState {
    pub enable: u32,
    pub func: u32,
    pub reference: f32,
}

/// Equation/factor block shared by the common and per-target blend state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct BlendState {
    pub color_op: u32,
    pub color_src_factor: u32,
    pub color_dst_factor: u32,
    pub alpha_op: u32,
    pub alpha_src_factor: u32,
    pub alpha_dst_factor: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct BlendTargetState {
    pub state: BlendState,
    pub _reserved: [u32; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct FaceState {
    pub cull_enable: u32,
    pub front_face: u32,
    pub cull_face: u32,
}

/// Origin flags. Bit 0 negates Y; bit 4 selects lower-left rasterization
/// origin (`TriangleRastFlip`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct YControl(pub u32);

impl YControl {
    pub fn negate_y(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn triangle_rast_flip(self) -> bool {
        self.0 & 0x10 != 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct LogicOpState {
    pub enable: u32,
    pub op: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct LineState {
    pub smooth_enable: u32,
    pub width_smooth: f32,
    pub width_aliased: f32,
}

/// Texture or sampler pool descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PoolState {
    pub address_high: u32,
    pub address_low: u32,
    pub maximum_id: u32,
}

impl PoolState {
    pub fn address(&self) -> u64 {
        GpuVa {
            high: self.address_high,
            low: self.address_low,
        }
        .address()
    }
}

/// Per-stage shader program record. Control bit 0 enables the stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ShaderStageState {
    pub control: u32,
    pub offset: u32,
    pub _reserved: [u32; 2],
}

impl ShaderStageState {
    pub fn unpack_enable(&self) -> bool {
        self.control & 1 != 0
    }
}

/// Packed vertex attribute word.
///
/// Bits 0..5 buffer index, bit 6 constant flag, bits 7..21 byte offset,
/// bits 21..27 size code, bits 27..30 type code, bit 31 bgra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct VertexAttribState(pub u32);

impl VertexAttribState {
    pub fn unpack_buffer_index(self) -> usize {
        (self.0 & 0x1F) as usize
    }

    pub fn unpack_is_constant(self) -> bool {
        self.0 & 0x40 != 0
    }

    pub fn unpack_offset(self) -> u32 {
        (self.0 >> 7) & 0x3FFF
    }

    pub fn unpack_size_code(self) -> u32 {
        (self.0 >> 21) & 0x3F
    }

    pub fn unpack_type_code(self) -> u32 {
        (self.0 >> 27) & 0x7
    }

    pub fn unpack_bgra(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

/// Per-slot vertex buffer record. Control bits 0..12 are the stride, bit 12
/// the enable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct VertexBufferState {
    pub control: u32,
    pub address_high: u32,
    pub address_low: u32,
    pub divisor: u32,
}

impl VertexBufferState {
    pub fn unpack_stride(&self) -> u32 {
        self.control & 0xFFF
    }

    pub fn unpack_enable(&self) -> bool {
        self.control & 0x1000 != 0
    }

    pub fn address(&self) -> u64 {
        GpuVa {
            high: self.address_high,
            low: self.address_low,
        }
        .address()
    }
}

/// The 3D-engine register bank overlay.
///
/// Field order and the `_reserved` pads define the architectural word
/// offsets; see the layout test below for the pinned values.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct Registers {
    pub _reserved0: [u32; 0x200],
    pub rt_color: [RtColorState; 8],
    pub _reserved1: [u32; 0x40],
    pub viewport_transform: [ViewportTransform; 16],
    pub viewport_extents: [ViewportExtents; 16],
    pub vertex_buffer_draw_state: VertexBufferDrawState,
    pub depth_mode: u32,
    pub tf_enable: u32,
    pub tf_buffer: [TfBufferState; 4],
    pub primitive_restart: PrimitiveRestartState,
    pub index_buffer: IndexBufferState,
    pub screen_scissor: ScreenScissorState,
    pub _reserved2: [u32; 0x12],
    pub scissor: [ScissorState; 16],
    pub depth_bias: DepthBiasState,
    pub stencil_test: StencilTestState,
    pub stencil_back: StencilBackState,
    pub stencil_back_masks: StencilBackMasks,
    pub alpha_test: AlphaTestState,
    pub _reserved3: [u32; 9],
    pub blend_independent: u32,
    pub blend_constant: [f32; 4],
    pub blend_common: BlendState,
    pub blend_enable: [u32; 8],
    pub _reserved4: [u32; 0xD],
    pub blend_target: [BlendTargetState; 8],
    pub color_mask_shared: u32,
    pub color_mask: [u32; 8],
    pub _reserved5: [u32; 7],
    pub depth_test_enable: u32,
    pub depth_write_enable: u32,
    pub depth_test_func: u32,
    /// Bit 0 enables depth clamping to the view volume.
    pub view_volume_clip_control: u32,
    pub face: FaceState,
    pub y_control: YControl,
    pub vertex_attrib_state: [VertexAttribState; 16],
    pub logic_op: LogicOpState,
    pub polygon_mode_front: u32,
    pub polygon_mode_back: u32,
    pub line_state: LineState,
    pub _reserved6: [u32; 1],
    pub point_size: f32,
    pub point_sprite_enable: u32,
    pub point_size_attribute_enable: u32,
    /// Bit 2 selects the point sprite coordinate origin.
    pub point_coord_replace: u32,
    /// Bit 0 alpha-to-coverage, bit 4 alpha-to-one.
    pub multisample_control: u32,
    pub anti_alias_enable: u32,
    pub sample_mask: u32,
    pub rasterize_enable: u32,
    pub tess_mode: u32,
    pub patch_vertices: u32,
    pub early_z_force: u32,
    pub clip_distance_enable: u32,
    pub viewport_transform_enable: u32,
    pub _reserved7: [u32; 0xA],
    pub rt_control: RtControl,
    pub rt_depth_stencil_enable: u32,
    pub rt_depth_stencil: RtDepthStencilState,
    pub rt_depth_stencil_width: u32,
    pub rt_depth_stencil_height: u32,
    pub rt_msaa_mode: u32,
    pub _reserved8: [u32; 0xE],
    pub tex_header_pool: PoolState,
    pub tex_sampler_pool: PoolState,
    pub texture_buffer_index: u32,
    pub _reserved9: [u32; 9],
    pub shader_base_address: GpuVa,
    /// Base of the driver-managed constant buffer holding storage-buffer
    /// descriptors (see the commit path).
    pub driver_uniform_base: GpuVa,
    pub _reserved10: [u32; 0xC],
    pub shader_state: [ShaderStageState; 6],
    pub _reserved11: [u32; 0x28],
    pub vertex_buffer: [VertexBufferState; 16],
    pub vertex_buffer_end: [GpuVa; 16],
    pub vertex_buffer_instanced: [u32; 16],
    pub _reserved12: [u32; 0x890],
}

impl Registers {
    pub fn new() -> Box<Self> {
        bytemuck::zeroed_box()
    }

    pub fn as_words(&self) -> &[u32; REG_WORDS] {
        bytemuck::cast_ref(self)
    }

    pub fn as_words_mut(&mut self) -> &mut [u32; REG_WORDS] {
        bytemuck::cast_mut(self)
    }

    /// Raw word write, as issued by the command-stream processor.
    pub fn write_word(&mut self, word_offset: usize, value: u32) {
        self.as_words_mut()[word_offset] = value;
    }

    pub fn read_word(&self, word_offset: usize) -> u32 {
        self.as_words()[word_offset]
    }
}

/// Word offset of a named `Registers` field.
pub const fn word_offset(byte_offset: usize) -> usize {
    byte_offset / 4
}

const _: () = assert!(size_of::<Registers>() == REG_WORDS * 4);
const _: () = assert!(offset_of!(Registers, rt_color) == 0x200 * 4);
const _: () = assert!(offset_of!(Registers, viewport_transform) == 0x280 * 4);
const _: () = assert!(offset_of!(Registers, viewport_extents) == 0x300 * 4);
const _: () = assert!(offset_of!(Registers, scissor) == 0x380 * 4);
const _: () = assert!(offset_of!(Registers, vertex_attrib_state) == 0x458 * 4);
const _: () = assert!(offset_of!(Registers, rt_control) == 0x487 * 4);
const _: () = assert!(offset_of!(Registers, shader_state) == 0x4C0 * 4);
const _: () = assert!(offset_of!(Registers, vertex_buffer) == 0x500 * 4);
