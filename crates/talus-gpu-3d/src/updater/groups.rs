//! The update-group callbacks and their register dependencies.
//!
//! Each group reads the register mirror, derives a host descriptor, updates
//! the pipeline snapshot and forwards the delta. Groups never fail: bad
//! guest state logs at `debug!` and substitutes a safe value.

use core::mem::{offset_of, size_of};

use tracing::debug;

use super::{group, StateUpdater};
use crate::host::{
    BlendDescriptor, ColorMask, DepthBiasDescriptor, DepthTestDescriptor, LineParameters,
    MultisampleDescriptor, PointParameters, ScissorRect, StencilSide, StencilTestDescriptor,
    VertexAttribDescriptor, Viewport,
};
use crate::managers::{RtColorBinding, RtDepthBinding};
use crate::pipeline::{
    VertexBufferDescriptor, RENDER_TARGET_COUNT, VERTEX_ATTRIB_COUNT, VERTEX_BUFFER_COUNT,
};
use crate::regs::{
    AlphaTestState, BlendState, BlendTargetState, DepthBiasState, FaceState, GpuVa,
    IndexBufferState, LineState, LogicOpState, PoolState, PrimitiveRestartState, Registers,
    RtColorState, RtControl, RtDepthStencilState, ScissorState, ScreenScissorState,
    ShaderStageState, StencilBackMasks, StencilBackState, StencilTestState, TfBufferState,
    VertexAttribState, VertexBufferDrawState, VertexBufferState, ViewportExtents,
    ViewportTransform, YControl,
};
use crate::shader::{ShaderAddresses, BINDING_STAGE_COUNT, STAGE_COUNT};
use crate::specialization::{GraphicsStateKey, PoolStateKey};
use crate::tracker::{DirtyTracker, RegSpan, TrackerBuilder};
use crate::types::{
    AttributeType, BlendFactor, BlendOp, CompareOp, CullFace, DepthMode, FrontFace, IndexKind,
    LogicOp, MsaaMode, PolygonMode, StencilOp, VertexFormat,
};

/// Viewport swizzle selector for a negated Y component.
const SWIZZLE_NEGATIVE_Y: u32 = 3;

const fn span_of<T>(byte_offset: usize) -> RegSpan {
    RegSpan::new(byte_offset, size_of::<T>())
}

/// Register dependencies per group, indexed like [`group`].
static GROUP_SPANS: [&[RegSpan]; group::COUNT] = [
    // VERTEX_BUFFERS
    &[
        span_of::<[VertexBufferState; 16]>(offset_of!(Registers, vertex_buffer)),
        span_of::<[GpuVa; 16]>(offset_of!(Registers, vertex_buffer_end)),
        span_of::<[u32; 16]>(offset_of!(Registers, vertex_buffer_instanced)),
        span_of::<VertexBufferDrawState>(offset_of!(Registers, vertex_buffer_draw_state)),
    ],
    // VERTEX_ATTRIBS
    &[span_of::<[VertexAttribState; 16]>(offset_of!(
        Registers,
        vertex_attrib_state
    ))],
    // BLEND
    &[
        span_of::<u32>(offset_of!(Registers, blend_independent)),
        span_of::<[f32; 4]>(offset_of!(Registers, blend_constant)),
        span_of::<BlendState>(offset_of!(Registers, blend_common)),
        span_of::<[u32; 8]>(offset_of!(Registers, blend_enable)),
        span_of::<[BlendTargetState; 8]>(offset_of!(Registers, blend_target)),
    ],
    // FACE
    &[
        span_of::<FaceState>(offset_of!(Registers, face)),
        span_of::<YControl>(offset_of!(Registers, y_control)),
    ],
    // STENCIL_TEST
    &[
        span_of::<StencilTestState>(offset_of!(Registers, stencil_test)),
        span_of::<StencilBackState>(offset_of!(Registers, stencil_back)),
        span_of::<StencilBackMasks>(offset_of!(Registers, stencil_back_masks)),
    ],
    // DEPTH_TEST
    &[
        span_of::<u32>(offset_of!(Registers, depth_test_enable)),
        span_of::<u32>(offset_of!(Registers, depth_write_enable)),
        span_of::<u32>(offset_of!(Registers, depth_test_func)),
    ],
    // TESSELLATION
    &[
        span_of::<u32>(offset_of!(Registers, tess_mode)),
        span_of::<u32>(offset_of!(Registers, patch_vertices)),
    ],
    // VIEWPORT
    &[
        span_of::<[ViewportTransform; 16]>(offset_of!(Registers, viewport_transform)),
        span_of::<[ViewportExtents; 16]>(offset_of!(Registers, viewport_extents)),
        span_of::<YControl>(offset_of!(Registers, y_control)),
        span_of::<u32>(offset_of!(Registers, viewport_transform_enable)),
        span_of::<u32>(offset_of!(Registers, depth_mode)),
        span_of::<ScreenScissorState>(offset_of!(Registers, screen_scissor)),
    ],
    // LOGIC_OP
    &[span_of::<LogicOpState>(offset_of!(Registers, logic_op))],
    // DEPTH_CLAMP
    &[span_of::<u32>(offset_of!(
        Registers,
        view_volume_clip_control
    ))],
    // POLYGON_MODE
    &[
        span_of::<u32>(offset_of!(Registers, polygon_mode_front)),
        span_of::<u32>(offset_of!(Registers, polygon_mode_back)),
    ],
    // DEPTH_BIAS
    &[span_of::<DepthBiasState>(offset_of!(Registers, depth_bias))],
    // PRIMITIVE_RESTART
    &[span_of::<PrimitiveRestartState>(offset_of!(
        Registers,
        primitive_restart
    ))],
    // LINE
    &[span_of::<LineState>(offset_of!(Registers, line_state))],
    // COLOR_MASK
    &[
        span_of::<u32>(offset_of!(Registers, color_mask_shared)),
        span_of::<[u32; 8]>(offset_of!(Registers, color_mask)),
    ],
    // RASTERIZER
    &[span_of::<u32>(offset_of!(Registers, rasterize_enable))],
    // SCISSOR
    &[
        span_of::<[ScissorState; 16]>(offset_of!(Registers, scissor)),
        span_of::<ScreenScissorState>(offset_of!(Registers, screen_scissor)),
        span_of::<YControl>(offset_of!(Registers, y_control)),
    ],
    // USER_CLIP
    &[span_of::<u32>(offset_of!(Registers, clip_distance_enable))],
    // ALPHA_TEST
    &[span_of::<AlphaTestState>(offset_of!(Registers, alpha_test))],
    // POINT
    &[
        span_of::<f32>(offset_of!(Registers, point_size)),
        span_of::<u32>(offset_of!(Registers, point_sprite_enable)),
        span_of::<u32>(offset_of!(Registers, point_size_attribute_enable)),
        span_of::<u32>(offset_of!(Registers, point_coord_replace)),
    ],
    // MULTISAMPLE
    &[
        span_of::<u32>(offset_of!(Registers, multisample_control)),
        span_of::<u32>(offset_of!(Registers, anti_alias_enable)),
        span_of::<u32>(offset_of!(Registers, sample_mask)),
    ],
    // SAMPLER_POOL
    &[span_of::<PoolState>(offset_of!(Registers, tex_sampler_pool))],
    // TEXTURE_POOL
    &[
        span_of::<PoolState>(offset_of!(Registers, tex_header_pool)),
        span_of::<u32>(offset_of!(Registers, texture_buffer_index)),
    ],
    // INDEX_BUFFER
    &[span_of::<IndexBufferState>(offset_of!(
        Registers,
        index_buffer
    ))],
    // TRANSFORM_FEEDBACK
    &[
        span_of::<u32>(offset_of!(Registers, tf_enable)),
        span_of::<[TfBufferState; 4]>(offset_of!(Registers, tf_buffer)),
    ],
    // SHADER
    &[
        span_of::<GpuVa>(offset_of!(Registers, shader_base_address)),
        span_of::<GpuVa>(offset_of!(Registers, driver_uniform_base)),
        span_of::<[ShaderStageState; 6]>(offset_of!(Registers, shader_state)),
    ],
    // RENDER_TARGETS
    &[
        span_of::<[RtColorState; 8]>(offset_of!(Registers, rt_color)),
        span_of::<RtControl>(offset_of!(Registers, rt_control)),
        span_of::<u32>(offset_of!(Registers, rt_depth_stencil_enable)),
        span_of::<RtDepthStencilState>(offset_of!(Registers, rt_depth_stencil)),
        span_of::<u32>(offset_of!(Registers, rt_depth_stencil_width)),
        span_of::<u32>(offset_of!(Registers, rt_depth_stencil_height)),
        span_of::<u32>(offset_of!(Registers, rt_msaa_mode)),
        span_of::<ScreenScissorState>(offset_of!(Registers, screen_scissor)),
    ],
];

pub(super) fn build_tracker() -> DirtyTracker {
    let mut builder = TrackerBuilder::new();
    for spans in GROUP_SPANS {
        builder.group(spans);
    }
    builder.build()
}

/// Group callbacks, indexed like [`group`]. Kept as plain function pointers;
/// dispatch happens in [`StateUpdater::update`].
pub(super) const UPDATE_FNS: [fn(&mut StateUpdater); group::COUNT] = [
    StateUpdater::update_vertex_buffer_state,
    StateUpdater::update_vertex_attrib_state,
    StateUpdater::update_blend_state,
    StateUpdater::update_face_state,
    StateUpdater::update_stencil_test_state,
    StateUpdater::update_depth_test_state,
    StateUpdater::update_tessellation_state,
    StateUpdater::update_viewport_state,
    StateUpdater::update_logic_op_state,
    StateUpdater::update_depth_clamp_state,
    StateUpdater::update_polygon_mode_state,
    StateUpdater::update_depth_bias_state,
    StateUpdater::update_primitive_restart_state,
    StateUpdater::update_line_state,
    StateUpdater::update_color_mask_state,
    StateUpdater::update_rasterizer_state,
    StateUpdater::update_scissor_state,
    StateUpdater::update_user_clip_state,
    StateUpdater::update_alpha_test_state,
    StateUpdater::update_point_state,
    StateUpdater::update_multisample_state,
    StateUpdater::update_sampler_pool_state,
    StateUpdater::update_texture_pool_state,
    StateUpdater::update_index_buffer_state,
    StateUpdater::update_transform_feedback_state,
    StateUpdater::update_shader_state,
    StateUpdater::update_render_targets_group,
];

impl StateUpdater {
    fn update_vertex_buffer_state(&mut self) {
        let indexed = self.draw.indexed;
        let index_kind = IndexKind::from_guest(self.regs.index_buffer.kind);
        let draw_state = self.regs.vertex_buffer_draw_state;

        for index in 0..VERTEX_BUFFER_COUNT {
            let vb = self.regs.vertex_buffer[index];
            if !vb.unpack_enable() {
                self.pipeline.vertex_buffers[index] = VertexBufferDescriptor::default();
                self.buffers.set_vertex_buffer(index, 0, 0, 0, 0);
                continue;
            }

            let address = vb.address();
            let end_address = self.regs.vertex_buffer_end[index].address();
            let stride = vb.unpack_stride();
            let instanced = self.regs.vertex_buffer_instanced[index] != 0;
            let divisor = if instanced { vb.divisor } else { 0 };

            let mut size = if end_address >= address {
                end_address - address + 1
            } else {
                0
            };

            // Guests routinely declare huge ranges; bound the size by what
            // the draw can actually address.
            if stride != 0 && !instanced {
                if indexed {
                    if let Some(limit) = index_kind.value_count() {
                        let max =
                            (limit + u64::from(self.draw.first_vertex)) * u64::from(stride);
                        size = size.min(max);
                    }
                } else {
                    let max = (u64::from(self.draw.first_instance)
                        + u64::from(draw_state.first)
                        + u64::from(draw_state.count))
                        * u64::from(stride);
                    size = size.min(max);
                }
            }

            self.pipeline.vertex_buffers[index] = VertexBufferDescriptor {
                address,
                size,
                stride,
                divisor,
            };
            self.buffers
                .set_vertex_buffer(index, address, size, stride, divisor);
        }
    }

    fn update_vertex_attrib_state(&mut self) {
        let mut attribs = [VertexAttribDescriptor::default(); VERTEX_ATTRIB_COUNT];
        for (index, descriptor) in attribs.iter_mut().enumerate() {
            let attrib = self.regs.vertex_attrib_state[index];
            let format = match VertexFormat::from_codes(
                attrib.unpack_size_code(),
                attrib.unpack_type_code(),
            ) {
                Some(format) => format,
                None => {
                    debug!(
                        index,
                        raw = attrib.0,
                        "unknown vertex attribute format, substituting RGBA32F"
                    );
                    self.stats.attrib_format_fallbacks += 1;
                    VertexFormat::RGBA32_FLOAT
                }
            };
            *descriptor = VertexAttribDescriptor {
                buffer_index: attrib.unpack_buffer_index(),
                offset: attrib.unpack_offset(),
                is_constant: attrib.unpack_is_constant(),
                bgra: attrib.unpack_bgra(),
                format,
            };
        }
        self.pipeline.vertex_attribs = attribs;
        self.host.set_vertex_attribs(&attribs);
    }

    fn update_blend_state(&mut self) {
        let constant = self.regs.blend_constant;
        let independent = self.regs.blend_independent != 0;
        let common_enable = self.regs.blend_enable[0] != 0;
        let common = self.regs.blend_common;

        for index in 0..RENDER_TARGET_COUNT {
            let (enable, state) = if independent {
                (
                    self.regs.blend_enable[index] != 0,
                    self.regs.blend_target[index].state,
                )
            } else {
                (common_enable, common)
            };
            let descriptor = BlendDescriptor {
                enable,
                color_op: BlendOp::from_guest(state.color_op),
                color_src_factor: BlendFactor::from_guest(state.color_src_factor),
                color_dst_factor: BlendFactor::from_guest(state.color_dst_factor),
                alpha_op: BlendOp::from_guest(state.alpha_op),
                alpha_src_factor: BlendFactor::from_guest(state.alpha_src_factor),
                alpha_dst_factor: BlendFactor::from_guest(state.alpha_dst_factor),
                constant,
            };
            self.pipeline.blend[index] = descriptor;
            self.host.set_blend_state(index, descriptor);
        }
    }

    fn update_face_state(&mut self) {
        let face = self.regs.face;
        let cull_enable = face.cull_enable != 0;
        let cull_face = CullFace::from_guest(face.cull_face);
        self.pipeline.cull_enable = cull_enable;
        self.pipeline.cull_face = cull_face;
        self.host.set_face_culling(cull_enable, cull_face);

        // An upper-left rasterization origin mirrors the winding.
        let mut front_face = FrontFace::from_guest(face.front_face);
        if !self.regs.y_control.triangle_rast_flip() {
            front_face = front_face.inverted();
        }
        self.pipeline.front_face = front_face;
        self.host.set_front_face(front_face);
    }

    fn update_stencil_test_state(&mut self) {
        let front_regs = self.regs.stencil_test;
        let front = StencilSide {
            func: CompareOp::from_guest(front_regs.front_func),
            ref_value: front_regs.front_ref,
            func_mask: front_regs.front_func_mask,
            mask: front_regs.front_mask,
            fail_op: StencilOp::from_guest(front_regs.front_fail_op),
            depth_fail_op: StencilOp::from_guest(front_regs.front_depth_fail_op),
            pass_op: StencilOp::from_guest(front_regs.front_pass_op),
        };
        let back_regs = self.regs.stencil_back;
        let back = if back_regs.two_sided != 0 {
            let masks = self.regs.stencil_back_masks;
            StencilSide {
                func: CompareOp::from_guest(back_regs.back_func),
                ref_value: masks.ref_value,
                func_mask: masks.func_mask,
                mask: masks.mask,
                fail_op: StencilOp::from_guest(back_regs.back_fail_op),
                depth_fail_op: StencilOp::from_guest(back_regs.back_depth_fail_op),
                pass_op: StencilOp::from_guest(back_regs.back_pass_op),
            }
        } else {
            front
        };
        let descriptor = StencilTestDescriptor {
            enable: front_regs.enable != 0,
            front,
            back,
        };
        self.pipeline.stencil_test = descriptor;
        self.host.set_stencil_test(descriptor);
    }

    fn update_depth_test_state(&mut self) {
        let descriptor = DepthTestDescriptor {
            enable: self.regs.depth_test_enable != 0,
            write_enable: self.regs.depth_write_enable != 0,
            func: CompareOp::from_guest(self.regs.depth_test_func),
        };
        self.pipeline.depth_test = descriptor;
        self.host.set_depth_test(descriptor);
    }

    fn update_tessellation_state(&mut self) {
        let vertices = self.regs.patch_vertices.clamp(1, 32);
        self.pipeline.patch_control_points = vertices;
        self.host.set_patch_parameters(vertices);
    }

    pub(super) fn update_viewport_state(&mut self) {
        let scale = self.textures.render_target_scale();
        let depth_mode = self.inferred_depth_mode();
        self.host.set_depth_mode(depth_mode);

        let mut viewports = [Viewport::default(); 16];
        if self.regs.viewport_transform_enable == 0 {
            // Without a viewport transform the guest rasterizes in window
            // space; mirror the screen scissor.
            let screen = self.regs.screen_scissor;
            let viewport = Viewport {
                x: screen.x() as f32 * scale,
                y: screen.y() as f32 * scale,
                width: screen.width() as f32 * scale,
                height: screen.height() as f32 * scale,
                depth_near: 0.0,
                depth_far: 1.0,
            };
            viewports = [viewport; 16];
        } else {
            let negate_y = self.regs.y_control.negate_y();
            for (index, viewport) in viewports.iter_mut().enumerate() {
                let transform = self.regs.viewport_transform[index];
                let extents = self.regs.viewport_extents[index];

                let x = transform.translate_x - transform.scale_x.abs();
                let mut y = transform.translate_y - transform.scale_y.abs();
                let width = transform.scale_x.abs() * 2.0;
                let mut height = transform.scale_y.abs() * 2.0;

                let swizzle_flip = transform.unpack_swizzle_y() == SWIZZLE_NEGATIVE_Y
                    && !self.caps.supports_viewport_swizzle;
                if negate_y || swizzle_flip {
                    y += height;
                    height = -height;
                }

                let (mut depth_near, mut depth_far) = (extents.depth_near, extents.depth_far);
                if transform.scale_z < 0.0 {
                    core::mem::swap(&mut depth_near, &mut depth_far);
                }

                *viewport = Viewport {
                    x: x * scale,
                    y: y * scale,
                    width: width * scale,
                    height: height * scale,
                    depth_near,
                    depth_far,
                };
            }
        }
        self.host.set_viewports(&viewports);
    }

    fn update_logic_op_state(&mut self) {
        let state = self.regs.logic_op;
        let op = LogicOp::from_guest(state.op);
        self.pipeline.logic_op_enable = state.enable != 0;
        self.pipeline.logic_op = op;
        self.host.set_logic_op_state(state.enable != 0, op);
    }

    fn update_depth_clamp_state(&mut self) {
        let enable = self.regs.view_volume_clip_control & 1 != 0;
        self.pipeline.depth_clamp = enable;
        self.host.set_depth_clamp(enable);
    }

    fn update_polygon_mode_state(&mut self) {
        let front = PolygonMode::from_guest(self.regs.polygon_mode_front);
        let back = PolygonMode::from_guest(self.regs.polygon_mode_back);
        self.host.set_polygon_mode(front, back);
    }

    fn update_depth_bias_state(&mut self) {
        let bias = self.regs.depth_bias;
        let descriptor = DepthBiasDescriptor {
            point_enable: bias.point_enable(),
            line_enable: bias.line_enable(),
            fill_enable: bias.fill_enable(),
            factor: bias.factor,
            // The guest unit is half the host unit.
            units: bias.units * 0.5,
            clamp: bias.clamp,
        };
        self.pipeline.depth_bias = descriptor;
        self.host.set_depth_bias(descriptor);
    }

    pub(super) fn update_primitive_restart_state(&mut self) {
        let restart = self.regs.primitive_restart;
        let enable = restart.enable != 0
            && (self.draw.indexed || self.caps.supports_non_indexed_restart);
        self.pipeline.primitive_restart_enable = enable;
        self.host.set_primitive_restart(enable, restart.index);
    }

    fn update_line_state(&mut self) {
        let line = self.regs.line_state;
        let smooth = line.smooth_enable != 0;
        let width = if smooth {
            line.width_smooth
        } else {
            line.width_aliased
        };
        self.pipeline.line_width = width;
        self.host.set_line_parameters(LineParameters { width, smooth });
    }

    fn update_color_mask_state(&mut self) {
        let shared = self.regs.color_mask_shared != 0;
        let mut masks = [ColorMask::empty(); RENDER_TARGET_COUNT];
        for (index, mask) in masks.iter_mut().enumerate() {
            let raw = if shared {
                self.regs.color_mask[0]
            } else {
                self.regs.color_mask[index]
            };
            *mask = ColorMask::from_guest(raw);
        }
        self.pipeline.color_masks = masks;
        self.host.set_render_target_color_masks(&masks);
    }

    fn update_rasterizer_state(&mut self) {
        self.host
            .set_rasterizer_discard(self.regs.rasterize_enable == 0);
    }

    pub(super) fn update_scissor_state(&mut self) {
        let scale = self.textures.render_target_scale();
        let negate_y = self.regs.y_control.negate_y();
        let screen_height = self.regs.screen_scissor.height();

        let mut rects = [ScissorRect::default(); 16];
        for (index, rect) in rects.iter_mut().enumerate() {
            let scissor = self.regs.scissor[index];
            let full_window = scissor.x1() == 0
                && scissor.y1() == 0
                && scissor.x2() == 0xFFFF
                && scissor.y2() == 0xFFFF;
            if scissor.enable == 0 || full_window {
                *rect = ScissorRect {
                    x: 0,
                    y: 0,
                    width: 0xFFFF,
                    height: 0xFFFF,
                };
                continue;
            }

            let mut x = scissor.x1();
            let mut width = scissor.x2().saturating_sub(scissor.x1());
            let mut y = scissor.y1();
            let mut height = scissor.y2().saturating_sub(scissor.y1());

            if negate_y {
                let flipped = i64::from(screen_height) - i64::from(y) - i64::from(height);
                if flipped < 0 {
                    height = (i64::from(height) + flipped).max(0) as u32;
                    y = 0;
                } else {
                    y = flipped as u32;
                }
            }

            if scale != 1.0 {
                x = (x as f32 * scale) as u32;
                y = (y as f32 * scale) as u32;
                width = (width as f32 * scale).ceil() as u32;
                height = (height as f32 * scale).ceil() as u32;
            }

            *rect = ScissorRect {
                x,
                y,
                width,
                height,
            };
        }
        self.host.set_scissors(&rects);
    }

    pub(super) fn update_user_clip_state(&mut self) {
        let written = self
            .program
            .as_ref()
            .map_or(0, |program| program.clip_distances_written());
        let mask = (self.regs.clip_distance_enable as u8) & written;
        for index in 0..8 {
            self.host
                .set_user_clip_distance(index, mask & (1 << index) != 0);
        }
    }

    fn update_alpha_test_state(&mut self) {
        let alpha = self.regs.alpha_test;
        self.host.set_alpha_test(
            alpha.enable != 0,
            CompareOp::from_guest(alpha.func),
            alpha.reference,
        );
    }

    fn update_point_state(&mut self) {
        // TODO: bit 2 as the sprite coord origin selector matches observed
        // driver behavior but is not documented; revisit when the field is.
        let origin_upper_left = self.regs.point_coord_replace & 0x4 != 0;
        self.host.set_point_parameters(PointParameters {
            size: self.regs.point_size,
            program_size_enable: self.regs.point_size_attribute_enable != 0,
            sprite_enable: self.regs.point_sprite_enable != 0,
            origin_upper_left,
        });
    }

    fn update_multisample_state(&mut self) {
        let control = self.regs.multisample_control;
        self.host.set_multisample_state(MultisampleDescriptor {
            alpha_to_coverage: control & 0x1 != 0,
            alpha_to_one: control & 0x10 != 0,
            anti_alias: self.regs.anti_alias_enable != 0,
            sample_mask: self.regs.sample_mask,
        });
    }

    fn update_sampler_pool_state(&mut self) {
        let pool = self.regs.tex_sampler_pool;
        self.textures
            .set_sampler_pool(pool.address(), pool.maximum_id);
    }

    fn update_texture_pool_state(&mut self) {
        let pool = self.regs.tex_header_pool;
        self.textures
            .set_texture_pool(pool.address(), pool.maximum_id);
        self.textures
            .set_texture_buffer_index(self.regs.texture_buffer_index);
    }

    fn update_index_buffer_state(&mut self) {
        let ib = self.regs.index_buffer;
        let address = ib.address();
        let end_address = ib.end_address();
        let size = if end_address >= address {
            end_address - address + 1
        } else {
            0
        };
        self.buffers
            .set_index_buffer(address, size, IndexKind::from_guest(ib.kind));
    }

    fn update_transform_feedback_state(&mut self) {
        for index in 0..self.regs.tf_buffer.len() {
            let tf = self.regs.tf_buffer[index];
            if tf.enable != 0 {
                self.buffers
                    .set_transform_feedback_buffer(index, tf.address(), u64::from(tf.size));
            } else {
                self.buffers.set_transform_feedback_buffer(index, 0, 0);
            }
        }
    }

    pub(super) fn update_shader_state(&mut self) {
        let graphics_key = self.create_graphics_state_key();
        let pool_key = self.create_pool_state_key();

        let base = self.regs.shader_base_address.address();
        let mut addresses = ShaderAddresses::default();
        for stage in 0..STAGE_COUNT {
            let state = self.regs.shader_state[stage];
            // The vertex slot is mandatory; other slots join only when
            // enabled.
            if stage != 1 && !state.unpack_enable() {
                continue;
            }
            addresses.set(stage, base + u64::from(state.offset));
        }

        let program =
            self.shaders
                .get_graphics_shader(&pool_key, &graphics_key, &addresses, &self.pipeline);

        let old_clip_mask = self
            .program
            .as_ref()
            .map_or(0, |p| p.clip_distances_written());
        let new_clip_mask = program.clip_distances_written();

        let max_bindings = program
            .stages
            .iter()
            .flatten()
            .map(|info| info.textures.len() + info.images.len())
            .max()
            .unwrap_or(0);
        self.textures.set_max_bindings(max_bindings);

        for stage in 0..BINDING_STAGE_COUNT {
            match &program.stages[stage] {
                Some(info) => {
                    self.textures
                        .rent_texture_bindings(stage, info.textures.len())
                        .copy_from_slice(&info.textures);
                    self.textures
                        .rent_image_bindings(stage, info.images.len())
                        .copy_from_slice(&info.images);
                    self.buffers
                        .set_graphics_uniform_buffer_bindings(stage, &info.constant_buffers);
                    self.buffers
                        .set_graphics_storage_buffer_bindings(stage, &info.storage_buffers);
                }
                None => {
                    self.textures.rent_texture_bindings(stage, 0);
                    self.textures.rent_image_bindings(stage, 0);
                    self.buffers.set_graphics_uniform_buffer_bindings(stage, &[]);
                    self.buffers.set_graphics_storage_buffer_bindings(stage, &[]);
                }
            }
        }

        if self.pipeline.program != program.handle {
            self.pipeline.program = program.handle;
            self.host.set_program(program.handle);
            self.stats.program_binds += 1;
        }
        self.program = Some(program);

        if old_clip_mask != new_clip_mask {
            self.update_user_clip_state();
        }
    }

    fn update_render_targets_group(&mut self) {
        let layered = self
            .program
            .as_ref()
            .is_some_and(|program| program.writes_rt_layer());
        self.update_render_target_state(true, layered, None);
    }

    /// Bind the current render targets.
    ///
    /// `use_control` selects slot permutation and count from the RT control
    /// word; clear paths pass false to address slots directly, and
    /// `single_use` to scale for a single throwaway attachment.
    pub fn update_render_target_state(
        &mut self,
        use_control: bool,
        layered: bool,
        single_use: Option<usize>,
    ) {
        let control = self.regs.rt_control;
        let count = if use_control {
            control.unpack_count().min(RENDER_TARGET_COUNT)
        } else {
            RENDER_TARGET_COUNT
        };
        let msaa = MsaaMode::from_guest(self.regs.rt_msaa_mode);
        let samples_in_x = msaa.samples_in_x();
        let samples_in_y = msaa.samples_in_y();
        let size_hint = (
            self.regs.screen_scissor.width(),
            self.regs.screen_scissor.height(),
        );

        let mut clip_width = u32::MAX;
        let mut clip_height = u32::MAX;

        for index in 0..RENDER_TARGET_COUNT {
            let slot = if use_control {
                control.unpack_map(index)
            } else {
                index
            };
            let rt = self.regs.rt_color[slot];
            let enabled = index < count && rt.is_enabled();
            if index < count && rt.format != 0 && rt.width == 0 {
                debug!(slot, "render target slot with zero width treated as disabled");
            }
            let binding = enabled.then(|| RtColorBinding {
                address: rt.address(),
                width: rt.width,
                height: rt.height,
                format: rt.format,
                tile_mode: rt.tile_mode,
                layer_count: rt.layer_count,
                layer_stride: rt.layer_stride,
                layered,
                size_hint,
                samples_in_x,
                samples_in_y,
            });
            self.textures.set_render_target_color(index, binding);
            if enabled {
                clip_width = clip_width.min(rt.width / samples_in_x);
                clip_height = clip_height.min(rt.height / samples_in_y);
            }
        }

        let ds = self.regs.rt_depth_stencil;
        let ds_enabled = self.regs.rt_depth_stencil_enable != 0 && ds.format != 0;
        let binding = ds_enabled.then(|| RtDepthBinding {
            address: ds.address(),
            width: self.regs.rt_depth_stencil_width,
            height: self.regs.rt_depth_stencil_height,
            format: ds.format,
            tile_mode: ds.tile_mode,
            layer_count: ds.layer_count,
            layer_stride: ds.layer_stride,
            layered,
            size_hint,
            samples_in_x,
            samples_in_y,
        });
        self.textures.set_render_target_depth(binding);
        if ds_enabled {
            clip_width = clip_width.min(self.regs.rt_depth_stencil_width / samples_in_x);
            clip_height = clip_height.min(self.regs.rt_depth_stencil_height / samples_in_y);
        }

        if clip_width == u32::MAX {
            clip_width = size_hint.0 / samples_in_x;
            clip_height = size_hint.1 / samples_in_y;
        }
        self.textures.set_clip_region(clip_width, clip_height);

        if self.textures.update_render_target_scale(single_use) {
            let scale = self.textures.render_target_scale();
            self.host.set_render_target_scale(scale);
            self.update_viewport_state();
            self.update_scissor_state();
        }
    }

    /// Depth-mode inference from viewport 0.
    ///
    /// Non-degenerate extents that both differ from the Z translate can only
    /// have been programmed for a -1..1 clip space. Degenerate extents fall
    /// back to the depth-mode register's low bit.
    pub(super) fn inferred_depth_mode(&self) -> DepthMode {
        let transform = self.regs.viewport_transform[0];
        let extents = self.regs.viewport_extents[0];
        if extents.depth_near.is_finite()
            && extents.depth_far.is_finite()
            && extents.depth_near != extents.depth_far
        {
            if extents.depth_near != transform.translate_z
                && extents.depth_far != transform.translate_z
            {
                DepthMode::MinusOneToOne
            } else {
                DepthMode::ZeroToOne
            }
        } else if self.regs.depth_mode & 1 != 0 {
            DepthMode::MinusOneToOne
        } else {
            DepthMode::ZeroToOne
        }
    }

    pub(super) fn create_graphics_state_key(&self) -> GraphicsStateKey {
        let mut attribute_types = [AttributeType::Float; VERTEX_ATTRIB_COUNT];
        for (index, attribute_type) in attribute_types.iter_mut().enumerate() {
            let attrib = self.regs.vertex_attrib_state[index];
            *attribute_type = VertexFormat::from_codes(
                attrib.unpack_size_code(),
                attrib.unpack_type_code(),
            )
            .unwrap_or(VertexFormat::RGBA32_FLOAT)
            .attribute_type();
        }
        let control = self.regs.multisample_control;
        GraphicsStateKey {
            early_z_force: self.regs.early_z_force != 0,
            topology: self.draw.topology,
            tess_mode: self.regs.tess_mode,
            alpha_to_coverage: control & 0x1 != 0,
            alpha_to_one: control & 0x10 != 0,
            viewport_transform_disable: self.regs.viewport_transform_enable == 0,
            depth_mode_minus_one_to_one: self.inferred_depth_mode() == DepthMode::MinusOneToOne,
            program_point_size: self.regs.point_size_attribute_enable != 0,
            point_size: self.regs.point_size,
            alpha_test_enable: self.regs.alpha_test.enable != 0,
            alpha_test_func: CompareOp::from_guest(self.regs.alpha_test.func),
            alpha_test_reference: self.regs.alpha_test.reference,
            attribute_types,
        }
    }

    pub(super) fn create_pool_state_key(&self) -> PoolStateKey {
        PoolStateKey {
            texture_pool_address: self.regs.tex_header_pool.address(),
            texture_pool_maximum_id: self.regs.tex_header_pool.maximum_id,
            texture_buffer_index: self.regs.texture_buffer_index,
        }
    }
}
