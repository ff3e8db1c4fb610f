//! Downward interfaces to the texture manager, buffer manager, shader cache
//! and guest memory.
//!
//! These collaborators own host resources and guest-address translation; the
//! state translator only tells them *what* the guest currently wants bound.
//! All traits are object-safe so a channel can hold them as trait objects.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::pipeline::PipelineState;
use crate::shader::{
    BufferBindingInfo, CachedGraphicsProgram, ShaderAddresses, TextureBindingInfo,
};
use crate::specialization::{GraphicsStateKey, PoolStateKey, SpecializationState};
use crate::types::IndexKind;

/// Color render-target request handed to the texture cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtColorBinding {
    pub address: u64,
    /// Width in pixels, or byte stride for linear surfaces.
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub tile_mode: u32,
    pub layer_count: u32,
    pub layer_stride: u32,
    /// Whether the bound program writes the RT layer, selecting a layered
    /// view.
    pub layered: bool,
    /// Screen scissor extent, used by the cache to size aliased surfaces.
    pub size_hint: (u32, u32),
    pub samples_in_x: u32,
    pub samples_in_y: u32,
}

/// Depth-stencil render-target request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtDepthBinding {
    pub address: u64,
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub tile_mode: u32,
    pub layer_count: u32,
    pub layer_stride: u32,
    pub layered: bool,
    pub size_hint: (u32, u32),
    pub samples_in_x: u32,
    pub samples_in_y: u32,
}

/// Texture cache and binding table owner.
pub trait TextureManager {
    fn set_render_target_color(&mut self, index: usize, binding: Option<RtColorBinding>);
    fn set_render_target_depth(&mut self, binding: Option<RtDepthBinding>);
    /// Intersection of all bound attachment extents, in samples.
    fn set_clip_region(&mut self, width: u32, height: u32);
    /// Re-evaluate the render-target scale across the current attachments.
    /// Returns true when the scale changed.
    fn update_render_target_scale(&mut self, single_use: Option<usize>) -> bool;
    fn render_target_scale(&self) -> f32;
    fn set_sampler_pool(&mut self, address: u64, maximum_id: u32);
    fn set_texture_pool(&mut self, address: u64, maximum_id: u32);
    fn set_texture_buffer_index(&mut self, index: u32);
    /// Upper bound of per-stage texture+image bindings for the current
    /// program, letting the manager size its tables once.
    fn set_max_bindings(&mut self, count: usize);
    fn rent_texture_bindings(&mut self, stage: usize, count: usize) -> &mut [TextureBindingInfo];
    fn rent_image_bindings(&mut self, stage: usize, count: usize) -> &mut [TextureBindingInfo];
    /// Resolve and bind everything for the draw. Returns false when a bound
    /// texture contradicts the program's specialization, in which case the
    /// caller rebuilds the program once and retries.
    fn commit_graphics_bindings(&mut self, specialization: &SpecializationState) -> bool;
}

/// Buffer cache and binding table owner.
pub trait BufferManager {
    /// A zero `size` clears the slot.
    fn set_vertex_buffer(&mut self, index: usize, address: u64, size: u64, stride: u32, divisor: u32);
    fn set_index_buffer(&mut self, address: u64, size: u64, kind: IndexKind);
    fn set_graphics_storage_buffer(&mut self, stage: usize, slot: usize, address: u64, size: u64, flags: u32);
    fn set_transform_feedback_buffer(&mut self, index: usize, address: u64, size: u64);
    fn set_graphics_storage_buffer_bindings(&mut self, stage: usize, bindings: &[BufferBindingInfo]);
    fn set_graphics_uniform_buffer_bindings(&mut self, stage: usize, bindings: &[BufferBindingInfo]);
    fn commit_graphics_bindings(&mut self);
}

/// Program lookup keyed by the specialization fingerprints and stage
/// addresses. Compilation policy (caching, stubs on failure) is the cache's
/// concern; the translator always receives a usable program record. The
/// pipeline snapshot rides along so the cache can derive host pipeline keys
/// for ahead-of-time builds.
pub trait ShaderCache {
    fn get_graphics_shader(
        &mut self,
        pool: &PoolStateKey,
        graphics: &GraphicsStateKey,
        addresses: &ShaderAddresses,
        pipeline: &PipelineState,
    ) -> Arc<CachedGraphicsProgram>;
}

/// Read-only guest memory view used to materialize storage-buffer
/// descriptors.
pub trait GuestMemory {
    fn read(&self, address: u64, out: &mut [u8]);
}

/// Storage-buffer descriptor as laid out in the driver constant buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StorageBufferDescriptor {
    pub address: u64,
    pub size: u32,
    pub flags: u32,
}

impl StorageBufferDescriptor {
    pub fn read_from(memory: &dyn GuestMemory, address: u64) -> Self {
        let mut descriptor = Self::default();
        memory.read(address, bytemuck::bytes_of_mut(&mut descriptor));
        descriptor
    }
}
