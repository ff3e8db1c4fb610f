//! Cached program records and their reflection metadata.
//!
//! The shader cache (an external collaborator, see
//! [`crate::managers::ShaderCache`]) resolves the six guest stage addresses
//! plus the specialization fingerprints into a [`CachedGraphicsProgram`]. The
//! state updater wires the program's per-stage reflection lists into the
//! texture and buffer managers and keeps the feature flags it needs for
//! render-target and clip-distance decisions.

use std::sync::Arc;

use crate::host::ProgramHandle;
use crate::specialization::SpecializationState;

/// Guest program slots, including the always-present slot 1 (vertex).
pub const STAGE_COUNT: usize = 6;

/// Binding stages exposed to the resource managers (vertex through fragment;
/// guest slot 0 merges into the vertex stage).
pub const BINDING_STAGE_COUNT: usize = 5;

/// Offset of the storage-buffer descriptor table inside the driver constant
/// buffer, and its per-stage/per-slot strides.
pub const STORAGE_DESC_BASE_OFFSET: u64 = 0x110;
pub const STORAGE_DESC_STAGE_STRIDE: u64 = 0x100;
pub const STORAGE_DESC_SLOT_STRIDE: u64 = 0x10;

/// Resolved guest code addresses for the six program slots. Zero means the
/// slot is not part of the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ShaderAddresses {
    pub addresses: [u64; STAGE_COUNT],
}

impl ShaderAddresses {
    pub fn get(&self, stage: usize) -> u64 {
        self.addresses[stage]
    }

    pub fn set(&mut self, stage: usize, address: u64) {
        self.addresses[stage] = address;
    }
}

/// One texture or image binding a stage declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureBindingInfo {
    /// Host binding point.
    pub binding: u32,
    /// Guest handle location (constant-buffer word) the texture id is read
    /// from.
    pub handle: u32,
}

/// One constant- or storage-buffer binding a stage declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferBindingInfo {
    /// Host binding point.
    pub binding: u32,
    /// Guest descriptor slot.
    pub slot: u32,
}

/// Reflection info for one bound stage.
#[derive(Debug, Clone, Default)]
pub struct ShaderStageInfo {
    pub constant_buffers: Vec<BufferBindingInfo>,
    pub storage_buffers: Vec<BufferBindingInfo>,
    pub textures: Vec<TextureBindingInfo>,
    pub images: Vec<TextureBindingInfo>,
    pub uses_instance_id: bool,
    pub writes_rt_layer: bool,
    /// Bit per clip distance the stage writes.
    pub clip_distances_written: u8,
}

/// A program resolved by the shader cache for the current fingerprints.
#[derive(Debug, Clone)]
pub struct CachedGraphicsProgram {
    pub handle: ProgramHandle,
    pub stages: [Option<Arc<ShaderStageInfo>>; BINDING_STAGE_COUNT],
    pub specialization: SpecializationState,
}

impl CachedGraphicsProgram {
    fn stage_flags(&self) -> impl Iterator<Item = &ShaderStageInfo> {
        self.stages.iter().flatten().map(|info| info.as_ref())
    }

    pub fn writes_rt_layer(&self) -> bool {
        self.stage_flags().any(|info| info.writes_rt_layer)
    }

    pub fn uses_instance_id(&self) -> bool {
        self.stage_flags().any(|info| info.uses_instance_id)
    }

    pub fn clip_distances_written(&self) -> u8 {
        self.stage_flags()
            .fold(0, |mask, info| mask | info.clip_distances_written)
    }
}
