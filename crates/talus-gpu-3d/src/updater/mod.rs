//! The per-channel state updater: dirty-tracked translation of the register
//! bank into host pipeline state, plus the per-draw ordering controller.
//!
//! One updater exists per GPU channel and is strictly single-threaded. Data
//! flows one way: register writes mark update groups dirty, the draw
//! preamble drains the tracker in ascending group order, each group callback
//! derives host descriptors from the register mirror, mutates the pipeline
//! snapshot and forwards the delta. Group callbacks are free functions in a
//! fixed table indexed by the [`group`] constants.

mod groups;

use std::sync::Arc;

use tracing::warn;

use crate::host::{HostCapabilities, HostRenderer};
use crate::managers::{
    BufferManager, GuestMemory, ShaderCache, StorageBufferDescriptor, TextureManager,
};
use crate::pipeline::PipelineState;
use crate::regs::Registers;
use crate::shader::{
    CachedGraphicsProgram, BINDING_STAGE_COUNT, STORAGE_DESC_BASE_OFFSET,
    STORAGE_DESC_SLOT_STRIDE, STORAGE_DESC_STAGE_STRIDE,
};
use crate::tracker::{DirtyTracker, ALL_GROUPS};
use crate::types::{IndexKind, PrimitiveTopology};

/// Update group indices, in drain order.
///
/// Shader runs after every group it can be specialized on; render targets
/// run after shader because the bound program's layer-write flag selects
/// layered attachments. Scissor, rasterizer, vertex-buffer and
/// primitive-restart indices are public because render-target clear paths
/// and the draw preamble force them directly.
pub mod group {
    pub const VERTEX_BUFFERS: usize = 0;
    pub const VERTEX_ATTRIBS: usize = 1;
    pub const BLEND: usize = 2;
    pub const FACE: usize = 3;
    pub const STENCIL_TEST: usize = 4;
    pub const DEPTH_TEST: usize = 5;
    pub const TESSELLATION: usize = 6;
    pub const VIEWPORT: usize = 7;
    pub const LOGIC_OP: usize = 8;
    pub const DEPTH_CLAMP: usize = 9;
    pub const POLYGON_MODE: usize = 10;
    pub const DEPTH_BIAS: usize = 11;
    pub const PRIMITIVE_RESTART: usize = 12;
    pub const LINE: usize = 13;
    pub const COLOR_MASK: usize = 14;
    pub const RASTERIZER: usize = 15;
    pub const SCISSOR: usize = 16;
    pub const USER_CLIP: usize = 17;
    pub const ALPHA_TEST: usize = 18;
    pub const POINT: usize = 19;
    pub const MULTISAMPLE: usize = 20;
    pub const SAMPLER_POOL: usize = 21;
    pub const TEXTURE_POOL: usize = 22;
    pub const INDEX_BUFFER: usize = 23;
    pub const TRANSFORM_FEEDBACK: usize = 24;
    pub const SHADER: usize = 25;
    pub const RENDER_TARGETS: usize = 26;
    pub const COUNT: usize = 27;
}

/// Parameters of the draw being prepared, as decoded by the draw dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    pub indexed: bool,
    pub topology: PrimitiveTopology,
    /// Base vertex for indexed draws.
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self {
            indexed: false,
            topology: PrimitiveTopology::Triangles,
            first_vertex: 0,
            first_instance: 0,
        }
    }
}

/// Monotonic counters for cheap introspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdaterStats {
    pub group_runs: u64,
    pub program_binds: u64,
    pub spec_rebuilds: u64,
    pub attrib_format_fallbacks: u64,
}

/// Previous-draw values used to detect edge-triggered transitions. Owned and
/// mutated only by the draw preamble.
#[derive(Debug, Clone, Copy)]
struct DrawScratch {
    prev_draw_indexed: bool,
    prev_index_kind: IndexKind,
    prev_first_vertex: u32,
    prev_tf_enable: bool,
}

impl Default for DrawScratch {
    fn default() -> Self {
        Self {
            prev_draw_indexed: false,
            prev_index_kind: IndexKind::U32,
            prev_first_vertex: 0,
            prev_tf_enable: false,
        }
    }
}

/// The 3D-engine state updater for one GPU channel.
pub struct StateUpdater {
    regs: Box<Registers>,
    tracker: DirtyTracker,
    pipeline: PipelineState,
    caps: HostCapabilities,
    host: Box<dyn HostRenderer>,
    textures: Box<dyn TextureManager>,
    buffers: Box<dyn BufferManager>,
    shaders: Box<dyn ShaderCache>,
    memory: Box<dyn GuestMemory>,
    draw: DrawParams,
    scratch: DrawScratch,
    program: Option<Arc<CachedGraphicsProgram>>,
    stats: UpdaterStats,
}

impl StateUpdater {
    pub fn new(
        caps: HostCapabilities,
        host: Box<dyn HostRenderer>,
        textures: Box<dyn TextureManager>,
        buffers: Box<dyn BufferManager>,
        shaders: Box<dyn ShaderCache>,
        memory: Box<dyn GuestMemory>,
    ) -> Self {
        let mut tracker = groups::build_tracker();
        // Nothing has been sent to the host yet.
        tracker.set_all_dirty();
        Self {
            regs: Registers::new(),
            tracker,
            pipeline: PipelineState::default(),
            caps,
            host,
            textures,
            buffers,
            shaders,
            memory,
            draw: DrawParams::default(),
            scratch: DrawScratch::default(),
            program: None,
            stats: UpdaterStats::default(),
        }
    }

    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    /// The register bank is owned by the command-stream processor; this is
    /// its write path.
    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.pipeline
    }

    pub fn stats(&self) -> UpdaterStats {
        self.stats
    }

    /// Write a register word and mark the groups depending on it.
    pub fn write_register(&mut self, word_offset: usize, value: u32) {
        self.regs.write_word(word_offset, value);
        self.tracker.set_dirty(word_offset);
    }

    /// Mark every group depending on the given register word.
    pub fn mark_dirty(&mut self, word_offset: usize) {
        self.tracker.set_dirty(word_offset);
    }

    pub fn mark_all_dirty(&mut self) {
        self.tracker.set_all_dirty();
    }

    /// Force the shader group to re-resolve the program on the next update.
    pub fn force_shader_update(&mut self) {
        self.tracker.force_dirty(group::SHADER);
    }

    pub fn force_dirty(&mut self, group: usize) {
        self.tracker.force_dirty(group);
    }

    pub fn is_group_dirty(&self, group: usize) -> bool {
        self.tracker.is_dirty(group)
    }

    /// Run every dirty group selected by `mask`, in ascending group order.
    pub fn update(&mut self, mask: u64) {
        while let Some(group) = self.tracker.take_next(mask) {
            self.stats.group_runs += 1;
            (groups::UPDATE_FNS[group])(self);
        }
    }

    pub fn update_all(&mut self) {
        self.update(ALL_GROUPS);
    }

    /// The draw preamble: run once at the top of every draw, in this exact
    /// order.
    ///
    /// 1. Re-check the bound program against the current fingerprints.
    /// 2./3. Edge-triggered vertex-buffer (and restart) invalidation.
    /// 4. End transform feedback before shader updates can rebind programs
    ///    whose interface includes the captured outputs.
    /// 5. Drain the tracker.
    /// 6. Commit resource bindings.
    /// 7. Begin transform feedback only once the program is bound.
    pub fn update_for_draw(&mut self, params: DrawParams) {
        self.draw = params;

        if let Some(program) = &self.program {
            let graphics = self.create_graphics_state_key();
            let pool = self.create_pool_state_key();
            if !program.specialization.matches(&graphics, &pool) {
                self.tracker.force_dirty(group::SHADER);
            }
        }

        if params.indexed != self.scratch.prev_draw_indexed {
            self.tracker.force_dirty(group::VERTEX_BUFFERS);
            if self.regs.primitive_restart.enable != 0 && !self.caps.supports_non_indexed_restart {
                self.tracker.force_dirty(group::PRIMITIVE_RESTART);
            }
            self.scratch.prev_draw_indexed = params.indexed;
        }

        if params.indexed {
            let kind = IndexKind::from_guest(self.regs.index_buffer.kind);
            if kind != self.scratch.prev_index_kind
                || params.first_vertex != self.scratch.prev_first_vertex
            {
                self.tracker.force_dirty(group::VERTEX_BUFFERS);
                self.scratch.prev_index_kind = kind;
                self.scratch.prev_first_vertex = params.first_vertex;
            }
        }

        let tf_enable = self.regs.tf_enable != 0;
        if !tf_enable && self.scratch.prev_tf_enable {
            self.host.end_transform_feedback();
            self.scratch.prev_tf_enable = false;
        }

        self.update(ALL_GROUPS);

        self.commit_bindings();

        if tf_enable && !self.scratch.prev_tf_enable {
            self.host.begin_transform_feedback(self.draw.topology);
            self.scratch.prev_tf_enable = true;
        }
    }

    /// Materialize the concrete resource bindings for the draw.
    pub fn commit_bindings(&mut self) {
        self.materialize_storage_buffers();

        if let Some(program) = self.program.clone() {
            if !self.textures.commit_graphics_bindings(&program.specialization) {
                // A bound texture contradicts the specialization; rebuild the
                // program once against the state it actually sees and retry.
                self.stats.spec_rebuilds += 1;
                self.update_shader_state();
                if let Some(program) = self.program.clone() {
                    if !self.textures.commit_graphics_bindings(&program.specialization) {
                        warn!("texture bindings still incompatible after program rebuild");
                    }
                }
            }
        }

        self.buffers.commit_graphics_bindings();
    }

    fn materialize_storage_buffers(&mut self) {
        let Some(program) = self.program.clone() else {
            return;
        };
        let base = self.regs.driver_uniform_base.address();
        for stage in 0..BINDING_STAGE_COUNT {
            let Some(info) = &program.stages[stage] else {
                continue;
            };
            for descriptor in &info.storage_buffers {
                let address = base
                    + STORAGE_DESC_BASE_OFFSET
                    + stage as u64 * STORAGE_DESC_STAGE_STRIDE
                    + u64::from(descriptor.slot) * STORAGE_DESC_SLOT_STRIDE;
                let record = StorageBufferDescriptor::read_from(self.memory.as_ref(), address);
                self.buffers.set_graphics_storage_buffer(
                    stage,
                    descriptor.slot as usize,
                    record.address,
                    u64::from(record.size),
                    record.flags,
                );
            }
        }
    }
}
