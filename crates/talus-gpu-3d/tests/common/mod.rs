//! Shared fake environment for the state updater suites.
//!
//! All collaborators record into one chronological event log so tests can
//! assert cross-object ordering (blend before program bind before render
//! targets, transform feedback around commit, and so on).

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use talus_gpu_3d::host::{
    BlendDescriptor, ColorMask, DepthBiasDescriptor, DepthTestDescriptor, HostCapabilities,
    HostRenderer, LineParameters, MultisampleDescriptor, PointParameters, ProgramHandle,
    ScissorRect, StencilTestDescriptor, VertexAttribDescriptor, Viewport,
};
use talus_gpu_3d::managers::{
    BufferManager, GuestMemory, RtColorBinding, RtDepthBinding, ShaderCache, TextureManager,
};
use talus_gpu_3d::shader::{
    BufferBindingInfo, CachedGraphicsProgram, ShaderAddresses, ShaderStageInfo,
    TextureBindingInfo, BINDING_STAGE_COUNT,
};
use talus_gpu_3d::specialization::{
    GraphicsStateKey, PoolStateKey, SpecQueries, SpecializationState,
};
use talus_gpu_3d::types::{
    CompareOp, CullFace, DepthMode, FrontFace, IndexKind, LogicOp, PolygonMode, PrimitiveTopology,
};
use talus_gpu_3d::{DrawParams, PipelineState, StateUpdater};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SetVertexAttribs(Vec<VertexAttribDescriptor>),
    SetBlendState(usize, BlendDescriptor),
    SetFaceCulling(bool, CullFace),
    SetFrontFace(FrontFace),
    SetStencilTest(StencilTestDescriptor),
    SetDepthTest(DepthTestDescriptor),
    SetPatchParameters(u32),
    SetViewports(Vec<Viewport>),
    SetScissors(Vec<ScissorRect>),
    SetDepthMode(DepthMode),
    SetLogicOpState(bool, LogicOp),
    SetDepthClamp(bool),
    SetPolygonMode(PolygonMode, PolygonMode),
    SetDepthBias(DepthBiasDescriptor),
    SetPrimitiveRestart(bool, u32),
    SetLineParameters(LineParameters),
    SetRenderTargetColorMasks(Vec<ColorMask>),
    SetRasterizerDiscard(bool),
    SetAlphaTest(bool, CompareOp, f32),
    SetPointParameters(PointParameters),
    SetUserClipDistance(usize, bool),
    SetMultisampleState(MultisampleDescriptor),
    SetProgram(ProgramHandle),
    SetRenderTargetScale(f32),
    BeginTransformFeedback(PrimitiveTopology),
    EndTransformFeedback,

    SetRenderTargetColor(usize, Option<RtColorBinding>),
    SetRenderTargetDepth(Option<RtDepthBinding>),
    SetClipRegion(u32, u32),
    SetSamplerPool(u64, u32),
    SetTexturePool(u64, u32),
    SetTextureBufferIndex(u32),
    SetMaxBindings(usize),
    CommitTextureBindings(bool),

    SetVertexBuffer {
        index: usize,
        address: u64,
        size: u64,
        stride: u32,
        divisor: u32,
    },
    SetIndexBuffer(u64, u64, IndexKind),
    SetGraphicsStorageBuffer {
        stage: usize,
        slot: usize,
        address: u64,
        size: u64,
        flags: u32,
    },
    SetTransformFeedbackBuffer(usize, u64, u64),
    SetStorageBufferBindings(usize, Vec<BufferBindingInfo>),
    SetUniformBufferBindings(usize, Vec<BufferBindingInfo>),
    CommitBufferBindings,
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub struct RecordingHost {
    log: EventLog,
}

impl HostRenderer for RecordingHost {
    fn set_vertex_attribs(&mut self, attribs: &[VertexAttribDescriptor]) {
        self.log
            .borrow_mut()
            .push(Event::SetVertexAttribs(attribs.to_vec()));
    }

    fn set_blend_state(&mut self, index: usize, descriptor: BlendDescriptor) {
        self.log
            .borrow_mut()
            .push(Event::SetBlendState(index, descriptor));
    }

    fn set_face_culling(&mut self, enable: bool, face: CullFace) {
        self.log.borrow_mut().push(Event::SetFaceCulling(enable, face));
    }

    fn set_front_face(&mut self, front_face: FrontFace) {
        self.log.borrow_mut().push(Event::SetFrontFace(front_face));
    }

    fn set_stencil_test(&mut self, descriptor: StencilTestDescriptor) {
        self.log.borrow_mut().push(Event::SetStencilTest(descriptor));
    }

    fn set_depth_test(&mut self, descriptor: DepthTestDescriptor) {
        self.log.borrow_mut().push(Event::SetDepthTest(descriptor));
    }

    fn set_patch_parameters(&mut self, vertices: u32) {
        self.log.borrow_mut().push(Event::SetPatchParameters(vertices));
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.log
            .borrow_mut()
            .push(Event::SetViewports(viewports.to_vec()));
    }

    fn set_scissors(&mut self, scissors: &[ScissorRect]) {
        self.log
            .borrow_mut()
            .push(Event::SetScissors(scissors.to_vec()));
    }

    fn set_depth_mode(&mut self, mode: DepthMode) {
        self.log.borrow_mut().push(Event::SetDepthMode(mode));
    }

    fn set_logic_op_state(&mut self, enable: bool, op: LogicOp) {
        self.log.borrow_mut().push(Event::SetLogicOpState(enable, op));
    }

    fn set_depth_clamp(&mut self, enable: bool) {
        self.log.borrow_mut().push(Event::SetDepthClamp(enable));
    }

    fn set_polygon_mode(&mut self, front: PolygonMode, back: PolygonMode) {
        self.log.borrow_mut().push(Event::SetPolygonMode(front, back));
    }

    fn set_depth_bias(&mut self, descriptor: DepthBiasDescriptor) {
        self.log.borrow_mut().push(Event::SetDepthBias(descriptor));
    }

    fn set_primitive_restart(&mut self, enable: bool, index: u32) {
        self.log
            .borrow_mut()
            .push(Event::SetPrimitiveRestart(enable, index));
    }

    fn set_line_parameters(&mut self, parameters: LineParameters) {
        self.log.borrow_mut().push(Event::SetLineParameters(parameters));
    }

    fn set_render_target_color_masks(&mut self, masks: &[ColorMask]) {
        self.log
            .borrow_mut()
            .push(Event::SetRenderTargetColorMasks(masks.to_vec()));
    }

    fn set_rasterizer_discard(&mut self, discard: bool) {
        self.log.borrow_mut().push(Event::SetRasterizerDiscard(discard));
    }

    fn set_alpha_test(&mut self, enable: bool, func: CompareOp, reference: f32) {
        self.log
            .borrow_mut()
            .push(Event::SetAlphaTest(enable, func, reference));
    }

    fn set_point_parameters(&mut self, parameters: PointParameters) {
        self.log
            .borrow_mut()
            .push(Event::SetPointParameters(parameters));
    }

    fn set_user_clip_distance(&mut self, index: usize, enable: bool) {
        self.log
            .borrow_mut()
            .push(Event::SetUserClipDistance(index, enable));
    }

    fn set_multisample_state(&mut self, descriptor: MultisampleDescriptor) {
        self.log
            .borrow_mut()
            .push(Event::SetMultisampleState(descriptor));
    }

    fn set_program(&mut self, program: ProgramHandle) {
        self.log.borrow_mut().push(Event::SetProgram(program));
    }

    fn set_render_target_scale(&mut self, scale: f32) {
        self.log.borrow_mut().push(Event::SetRenderTargetScale(scale));
    }

    fn begin_transform_feedback(&mut self, topology: PrimitiveTopology) {
        self.log
            .borrow_mut()
            .push(Event::BeginTransformFeedback(topology));
    }

    fn end_transform_feedback(&mut self) {
        self.log.borrow_mut().push(Event::EndTransformFeedback);
    }
}

/// Shared, test-configurable texture manager behavior.
#[derive(Default)]
pub struct TextureConfig {
    pub scale: f32,
    /// Scale values reported as "changed" by successive
    /// `update_render_target_scale` calls.
    pub scale_changes: VecDeque<f32>,
    /// Results for successive `commit_graphics_bindings` calls; empty means
    /// always compatible.
    pub commit_results: VecDeque<bool>,
}

pub struct RecordingTextures {
    log: EventLog,
    pub config: Rc<RefCell<TextureConfig>>,
    texture_bindings: [Vec<TextureBindingInfo>; BINDING_STAGE_COUNT],
    image_bindings: [Vec<TextureBindingInfo>; BINDING_STAGE_COUNT],
}

impl TextureManager for RecordingTextures {
    fn set_render_target_color(&mut self, index: usize, binding: Option<RtColorBinding>) {
        self.log
            .borrow_mut()
            .push(Event::SetRenderTargetColor(index, binding));
    }

    fn set_render_target_depth(&mut self, binding: Option<RtDepthBinding>) {
        self.log.borrow_mut().push(Event::SetRenderTargetDepth(binding));
    }

    fn set_clip_region(&mut self, width: u32, height: u32) {
        self.log.borrow_mut().push(Event::SetClipRegion(width, height));
    }

    fn update_render_target_scale(&mut self, _single_use: Option<usize>) -> bool {
        let mut config = self.config.borrow_mut();
        if let Some(scale) = config.scale_changes.pop_front() {
            config.scale = scale;
            true
        } else {
            false
        }
    }

    fn render_target_scale(&self) -> f32 {
        self.config.borrow().scale
    }

    fn set_sampler_pool(&mut self, address: u64, maximum_id: u32) {
        self.log
            .borrow_mut()
            .push(Event::SetSamplerPool(address, maximum_id));
    }

    fn set_texture_pool(&mut self, address: u64, maximum_id: u32) {
        self.log
            .borrow_mut()
            .push(Event::SetTexturePool(address, maximum_id));
    }

    fn set_texture_buffer_index(&mut self, index: u32) {
        self.log.borrow_mut().push(Event::SetTextureBufferIndex(index));
    }

    fn set_max_bindings(&mut self, count: usize) {
        self.log.borrow_mut().push(Event::SetMaxBindings(count));
    }

    fn rent_texture_bindings(&mut self, stage: usize, count: usize) -> &mut [TextureBindingInfo] {
        let storage = &mut self.texture_bindings[stage];
        storage.resize(count, TextureBindingInfo::default());
        &mut storage[..count]
    }

    fn rent_image_bindings(&mut self, stage: usize, count: usize) -> &mut [TextureBindingInfo] {
        let storage = &mut self.image_bindings[stage];
        storage.resize(count, TextureBindingInfo::default());
        &mut storage[..count]
    }

    fn commit_graphics_bindings(&mut self, _specialization: &SpecializationState) -> bool {
        let result = self
            .config
            .borrow_mut()
            .commit_results
            .pop_front()
            .unwrap_or(true);
        self.log.borrow_mut().push(Event::CommitTextureBindings(result));
        result
    }
}

pub struct RecordingBuffers {
    log: EventLog,
}

impl BufferManager for RecordingBuffers {
    fn set_vertex_buffer(
        &mut self,
        index: usize,
        address: u64,
        size: u64,
        stride: u32,
        divisor: u32,
    ) {
        self.log.borrow_mut().push(Event::SetVertexBuffer {
            index,
            address,
            size,
            stride,
            divisor,
        });
    }

    fn set_index_buffer(&mut self, address: u64, size: u64, kind: IndexKind) {
        self.log
            .borrow_mut()
            .push(Event::SetIndexBuffer(address, size, kind));
    }

    fn set_graphics_storage_buffer(
        &mut self,
        stage: usize,
        slot: usize,
        address: u64,
        size: u64,
        flags: u32,
    ) {
        self.log.borrow_mut().push(Event::SetGraphicsStorageBuffer {
            stage,
            slot,
            address,
            size,
            flags,
        });
    }

    fn set_transform_feedback_buffer(&mut self, index: usize, address: u64, size: u64) {
        self.log
            .borrow_mut()
            .push(Event::SetTransformFeedbackBuffer(index, address, size));
    }

    fn set_graphics_storage_buffer_bindings(&mut self, stage: usize, bindings: &[BufferBindingInfo]) {
        self.log
            .borrow_mut()
            .push(Event::SetStorageBufferBindings(stage, bindings.to_vec()));
    }

    fn set_graphics_uniform_buffer_bindings(&mut self, stage: usize, bindings: &[BufferBindingInfo]) {
        self.log
            .borrow_mut()
            .push(Event::SetUniformBufferBindings(stage, bindings.to_vec()));
    }

    fn commit_graphics_bindings(&mut self) {
        self.log.borrow_mut().push(Event::CommitBufferBindings);
    }
}

/// Shared, test-configurable shader cache behavior.
pub struct CacheConfig {
    pub stages: [Option<Arc<ShaderStageInfo>>; BINDING_STAGE_COUNT],
    pub queried: SpecQueries,
    pub calls: usize,
    next_handle: u64,
    pub last: Option<(PoolStateKey, GraphicsStateKey, ShaderAddresses, Arc<CachedGraphicsProgram>)>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stages: Default::default(),
            queried: SpecQueries::all(),
            calls: 0,
            next_handle: 1,
            last: None,
        }
    }
}

pub struct RecordingShaderCache {
    pub config: Rc<RefCell<CacheConfig>>,
}

impl ShaderCache for RecordingShaderCache {
    fn get_graphics_shader(
        &mut self,
        pool: &PoolStateKey,
        graphics: &GraphicsStateKey,
        addresses: &ShaderAddresses,
        _pipeline: &PipelineState,
    ) -> Arc<CachedGraphicsProgram> {
        let mut config = self.config.borrow_mut();
        config.calls += 1;

        if let Some((last_pool, last_graphics, last_addresses, program)) = &config.last {
            if last_pool == pool && last_graphics == graphics && last_addresses == addresses {
                return Arc::clone(program);
            }
        }

        let handle = ProgramHandle(config.next_handle);
        config.next_handle += 1;
        let program = Arc::new(CachedGraphicsProgram {
            handle,
            stages: config.stages.clone(),
            specialization: SpecializationState {
                graphics: *graphics,
                pool: *pool,
                queried: config.queried,
            },
        });
        config.last = Some((*pool, *graphics, *addresses, Arc::clone(&program)));
        program
    }
}

#[derive(Default)]
pub struct MemoryImage {
    pub bytes: HashMap<u64, u8>,
}

impl MemoryImage {
    pub fn write(&mut self, address: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.bytes.insert(address + i as u64, *byte);
        }
    }
}

pub struct RecordingMemory {
    pub image: Rc<RefCell<MemoryImage>>,
}

impl GuestMemory for RecordingMemory {
    fn read(&self, address: u64, out: &mut [u8]) {
        let image = self.image.borrow();
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = image
                .bytes
                .get(&(address + i as u64))
                .copied()
                .unwrap_or(0);
        }
    }
}

/// The assembled fake environment.
pub struct Env {
    pub updater: StateUpdater,
    pub log: EventLog,
    pub textures: Rc<RefCell<TextureConfig>>,
    pub cache: Rc<RefCell<CacheConfig>>,
    pub memory: Rc<RefCell<MemoryImage>>,
}

impl Env {
    pub fn new(caps: HostCapabilities) -> Self {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let textures = Rc::new(RefCell::new(TextureConfig {
            scale: 1.0,
            ..Default::default()
        }));
        let cache = Rc::new(RefCell::new(CacheConfig::default()));
        let memory = Rc::new(RefCell::new(MemoryImage::default()));

        let updater = StateUpdater::new(
            caps,
            Box::new(RecordingHost {
                log: Rc::clone(&log),
            }),
            Box::new(RecordingTextures {
                log: Rc::clone(&log),
                config: Rc::clone(&textures),
                texture_bindings: Default::default(),
                image_bindings: Default::default(),
            }),
            Box::new(RecordingBuffers {
                log: Rc::clone(&log),
            }),
            Box::new(RecordingShaderCache {
                config: Rc::clone(&cache),
            }),
            Box::new(RecordingMemory {
                image: Rc::clone(&memory),
            }),
        );

        Self {
            updater,
            log,
            textures,
            cache,
            memory,
        }
    }

    pub fn take_events(&self) -> Vec<Event> {
        self.log.borrow_mut().drain(..).collect()
    }

    pub fn draw(&mut self, params: DrawParams) -> Vec<Event> {
        self.updater.update_for_draw(params);
        self.take_events()
    }

    pub fn indexed_draw(&mut self) -> Vec<Event> {
        self.draw(DrawParams {
            indexed: true,
            ..Default::default()
        })
    }

    pub fn non_indexed_draw(&mut self) -> Vec<Event> {
        self.draw(DrawParams::default())
    }
}

pub fn count_events(events: &[Event], predicate: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|event| predicate(event)).count()
}

pub fn position_of(events: &[Event], predicate: impl Fn(&Event) -> bool) -> Option<usize> {
    events.iter().position(predicate)
}
