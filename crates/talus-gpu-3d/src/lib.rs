//! `talus-gpu-3d` translates the guest 3D-engine register bank into host
//! pipeline state, once per draw, incrementally.
//!
//! The pieces, leaves first:
//! - [`regs`]: a typed overlay over the guest register words.
//! - [`tracker`]: grouped dirty tracking keyed by register word offsets.
//! - [`types`]: bit-exact guest encodings and their host interpretations.
//! - [`pipeline`]: the cached host pipeline snapshot.
//! - [`specialization`]: shader fingerprints and compatibility.
//! - [`shader`]: cached program records and reflection metadata.
//! - [`host`] / [`managers`]: the collaborator traits this crate drives.
//! - [`updater`]: the update-group callbacks and the per-draw preamble.
//!   The single entry point per draw is
//!   [`updater::StateUpdater::update_for_draw`].
//!
//! Data flows one way: register writes → dirty bits → tracker → group
//! callbacks → host descriptors → host API. The hot path is infallible and
//! allocation-free; bad guest state logs at debug level and substitutes a
//! safe value.

pub mod host;
pub mod managers;
pub mod pipeline;
pub mod regs;
pub mod shader;
pub mod specialization;
pub mod tracker;
pub mod types;
pub mod updater;

pub use host::{HostCapabilities, HostRenderer, ProgramHandle};
pub use managers::{BufferManager, GuestMemory, ShaderCache, TextureManager};
pub use pipeline::PipelineState;
pub use regs::{Registers, REG_WORDS};
pub use specialization::{GraphicsStateKey, PoolStateKey, SpecializationState};
pub use tracker::{DirtyTracker, ALL_GROUPS};
pub use updater::{group, DrawParams, StateUpdater, UpdaterStats};
