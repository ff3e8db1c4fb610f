//! Shader specialization fingerprints.
//!
//! A compiled program is specialized against a snapshot of guest state. Two
//! snapshots are interchangeable iff they are byte-equal modulo documented
//! don't-cares: a program records which state it actually observed
//! ([`SpecQueries`]); unobserved fields never force a recompile. Pool state
//! has no don't-cares and always compares exactly.

use bitflags::bitflags;

use crate::types::{AttributeType, CompareOp, PrimitiveTopology};

bitflags! {
    /// Which parts of [`GraphicsStateKey`] a compiled program observed.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SpecQueries: u32 {
        const EARLY_Z = 1 << 0;
        const TOPOLOGY = 1 << 1;
        const TESS_MODE = 1 << 2;
        const ALPHA_TO_COVERAGE = 1 << 3;
        const VIEWPORT_TRANSFORM = 1 << 4;
        const DEPTH_MODE = 1 << 5;
        const POINT_SIZE = 1 << 6;
        const ALPHA_TEST = 1 << 7;
        const ATTRIBUTE_TYPES = 1 << 8;
    }
}

/// Fingerprint of the guest graphics state a program can be specialized on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphicsStateKey {
    pub early_z_force: bool,
    pub topology: PrimitiveTopology,
    pub tess_mode: u32,
    pub alpha_to_coverage: bool,
    pub alpha_to_one: bool,
    pub viewport_transform_disable: bool,
    /// True when the inferred depth mode is -1..1.
    pub depth_mode_minus_one_to_one: bool,
    pub program_point_size: bool,
    pub point_size: f32,
    pub alpha_test_enable: bool,
    pub alpha_test_func: CompareOp,
    pub alpha_test_reference: f32,
    pub attribute_types: [AttributeType; 16],
}

impl Default for GraphicsStateKey {
    fn default() -> Self {
        Self {
            early_z_force: false,
            topology: PrimitiveTopology::Triangles,
            tess_mode: 0,
            alpha_to_coverage: false,
            alpha_to_one: false,
            viewport_transform_disable: false,
            depth_mode_minus_one_to_one: false,
            program_point_size: false,
            point_size: 1.0,
            alpha_test_enable: false,
            alpha_test_func: CompareOp::Always,
            alpha_test_reference: 0.0,
            attribute_types: [AttributeType::Float; 16],
        }
    }
}

/// Fingerprint of the texture/sampler pool configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStateKey {
    pub texture_pool_address: u64,
    pub texture_pool_maximum_id: u32,
    pub texture_buffer_index: u32,
}

/// Specialization snapshot recorded on a cached program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecializationState {
    pub graphics: GraphicsStateKey,
    pub pool: PoolStateKey,
    pub queried: SpecQueries,
}

impl SpecializationState {
    /// Whether the program compiled against this snapshot is still usable
    /// with the given current state.
    pub fn matches(&self, graphics: &GraphicsStateKey, pool: &PoolStateKey) -> bool {
        if self.pool != *pool {
            return false;
        }
        let old = &self.graphics;
        let q = self.queried;
        if q.contains(SpecQueries::EARLY_Z) && old.early_z_force != graphics.early_z_force {
            return false;
        }
        if q.contains(SpecQueries::TOPOLOGY) && old.topology != graphics.topology {
            return false;
        }
        if q.contains(SpecQueries::TESS_MODE) && old.tess_mode != graphics.tess_mode {
            return false;
        }
        if q.contains(SpecQueries::ALPHA_TO_COVERAGE)
            && (old.alpha_to_coverage != graphics.alpha_to_coverage
                || old.alpha_to_one != graphics.alpha_to_one)
        {
            return false;
        }
        if q.contains(SpecQueries::VIEWPORT_TRANSFORM)
            && old.viewport_transform_disable != graphics.viewport_transform_disable
        {
            return false;
        }
        if q.contains(SpecQueries::DEPTH_MODE)
            && old.depth_mode_minus_one_to_one != graphics.depth_mode_minus_one_to_one
        {
            return false;
        }
        if q.contains(SpecQueries::POINT_SIZE)
            && (old.program_point_size != graphics.program_point_size
                || old.point_size.to_bits() != graphics.point_size.to_bits())
        {
            return false;
        }
        if q.contains(SpecQueries::ALPHA_TEST)
            && (old.alpha_test_enable != graphics.alpha_test_enable
                || old.alpha_test_func != graphics.alpha_test_func
                || old.alpha_test_reference.to_bits() != graphics.alpha_test_reference.to_bits())
        {
            return false;
        }
        if q.contains(SpecQueries::ATTRIBUTE_TYPES)
            && old.attribute_types != graphics.attribute_types
        {
            return false;
        }
        true
    }
}
