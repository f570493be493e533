//! Core of an offline, physically-based spectral/RGB path tracer: BVH
//! construction and traversal, a bidirectional vertex-connection-and-merging
//! (VCM) light-transport integrator, and the adaptive viewport orchestrator
//! that drives per-pixel sample accumulation across a worker pool.
//!
//! Geometric primitive intersection, material/BSDF evaluation internals,
//! light sampling internals, camera projection internals, image storage,
//! asset loading, and interactive UI all live outside this crate;
//! `interfaces.rs` names the traits it consumes from them.

pub mod bvh;
pub mod config;
pub mod error;
pub mod film;
pub mod interfaces;
pub mod math;
pub mod photon;
pub mod sampler;
pub mod spectrum;
pub mod vcm;
pub mod viewport;
