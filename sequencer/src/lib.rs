//! Astro-Physics mount-modeling instructions
//!
//! Sequence instructions that drive the external Astro-Physics Point Mapper
//! through an unattended model-building run: declination-arc models around a
//! target and full all-sky models. Device access (camera, filter wheel,
//! guider) goes through the [`DeviceOps`] trait so the host application
//! provides the actual mediators.

pub mod astro;
mod device_ops;
pub mod geometry;
mod instructions;
mod model_run;
mod options;

pub use device_ops::*;
pub use geometry::{calculate_dec_arc, DecArcParameters};
pub use instructions::*;
pub use model_run::*;
pub use options::*;

/// Declination band beyond which no meaningful model can be built
pub const MAX_MODEL_DEC: f64 = 85.0;
