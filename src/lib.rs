//! Sun/shade classification for venues against nearby buildings.
//!
//! Buildings are indexed as centroid points with a height. For each venue the
//! shadow engine marches toward the sun and asks whether any building between
//! the venue and the sun is tall enough for its shadow to reach it. The batch
//! classifier applies that across a venue list together with cloud cover, and
//! the scheduler decides when a new pass is worth running.

pub mod atmosphere;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod ingest;
pub mod scheduler;
pub mod shadow_engine;
pub mod spatial_index;
pub mod sun_position;
pub mod time_control;
pub mod types;

pub use atmosphere::{cloud_sun_factor, hourly_sun_factor, HourlyCloudCover};
pub use classifier::{BatchClassifier, ClassificationReport, SunTag, VenueStatus};
pub use config::EngineConfig;
pub use scheduler::{spawn_frame_loop, IndexSlot, ReclassificationScheduler};
pub use shadow_engine::ShadowEngine;
pub use spatial_index::BuildingIndex;
pub use sun_position::SunCalculator;
pub use types::*;
