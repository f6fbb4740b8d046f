pub mod commands;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod mesh;
pub mod raster;
pub mod rng;
pub mod seeding;
pub mod spatial;
pub mod store;
pub mod web;
pub mod world;

pub use config::{ConfigLoader, GaeaConfig};
pub use engine::{ElevationSource, Engine, EngineBuilder, ResetSummary};
pub use error::{Error, Result, ValidationError};
