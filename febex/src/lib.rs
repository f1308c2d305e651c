//! # febex
//!
//! Export skinned character rigs into clean, engine-ready hierarchies.
//!
//! Given a skinned mesh and the top joint of its skeleton, febex builds a
//! pruned copy of the skeleton that keeps only the joints that drive the skin,
//! duplicates the mesh, binds the duplicate to the new skeleton and copies the
//! skin weights across. Optionally the source animation is baked onto the
//! export skeleton.
//!
//! ## Features
//!
//! - **Host independent**: all scene access goes through the [`SceneStore`] trait
//! - **Typed handles**: identifiers are validated once into [`GeometryHandle`],
//!   [`JointHandle`] and [`ClusterHandle`]
//! - **Robust weight transfer**: closest point, closest bone, closest joint
//!   and name matching, tried in that order
//! - **Cooperative cancellation** through [`progress::ProgressHandler`]
//!
//! ## Quick Start
//!
//! ```rust
//! use febex::{ExportBuilder, MemoryScene, NodeId, Vector3D, VertexWeights};
//!
//! # fn main() -> febex::Result<()> {
//! let mut scene = MemoryScene::new();
//! let hips = scene.add_joint("Hips", None, Vector3D::ZERO)?;
//! let (body, shape) = scene.add_mesh(
//!     "body",
//!     vec![Vector3D::ZERO, Vector3D::X, Vector3D::Y],
//!     vec![[0, 1, 2]],
//! )?;
//! scene.add_skin(&shape, &[hips.clone()], vec![VertexWeights::single(hips.clone()); 3])?;
//!
//! let result = ExportBuilder::new().run(&mut scene, &body, &hips)?;
//! assert_eq!(result.new_influences[0].id(), &NodeId::new("Hips_INF"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`mesh`] and [`cluster`] turn user identifiers into validated handles
//! - [`skeleton`] rebuilds the export skeleton
//! - [`skin`] rebinds the mesh and transfers weights
//! - [`exporter`] orchestrates a run, [`animation`] bakes motion afterwards
//! - [`memory`] is a complete in-memory scene for tests and tools

#![warn(missing_docs)]

// Re-export common types for convenience
pub use crate::{
    error::{Error, Result},
    scene::{ChildFilter, ConstraintOptions, SceneStore},
    types::*,
};

pub use crate::config::{ExportConfig, PropertyStore, PropertyValue, export_properties};

pub use crate::exporter::{ExportBuilder, ExportResult, export_rig};

pub use crate::animation::{AnimationBaker, BakeReport, BakeState, BakerOptions, bake_animation};

pub use crate::skeleton::{InfluenceMapping, InfluenceSet, InfluenceTree, InfluenceTreeBuilder};

pub use crate::skin::{SkinBinding, TransferOptions, TransferReport, TransferStage};

pub use crate::weights::{VertexWeight, VertexWeights};

pub use crate::memory::MemoryScene;

// Re-export logging functionality
pub use crate::logging::{LogLevel, LogStream, Logger};

// Re-export AABB functionality
pub use crate::aabb::AABB;

// Core modules
pub mod error;
pub mod scene;
pub mod types;

// Pipeline stages
pub mod animation;
pub mod cluster;
pub mod exporter;
pub mod mesh;
pub mod node;
pub mod skeleton;
pub mod skin;

// Data structure modules
pub mod aabb;
pub mod memory;
pub mod weights;

// Ambient features
pub mod config;
pub mod logging;
pub mod progress;

// Utility modules
pub mod math;

/// Version information
pub mod version {
    /// Version of this crate
    pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
}
