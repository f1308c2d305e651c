//! Rig export pipeline
//!
//! [`ExportBuilder::run`] performs a complete export against a
//! [`SceneStore`]:
//!
//! 1. resolve the mesh,
//! 2. locate its skin cluster and read the influences,
//! 3. rebuild a pruned export skeleton under the export group,
//! 4. duplicate the mesh container next to it,
//! 5. bind the duplicate to the export skeleton and copy the weights,
//! 6. optionally bake the source animation onto the export skeleton.
//!
//! A failing step aborts the run. Nodes created by earlier steps are left in
//! the scene so the partial result can be inspected.

use crate::{
    animation::{AnimationBaker, BakeReport, BakerOptions},
    config::{ExportConfig, PropertyStore},
    error::Result,
    mesh,
    progress::{PrintProgressHandler, ProgressHandler},
    scene::SceneStore,
    skeleton::{InfluenceSet, InfluenceTreeBuilder},
    skin::{self, SkinBinding, TransferOptions, TransferReport},
    types::{ClusterHandle, DuplicateOptions, GeometryHandle, JointHandle, NodeId, NodeType},
};

/// Everything produced by an export run
#[derive(Debug, Clone)]
pub struct ExportResult {
    /// Source influences that were exported, in cluster order
    pub old_influences: Vec<JointHandle>,
    /// Export copies of `old_influences`, index for index
    pub new_influences: Vec<JointHandle>,
    /// Container holding the export skeleton and mesh
    pub export_group: NodeId,
    /// The mesh that was exported
    pub source_mesh: GeometryHandle,
    /// Its duplicate under the export group
    pub export_mesh: GeometryHandle,
    /// Cluster of the source mesh
    pub old_cluster: ClusterHandle,
    /// Cluster of the export mesh
    pub new_cluster: ClusterHandle,
    /// Root of the export skeleton
    pub skeleton_root: JointHandle,
    /// Influences that were not below the top joint
    pub missing: Vec<JointHandle>,
    /// How the weights were resolved
    pub report: TransferReport,
    /// Set when animation was baked
    pub bake: Option<BakeReport>,
}

/// Builder for configuring and executing rig exports
pub struct ExportBuilder {
    config: ExportConfig,
    properties: PropertyStore,
    progress_handler: Option<Box<dyn ProgressHandler>>,
}

impl std::fmt::Debug for ExportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportBuilder")
            .field("config", &self.config)
            .field("properties", &self.properties.len())
            .field("progress_handler", &self.progress_handler.is_some())
            .finish()
    }
}

impl Default for ExportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::with_config(ExportConfig::default())
    }

    /// Create a builder from a full configuration
    pub fn with_config(config: ExportConfig) -> Self {
        Self {
            config,
            properties: PropertyStore::new(),
            progress_handler: None,
        }
    }

    /// Suffix for export joint names
    pub fn with_influence_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.config.influence_suffix = suffix.into();
        self
    }

    /// Suffix for the export mesh name
    pub fn with_mesh_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.config.mesh_suffix = suffix.into();
        self
    }

    /// Name of the export container
    pub fn with_export_group<S: Into<String>>(mut self, name: S) -> Self {
        self.config.export_group = name.into();
        self
    }

    /// Distance tolerance for weight transfer ties
    pub fn with_tie_tolerance(mut self, tolerance: f32) -> Self {
        self.config.tie_tolerance = tolerance;
        self
    }

    /// Bake animation after rebinding, over `range` or the playback range
    pub fn with_animation_bake(mut self, range: Option<crate::types::FrameRange>) -> Self {
        self.config.bake_animation = true;
        self.config.bake_range = range;
        self
    }

    /// Keep the driving constraints after baking
    pub fn keep_constraints(mut self) -> Self {
        self.config.discard_constraints = false;
        self
    }

    /// Apply key/value overrides on top of the configuration when running
    pub fn with_property_store(mut self, store: PropertyStore) -> Self {
        self.properties = store;
        self
    }

    /// Set a progress handler for weight transfer and baking
    pub fn with_progress_handler(mut self, handler: Box<dyn ProgressHandler>) -> Self {
        self.progress_handler = Some(handler);
        self
    }

    /// The configuration as set so far, before property overrides
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export `mesh`, skinned to joints below `top_joint`
    pub fn run<S: SceneStore + ?Sized>(
        self,
        store: &mut S,
        mesh: &NodeId,
        top_joint: &NodeId,
    ) -> Result<ExportResult> {
        let mut config = self.config;
        config.apply_properties(&self.properties)?;
        config.validate()?;
        let mut progress = self
            .progress_handler
            .unwrap_or_else(|| Box::new(PrintProgressHandler::new()));

        let source_mesh = mesh::resolve(&*store, mesh)?;
        let old = SkinBinding::read(&*store, &source_mesh)?;
        let used: InfluenceSet = old.influences.iter().cloned().collect();

        let export_group = store.create_node(&NodeType::Transform, &config.export_group)?;
        let tree = InfluenceTreeBuilder::new(config.influence_suffix.as_str())
            .with_missing_warnings(config.warn_missing_influences)
            .build(store, top_joint, &used, Some(&export_group))?;

        let export_name = format!(
            "{}{}",
            store.name_of(source_mesh.container())?,
            config.mesh_suffix
        );
        let export_container = store.duplicate(
            source_mesh.container(),
            &export_name,
            DuplicateOptions::RENAME_CHILDREN,
        )?;
        store.reparent(&export_container, Some(&export_group))?;

        let new = skin::rebind(store, &export_container, tree.mapping())?;
        let options = TransferOptions {
            tie_tolerance: config.tie_tolerance,
        };
        let report =
            skin::transfer_weights(store, &old, &new, tree.mapping(), &options, progress.as_mut())?;

        let (old_influences, new_influences): (Vec<_>, Vec<_>) = old
            .influences
            .iter()
            .filter_map(|source| {
                tree.mapping()
                    .get(source.id())
                    .map(|copy| (source.clone(), copy.clone()))
            })
            .unzip();

        let bake = if config.bake_animation {
            let mut baker = AnimationBaker::bind(
                store,
                &old_influences,
                &new_influences,
                BakerOptions::from(&config),
            )?;
            Some(baker.bake(store, config.bake_range, progress.as_mut())?)
        } else {
            None
        };

        log::info!(
            "Exported {} with {} influences to {export_group}",
            source_mesh.container(),
            new_influences.len()
        );
        Ok(ExportResult {
            old_influences,
            new_influences,
            export_group,
            source_mesh,
            export_mesh: new.mesh,
            old_cluster: old.cluster,
            new_cluster: new.cluster,
            skeleton_root: tree.root().clone(),
            missing: tree.missing().to_vec(),
            report,
            bake,
        })
    }
}

/// Export a skinned mesh with the default configuration
///
/// Returns the exported source influences and their export copies, index for
/// index, ready for [`crate::animation::bake_animation`].
pub fn export_rig<S: SceneStore + ?Sized>(
    store: &mut S,
    mesh: &NodeId,
    top_joint: &NodeId,
) -> Result<(Vec<JointHandle>, Vec<JointHandle>)> {
    let result = ExportBuilder::new().run(store, mesh, top_joint)?;
    Ok((result.old_influences, result.new_influences))
}
