//! Export configuration
//!
//! [`ExportConfig`] holds every tunable of an export run as plain fields.
//! Front ends that keep settings as key/value pairs can fill a
//! [`PropertyStore`] using the keys in [`export_properties`] and apply it with
//! [`ExportConfig::apply_properties`].

use crate::{
    error::{Error, Result},
    types::{ConstraintKind, FrameRange, NodeType},
};

/// Property keys understood by [`ExportConfig::apply_properties`]
pub mod export_properties {
    /// Suffix appended to export joint names (string)
    pub const INFLUENCE_SUFFIX: &str = "FEBEX_INFLUENCE_SUFFIX";

    /// Suffix appended to the exported mesh name (string)
    pub const MESH_SUFFIX: &str = "FEBEX_MESH_SUFFIX";

    /// Name of the export container node (string)
    pub const EXPORT_GROUP: &str = "FEBEX_EXPORT_GROUP";

    /// Distance tolerance for weight transfer ties (float)
    pub const TIE_TOLERANCE: &str = "FEBEX_TIE_TOLERANCE";

    /// Sample step used when baking animation (float)
    pub const BAKE_STEP: &str = "FEBEX_BAKE_STEP";

    /// Delete constraints after baking (bool)
    pub const DISCARD_CONSTRAINTS: &str = "FEBEX_DISCARD_CONSTRAINTS";

    /// Warn about influences outside the exported hierarchy (bool)
    pub const WARN_MISSING_INFLUENCES: &str = "FEBEX_WARN_MISSING_INFLUENCES";

    /// Bake animation after rebinding, over the playback range (bool)
    pub const BAKE_ANIMATION: &str = "FEBEX_BAKE_ANIMATION";

    /// Constraint used for baking: `"orientConstraint"` or `"parentConstraint"` (string)
    pub const CONSTRAINT_KIND: &str = "FEBEX_CONSTRAINT_KIND";
}

/// A typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Integer value
    Integer(i32),
    /// Float value
    Float(f32),
    /// String value
    String(String),
    /// Boolean value
    Boolean(bool),
}

impl PropertyValue {
    fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f32),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            Self::Integer(v) => Some(*v != 0),
            _ => None,
        }
    }
}

/// Ordered key/value settings; later entries override earlier ones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyStore {
    properties: Vec<(String, PropertyValue)>,
}

impl PropertyStore {
    /// Create a new empty property store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an integer property
    pub fn set_int<S: Into<String>>(&mut self, name: S, value: i32) -> &mut Self {
        self.properties
            .push((name.into(), PropertyValue::Integer(value)));
        self
    }

    /// Set a float property
    pub fn set_float<S: Into<String>>(&mut self, name: S, value: f32) -> &mut Self {
        self.properties
            .push((name.into(), PropertyValue::Float(value)));
        self
    }

    /// Set a string property
    pub fn set_string<S: Into<String>, V: Into<String>>(&mut self, name: S, value: V) -> &mut Self {
        self.properties
            .push((name.into(), PropertyValue::String(value.into())));
        self
    }

    /// Set a boolean property
    pub fn set_bool<S: Into<String>>(&mut self, name: S, value: bool) -> &mut Self {
        self.properties
            .push((name.into(), PropertyValue::Boolean(value)));
        self
    }

    /// Most recent value for `name`
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// All properties in insertion order
    pub fn properties(&self) -> &[(String, PropertyValue)] {
        &self.properties
    }

    /// Remove all properties
    pub fn clear(&mut self) {
        self.properties.clear();
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }
}

impl From<Vec<(String, PropertyValue)>> for PropertyStore {
    fn from(properties: Vec<(String, PropertyValue)>) -> Self {
        Self { properties }
    }
}

/// Settings for an export run
///
/// Invariants checked by [`ExportConfig::validate`]: the suffixes and the
/// group name are non-empty, `tie_tolerance` is finite and non-negative,
/// `bake_step` is finite and positive.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Appended to source joint names to name their export copies
    pub influence_suffix: String,
    /// Appended to the source mesh container name to name the export mesh
    pub mesh_suffix: String,
    /// Name of the container the exported hierarchy is placed under
    pub export_group: String,
    /// Distance tolerance for weight transfer ties
    pub tie_tolerance: f32,
    /// Log a warning for each used influence outside the exported hierarchy
    pub warn_missing_influences: bool,
    /// Bake animation onto the export skeleton after rebinding
    pub bake_animation: bool,
    /// Frames to bake; the playback range when `None`
    pub bake_range: Option<FrameRange>,
    /// Frame step for baking
    pub bake_step: f64,
    /// Constraint used to drive export joints while baking
    pub constraint_kind: ConstraintKind,
    /// Delete the driving constraints once baked
    pub discard_constraints: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            influence_suffix: "_INF".to_string(),
            mesh_suffix: "_EXP".to_string(),
            export_group: "export_group".to_string(),
            tie_tolerance: 1e-4,
            warn_missing_influences: true,
            bake_animation: false,
            bake_range: None,
            bake_step: 1.0,
            constraint_kind: ConstraintKind::Orient,
            discard_constraints: true,
        }
    }
}

impl ExportConfig {
    /// Check the invariants listed on the type
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("influence_suffix", &self.influence_suffix),
            ("mesh_suffix", &self.mesh_suffix),
            ("export_group", &self.export_group),
        ] {
            if value.is_empty() {
                return Err(Error::invalid_parameter(format!("{field} must not be empty")));
            }
        }
        if !self.tie_tolerance.is_finite() || self.tie_tolerance < 0.0 {
            return Err(Error::invalid_parameter(format!(
                "tie_tolerance must be finite and non-negative, got {}",
                self.tie_tolerance
            )));
        }
        if let Some(range) = self.bake_range.filter(|r| !r.is_finite()) {
            return Err(Error::invalid_parameter(format!(
                "bake_range must be finite, got {}..{}",
                range.start, range.end
            )));
        }
        if !self.bake_step.is_finite() || self.bake_step <= 0.0 {
            return Err(Error::invalid_parameter(format!(
                "bake_step must be finite and positive, got {}",
                self.bake_step
            )));
        }
        Ok(())
    }

    /// Override fields from `properties`
    ///
    /// Unknown keys are ignored. A known key with a value of the wrong type
    /// is an [`Error::InvalidParameter`].
    pub fn apply_properties(&mut self, properties: &PropertyStore) -> Result<()> {
        use export_properties as keys;

        for (key, value) in properties.properties() {
            let mismatch =
                || Error::invalid_parameter(format!("{key} has an unexpected value {value:?}"));
            match key.as_str() {
                keys::INFLUENCE_SUFFIX => {
                    self.influence_suffix = value.as_string().ok_or_else(mismatch)?.to_string();
                }
                keys::MESH_SUFFIX => {
                    self.mesh_suffix = value.as_string().ok_or_else(mismatch)?.to_string();
                }
                keys::EXPORT_GROUP => {
                    self.export_group = value.as_string().ok_or_else(mismatch)?.to_string();
                }
                keys::TIE_TOLERANCE => {
                    self.tie_tolerance = value.as_f32().ok_or_else(mismatch)?;
                }
                keys::BAKE_STEP => {
                    self.bake_step = f64::from(value.as_f32().ok_or_else(mismatch)?);
                }
                keys::DISCARD_CONSTRAINTS => {
                    self.discard_constraints = value.as_bool().ok_or_else(mismatch)?;
                }
                keys::WARN_MISSING_INFLUENCES => {
                    self.warn_missing_influences = value.as_bool().ok_or_else(mismatch)?;
                }
                keys::BAKE_ANIMATION => {
                    self.bake_animation = value.as_bool().ok_or_else(mismatch)?;
                }
                keys::CONSTRAINT_KIND => {
                    self.constraint_kind = match NodeType::from_host_name(
                        value.as_string().ok_or_else(mismatch)?,
                    ) {
                        NodeType::Constraint(kind) => kind,
                        _ => return Err(mismatch()),
                    };
                }
                other => log::debug!("Ignoring unknown export property {other}"),
            }
        }
        Ok(())
    }
}
