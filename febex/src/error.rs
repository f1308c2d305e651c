//! Error handling for rig export operations

use thiserror::Error;

/// Result type alias for rig export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting a rig
///
/// Every variant is raised at the point of detection and propagated unchanged
/// to the caller. Scene mutations made before the failure are left in place.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The identifier does not name any node in the scene
    #[error("{id} does not exist in the scene")]
    NotFound { id: String },

    /// The node exists but has the wrong type for the requested operation
    #[error("{id} is of type '{found}', expected '{expected}'")]
    WrongType {
        id: String,
        expected: String,
        found: String,
    },

    /// A container node has no geometry child
    #[error("{id} doesn't have a shape node")]
    MissingShape { id: String },

    /// No skin cluster drives the mesh
    #[error("there are no skin clusters attached to {mesh}")]
    NoCluster { mesh: String },

    /// More than one skin cluster is directly connected to the mesh
    #[error("there are multiple skin clusters connected to {mesh}: {clusters:?}")]
    AmbiguousCluster { mesh: String, clusters: Vec<String> },

    /// An influence list contained nothing to bind
    #[error("influence list doesn't contain anything to bind")]
    EmptyInfluenceList,

    /// A non-joint node was passed as an influence
    #[error("{id} is in the influence list and it's not a joint")]
    NotAJoint { id: String },

    /// The top joint has no descendants and is not itself an influence
    #[error("{root} has no descendant joints and is not a used influence")]
    EmptyHierarchy { root: String },

    /// Old and new influence lists do not correspond one to one
    #[error("influence lists do not correspond: {message}")]
    MissingMapping { message: String },

    /// A node that should be a bindable mesh is not
    #[error("{id} isn't a mesh node, can't bind a skin to it")]
    InvalidMesh { id: String },

    /// Invalid parameters or configuration
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The user interrupted a long running operation
    #[error("{operation} was interrupted by the user")]
    Cancelled { operation: String },

    /// The host scene rejected an operation
    #[error("scene error: {message}")]
    Scene { message: String },
}

impl Error {
    /// Create a new not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a new wrong type error
    pub fn wrong_type<I, E, F>(id: I, expected: E, found: F) -> Self
    where
        I: Into<String>,
        E: Into<String>,
        F: Into<String>,
    {
        Self::WrongType {
            id: id.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a new missing shape error
    pub fn missing_shape<S: Into<String>>(id: S) -> Self {
        Self::MissingShape { id: id.into() }
    }

    /// Create a new no cluster error
    pub fn no_cluster<S: Into<String>>(mesh: S) -> Self {
        Self::NoCluster { mesh: mesh.into() }
    }

    /// Create a new ambiguous cluster error
    pub fn ambiguous_cluster<S: Into<String>>(mesh: S, clusters: Vec<String>) -> Self {
        Self::AmbiguousCluster {
            mesh: mesh.into(),
            clusters,
        }
    }

    /// Create a new not-a-joint error
    pub fn not_a_joint<S: Into<String>>(id: S) -> Self {
        Self::NotAJoint { id: id.into() }
    }

    /// Create a new empty hierarchy error
    pub fn empty_hierarchy<S: Into<String>>(root: S) -> Self {
        Self::EmptyHierarchy { root: root.into() }
    }

    /// Create a new missing mapping error
    pub fn missing_mapping<S: Into<String>>(message: S) -> Self {
        Self::MissingMapping {
            message: message.into(),
        }
    }

    /// Create a new invalid mesh error
    pub fn invalid_mesh<S: Into<String>>(id: S) -> Self {
        Self::InvalidMesh { id: id.into() }
    }

    /// Create a new invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a new host scene error
    pub fn scene<S: Into<String>>(message: S) -> Self {
        Self::Scene {
            message: message.into(),
        }
    }

    /// Whether this error came from a user interrupt rather than bad input
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = Error::not_found("pCube1");
        assert!(matches!(error, Error::NotFound { .. }));
        assert_eq!(error.to_string(), "pCube1 does not exist in the scene");
    }

    #[test]
    fn test_wrong_type_message() {
        let error = Error::wrong_type("locator1", "mesh", "locator");
        assert_eq!(
            error.to_string(),
            "locator1 is of type 'locator', expected 'mesh'"
        );
    }

    #[test]
    fn test_cancelled_flag() {
        assert!(Error::cancelled("weight transfer").is_cancelled());
        assert!(!Error::EmptyInfluenceList.is_cancelled());
    }
}
