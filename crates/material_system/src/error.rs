//! Material loading errors
//!
//! These never cross the [`MaterialManager`](crate::MaterialManager) boundary:
//! the public lookup API returns `Option` and reports failures through `log`.
//! Internally every load step returns [`MaterialResult`] so the reason can be
//! logged in one place.

use thiserror::Error;

use crate::shader::ShaderError;

/// Material loading errors
#[derive(Error, Debug)]
pub enum MaterialError {
    /// No descriptor and no cached entry for the name
    #[error("Material not found: {0}")]
    NotFound(String),

    /// Asset is queued or compiling; a placeholder is used meanwhile
    #[error("Material asset not available yet: {0}")]
    Unavailable(String),

    /// Descriptor could not be parsed
    #[error("Corrupt material descriptor: {0}")]
    Corrupt(String),

    /// Shader could not be bound; the material is kept without render capability
    #[error("Failed to bind shader \"{shader}\" in material \"{material}\": {source}")]
    ShaderBind {
        /// Shader name from the descriptor
        shader: String,
        /// Material being built
        material: String,
        /// Underlying shader service error
        #[source]
        source: ShaderError,
    },

    /// A single attribute failed to parse and was skipped
    #[error("Failed to parse parameter \"{name}\" = \"{value}\"")]
    ParameterParse {
        /// Attribute name
        name: String,
        /// Raw attribute value
        value: String,
    },

    /// A sub-material reference points back into a material that is still being built
    #[error("Material \"{0}\" references itself through its sub-materials")]
    Cycle(String),

    /// IO error while reading material data
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaterialError {
    /// Whether the condition is transient and a later reload may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result alias for material loading steps
pub type MaterialResult<T> = Result<T, MaterialError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MaterialError::Unavailable("a".into()).is_transient());
        assert!(!MaterialError::NotFound("a".into()).is_transient());
        assert!(!MaterialError::Corrupt("a".into()).is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = MaterialError::ParameterParse {
            name: "Diffuse".into(),
            value: "x,y".into(),
        };
        assert_eq!(err.to_string(), "Failed to parse parameter \"Diffuse\" = \"x,y\"");

        let err = MaterialError::ShaderBind {
            shader: "Illum".into(),
            material: "rock".into(),
            source: ShaderError::NotFound("Illum".into()),
        };
        assert!(err.to_string().contains("rock"));
    }
}
