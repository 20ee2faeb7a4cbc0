//! Configuration-error taxonomy
//!
//! Configuration errors surface synchronously at component build time and
//! are fatal to that component instance only. Transient geometry gaps and
//! traversal boundaries are not errors and never appear here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("empty {attribute} attribute")]
    EmptyAttribute { attribute: &'static str },

    #[error("malformed {attribute} value {value:?}")]
    Malformed {
        attribute: &'static str,
        value: String,
    },

    #[error("ratio {value} out of range, expected 0.0..=1.0")]
    RatioOutOfRange { value: f32 },

    #[error("unknown length unit in {value:?}, expected px or vh")]
    UnknownUnit { value: String },

    #[error("unsupported trigger {value:?}, only \"visibility\" is supported")]
    UnsupportedTrigger { value: String },

    #[error("no scene element: the host element has no parent")]
    SceneNotFound,

    #[error("a component is already registered for this element")]
    DuplicateComponent,
}
