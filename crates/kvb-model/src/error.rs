use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unsupported os type '{0}', set 'linux' or 'windows'")]
    UnsupportedOsType(String),

    #[error("unknown access mode: {0} (expected: ReadWriteOnce|ReadWriteMany)")]
    UnknownAccessMode(String),

    #[error("unknown volume mode: {0} (expected: Filesystem|Block)")]
    UnknownVolumeMode(String),

    #[error("unknown communicator type: {0} (expected: ssh|winrm|none)")]
    UnknownCommType(String),

    #[error("invalid quantity: {0:?}")]
    InvalidQuantity(String),

    #[error("invalid boot command at offset {offset}: {reason}")]
    InvalidBootCommand { offset: usize, reason: String },

    #[error("missing required option: {0}")]
    MissingField(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("{} configuration error(s): {}", .0.len(), join(.0))]
    Multiple(Vec<ModelError>),
}

fn join(errs: &[ModelError]) -> String {
    errs.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ModelResult<T> = Result<T, ModelError>;
