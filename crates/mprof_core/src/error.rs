use thiserror::Error;

/// Errors surfaced by the profiler itself.
///
/// Failures of profiled methods are never converted into this type; they
/// reach the caller exactly as the unwrapped method would produce them.
#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("cannot wrap methods of `{owner}`: its method table is sealed")]
    Sealed { owner: &'static str },

    #[error("cannot wrap methods of `{owner}`: another registry already profiles it")]
    AlreadyOwned { owner: &'static str },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProfilerError>;
