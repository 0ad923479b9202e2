use thiserror::Error;

/// Result type local to chunkflow-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("memory budget exceeded for tag '{tag}': requested {requested} bytes, capacity {capacity}, used {used}")]
    BudgetExceeded {
        tag: &'static str,
        requested: usize,
        capacity: usize,
        used: usize,
    },
}

impl From<Error> for chunkflow_core::Error {
    fn from(e: Error) -> Self {
        chunkflow_core::Error::ResourceExhausted(e.to_string())
    }
}
