/// Errors from backend API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Cannot reach backend at {0}")]
    Connection(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Backend returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Session expired — log in again")]
    Unauthorized,
    #[error("Failed to decode backend response: {0}")]
    Decode(String),
    #[error("Failed to read upload file: {0}")]
    FileRead(#[from] std::io::Error),
}
