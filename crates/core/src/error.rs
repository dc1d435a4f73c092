#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid target '{0}': expected one of \"\", \"crawler\", \"api\"")]
    InvalidTarget(String),

    #[error("Unknown host group '{0}': expected one of web, uat, all, prd")]
    UnknownHostGroup(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
