use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Collaborator error ({component}): {message}")]
    Collaborator { component: String, message: String },

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl HealthError {
    pub fn collaborator(component: impl Into<String>, message: impl Into<String>) -> Self {
        HealthError::Collaborator {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type HealthResult<T> = Result<T, HealthError>;
