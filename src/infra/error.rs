use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("template discovery failed: {message}")]
    TemplateDiscovery { message: String },
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn template_discovery(message: impl Into<String>) -> Self {
        Self::TemplateDiscovery {
            message: message.into(),
        }
    }
}
