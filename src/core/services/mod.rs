pub mod document_service;
pub mod project_service;

pub use document_service::{DocumentService, DocumentSummary};
pub use project_service::ProjectService;

use crate::{domain::ScheduleError, errors::CoreError};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    Invalid(String),
}

impl From<ScheduleError> for ServiceError {
    fn from(err: ScheduleError) -> Self {
        ServiceError::Core(CoreError::Misconfigured(err))
    }
}
