use crate::types::DbId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Border must have at least 3 points, got {points}")]
    InvalidBorder { points: usize },

    #[error("Title must not be blank")]
    BlankTitle,
}
