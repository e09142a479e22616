//! Save-time validation for lands, zones and notes.
//!
//! The editor accepts any intermediate shape; these checks run only when a
//! record is about to be persisted.

use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::CoreError;
use crate::model::{Land, Note, Point, Zone};

/// Minimum number of vertices in a persisted border.
pub const MIN_BORDER_POINTS: usize = 3;

/// Largest radius a note may cover, in meters.
pub const MAX_NOTE_RADIUS_M: f64 = 10_000.0;

#[derive(Debug, Validate)]
struct ShapeInput {
    #[validate(length(min = 3))]
    border: Vec<Point>,
    #[validate(custom(function = "not_blank"))]
    title: String,
}

#[derive(Debug, Validate)]
struct NoteInput {
    #[validate(custom(function = "not_blank"))]
    title: String,
    #[validate(range(exclusive_min = 0.0, max = 10_000.0))]
    radius: f64,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Map validator output onto the domain errors. Border problems are
/// reported before title problems.
fn to_core_error(errors: ValidationErrors, border_points: usize) -> CoreError {
    let fields = errors.field_errors();
    if fields.contains_key("border") {
        CoreError::InvalidBorder {
            points: border_points,
        }
    } else if fields.contains_key("title") {
        CoreError::BlankTitle
    } else {
        CoreError::Validation(errors.to_string())
    }
}

fn validate_shape(border: &[Point], title: &str) -> Result<(), CoreError> {
    ShapeInput {
        border: border.to_vec(),
        title: title.to_string(),
    }
    .validate()
    .map_err(|e| to_core_error(e, border.len()))
}

/// Check that a land can be persisted.
pub fn validate_land(land: &Land) -> Result<(), CoreError> {
    validate_shape(&land.border, &land.title)
}

/// Check that a zone can be persisted.
pub fn validate_zone(zone: &Zone) -> Result<(), CoreError> {
    validate_shape(&zone.border, &zone.title)
}

/// Check that a note can be persisted.
pub fn validate_note(note: &Note) -> Result<(), CoreError> {
    NoteInput {
        title: note.title.clone(),
        radius: note.radius,
    }
    .validate()
    .map_err(|e| {
        if e.field_errors().contains_key("title") {
            CoreError::BlankTitle
        } else {
            CoreError::Validation(format!(
                "note radius must be in (0, {MAX_NOTE_RADIUS_M}] meters, got {}",
                note.radius
            ))
        }
    })
}
