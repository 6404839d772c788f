//! Validation helpers for DTOs.

use validator::ValidationError;

/// Hard cap on stored event-type tags; longer tags are truncated at this
/// many characters before persistence.
pub const MAX_EVENT_TYPE_CHARS: usize = 64;

/// Validates that a mid-run event type is non-empty and printable.
///
/// Length is not an error: overlong tags are truncated downstream rather
/// than rejected, so replays from older clients keep working.
pub fn validate_event_type(event_type: &str) -> Result<(), ValidationError> {
    if event_type.trim().is_empty() {
        let mut err = ValidationError::new("event_type_empty");
        err.message = Some("event type must not be empty".into());
        return Err(err);
    }

    if event_type.chars().any(char::is_control) {
        let mut err = ValidationError::new("event_type_control_chars");
        err.message = Some("event type must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Truncate an event type to [`MAX_EVENT_TYPE_CHARS`], respecting char boundaries.
pub fn bound_event_type(event_type: &str) -> String {
    event_type.chars().take(MAX_EVENT_TYPE_CHARS).collect()
}
