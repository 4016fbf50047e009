use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{AppError, AppResult};
use crate::location::ResolvedDestination;

pub const SELECT_FROM_DROPDOWN: &str =
    "Please select a destination from the dropdown suggestions instead of typing it freely.";

// Two or three comma-space separated runs of letters; spaces allowed inside a run.
static CITY_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L} ]+(?:, [\p{L} ]+){1,2}$").expect("valid city pattern"));

pub fn validate(text: &str, precise: bool) -> bool {
    if precise {
        return true;
    }
    CITY_SHAPE.is_match(text)
}

/// Gate in front of the planning request.
pub fn resolve_destination(text: &str, precise: bool) -> AppResult<ResolvedDestination> {
    if !validate(text, precise) {
        return Err(AppError::Validation(SELECT_FROM_DROPDOWN.into()));
    }
    Ok(ResolvedDestination::new_unchecked(text.to_string(), precise))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_two_and_three_part_names() {
        assert!(validate("San Francisco, CA, USA", false));
        assert!(validate("Tokyo, Japan", false));
        assert!(validate("São Paulo, Brazil", false));
    }

    #[test]
    fn rejects_free_text() {
        assert!(!validate("San Francisco", false));
        assert!(!validate("", false));
        assert!(!validate("A, B, C, D", false));
        assert!(!validate("Paris,France", false));
        assert!(!validate("12.34, 56.78", false));
    }

    #[test]
    fn precise_locations_skip_the_shape_check() {
        assert!(validate("12.34, 56.78", true));
        assert!(validate("anything at all", true));
    }

    #[test]
    fn rejection_carries_corrective_message() {
        let err = resolve_destination("Berlin", false).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg == SELECT_FROM_DROPDOWN));

        let ok = resolve_destination("Berlin, Germany", false).unwrap();
        assert_eq!(ok.location(), "Berlin, Germany");
        assert!(!ok.is_precise());
    }
}
