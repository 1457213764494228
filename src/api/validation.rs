use serde::Deserialize;

use super::ApiError;
use crate::domain::FieldErrors;

pub const TAG_NAME_MAX: usize = 75;
pub const CATEGORY_NAME_MAX: usize = 75;
pub const POST_TITLE_MAX: usize = 1024;
pub const COMMENT_MESSAGE_MAX: usize = 500;

pub fn validate_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::BadRequest(format!(
            "Invalid ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

/// Required, non-blank text no longer than `max` characters.
/// Returns the trimmed value when it passes.
pub fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let value = errors.require(field, value)?.trim();
    errors.max_length(field, value, max);
    Some(value.to_string())
}

/// Star values are bounded by the configured range.
pub fn validate_star(
    errors: &mut FieldErrors,
    value: Option<i32>,
    min: i32,
    max: i32,
) -> Option<i32> {
    let Some(star) = value else {
        errors.add("star", crate::domain::REQUIRED);
        return None;
    };

    if star < min {
        errors.add(
            "star",
            format!("Ensure this value is greater than or equal to {min}."),
        );
        return None;
    }
    if star > max {
        errors.add(
            "star",
            format!("Ensure this value is less than or equal to {max}."),
        );
        return None;
    }

    Some(star)
}

/// For `Option<Option<i32>>` fields: an explicit `null` becomes `Some(None)`,
/// an absent field stays `None` through `#[serde(default)]`.
pub fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i32>::deserialize(deserializer).map(Some)
}

/// Lowercase slug: alphanumerics kept, everything else collapsed to
/// single hyphens.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id(1).is_ok());
        assert!(validate_id(0).is_err());
        assert!(validate_id(-3).is_err());
    }

    #[test]
    fn test_required_text() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            required_text(&mut errors, "name", Some("  rust "), 10).as_deref(),
            Some("rust")
        );
        assert!(errors.is_empty());

        assert_eq!(required_text(&mut errors, "title", None, 10), None);
        required_text(&mut errors, "name", Some(&"x".repeat(11)), 10);
        assert!(errors.contains("title"));
        assert!(errors.contains("name"));
    }

    #[test]
    fn test_validate_star() {
        let mut errors = FieldErrors::new();
        assert_eq!(validate_star(&mut errors, Some(3), 1, 5), Some(3));
        assert!(errors.is_empty());

        assert_eq!(validate_star(&mut errors, Some(6), 1, 5), None);
        assert_eq!(
            errors.get("star").unwrap()[0],
            "Ensure this value is less than or equal to 5."
        );

        let mut errors = FieldErrors::new();
        assert_eq!(validate_star(&mut errors, Some(0), 1, 5), None);
        assert_eq!(
            errors.get("star").unwrap()[0],
            "Ensure this value is greater than or equal to 1."
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust  2024 edition "), "rust-2024-edition");
        assert_eq!(slugify("---"), "");
    }
}
