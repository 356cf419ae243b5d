use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Accept an id sent either as a JSON number or as a numeric string.
pub fn flexible_id<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(i32),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(n) => Ok(n),
        Id::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid id '{s}'"))),
    }
}

/// Validate a trimmed display name (1-128 characters).
pub fn validate_name(name: &str, what: &str) -> Result<(), AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 128 {
        return Err(AppError::Validation(format!(
            "{what} must be 1-128 characters"
        )));
    }
    Ok(())
}

/// Validate a plot outline: at least 3 `[lat, lng]` vertices within WGS84 bounds.
pub fn validate_vertices(vertices: &[[f64; 2]]) -> Result<(), AppError> {
    if vertices.len() < 3 {
        return Err(AppError::Validation(
            "A plot needs at least 3 coordinates".into(),
        ));
    }
    for (i, &[lat, lng]) in vertices.iter().enumerate() {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::Validation(format!(
                "Coordinate {i} is out of range: latitude must be within ±90 and longitude within ±180"
            )));
        }
    }
    Ok(())
}
