use std::collections::HashMap;

pub const ANNOTATION_PREFIX: &str = "ecrsync.io/";

/// Whether a repository that still holds images may be deleted.
pub const FORCE_DELETE_ANNOTATION: &str = "ecrsync.io/force-delete";

pub const DEFAULT_FORCE_DELETE: bool = false;

/// Read the force-delete flag from out-of-band annotations.
///
/// A missing or unparsable value falls back to [`DEFAULT_FORCE_DELETE`].
pub fn force_delete_from_annotations(annotations: &HashMap<String, String>) -> bool {
    annotations
        .get(FORCE_DELETE_ANNOTATION)
        .and_then(|v| parse_bool(v))
        .unwrap_or(DEFAULT_FORCE_DELETE)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
