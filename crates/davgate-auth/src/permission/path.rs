//! Lexical path normalization shared by the evaluator and the facade.

/// Normalize a slash-separated request path.
///
/// Collapses repeated slashes, drops `.` segments and resolves `..`
/// against the segments before it, clamping at the root. The result always
/// starts with `/` and never ends with one (except for the root itself).
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}
