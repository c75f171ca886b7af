//! Media-type gating for upstream responses (spec §4.1 "Content-type
//! gate").

use mime::Mime;

/// Checks whether `content_type` (a raw `Content-Type` header value,
/// possibly with parameters and possibly multi-valued via commas) is
/// allowed by `allowed`. An empty `allowed` list allows everything. An
/// empty `content_type` is treated as `text/html`.
pub fn is_allowed(content_type: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let content_type = if content_type.trim().is_empty() {
        "text/html"
    } else {
        content_type
    };

    content_type
        .split(',')
        .filter_map(|part| part.trim().to_ascii_lowercase().parse::<Mime>().ok())
        .any(|mime| allowed.iter().any(|pattern| matches_pattern(&mime, pattern)))
}

fn matches_pattern(mime: &Mime, pattern: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    if let Some(ty) = pattern.strip_suffix("/*") {
        mime.type_().as_str() == ty
    } else {
        match pattern.parse::<Mime>() {
            Ok(wanted) => mime.type_() == wanted.type_() && mime.subtype() == wanted.subtype(),
            Err(_) => false,
        }
    }
}
