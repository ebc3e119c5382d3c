use once_cell::sync::Lazy;
use regex::Regex;

/// Placed between the title and the description of a content to embed
pub const SIGNATURE_SEPARATOR: &str = " \n";

/// Trims the text and collapses every run of whitespace into a single space
pub fn collapse_whitespace(text: &str) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    RE.replace_all(text.trim(), " ").into_owned()
}

/// Builds the text embedded for a content.
///
/// The title alone when there is no (or a blank) description, otherwise the title and
/// the description joined with `SIGNATURE_SEPARATOR`.
pub fn build_signature(title: &str, description: Option<&str>) -> String {
    let title = collapse_whitespace(title);

    match description.map(collapse_whitespace) {
        Some(description) if !description.is_empty() => {
            format!("{}{}{}", title, SIGNATURE_SEPARATOR, description)
        }
        _ => title,
    }
}
