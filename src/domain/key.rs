//! Translation key derivation.
//!
//! Editors name containers and items with free text ("Jeroen Stemerdink!");
//! the serialized document and every lookup use the derived key
//! (`jeroenstemerdink`).

/// Lowercase `original` and drop every character outside `[A-Za-z0-9]`.
pub fn derive_key(original: &str) -> String {
    original
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Whether `key` can be written as an XML element name.
///
/// Derived keys are ASCII alphanumerics only, so the remaining failure modes
/// are an empty key and a leading digit.
pub fn is_element_name(key: &str) -> bool {
    key.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// Normalise a caller supplied lookup key into the table's path form.
///
/// Accepts `/common/hello`, `common/hello` and `common.hello`; segments are
/// lowercased and empty segments dropped.
pub fn normalize_lookup_key(key: &str) -> String {
    key.split(['/', '.'])
        .filter(|segment| !segment.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("/")
}
