//! Botanical name slugging
//!
//! Converts display names such as `Arbutus 'Marina'` into the file/URL-safe
//! form `arbutus-_marina_` and back. Only spaces and apostrophes are
//! rewritten; callers are expected to hand in names drawn from the
//! inventory's constrained character set.

/// Convert a display name to its slug form.
///
/// Lowercases, replaces spaces with hyphens and apostrophes with
/// underscores. `None` and `""` both yield an empty string.
///
/// ```
/// use canopy_common::slug::to_slug;
///
/// assert_eq!(to_slug("Arbutus 'Marina'"), "arbutus-_marina_");
/// assert_eq!(to_slug(None), "");
/// ```
pub fn to_slug<'a>(name: impl Into<Option<&'a str>>) -> String {
    match name.into() {
        Some(name) if !name.is_empty() => name
            .to_lowercase()
            .chars()
            .map(|c| match c {
                ' ' => '-',
                '\'' => '_',
                other => other,
            })
            .collect(),
        _ => String::new(),
    }
}

/// Best-effort inverse of [`to_slug`].
///
/// Lowercases, turns hyphens back into spaces and underscores into
/// apostrophes, then capitalizes the first letter. Case is lossy, so
/// `from_slug(to_slug(x))` only matches `x` for sentence-cased names.
///
/// ```
/// use canopy_common::slug::from_slug;
///
/// assert_eq!(from_slug("arbutus-_marina_"), "Arbutus 'marina'");
/// ```
pub fn from_slug<'a>(slug: impl Into<Option<&'a str>>) -> String {
    let Some(slug) = slug.into().filter(|s| !s.is_empty()) else {
        return String::new();
    };

    let unslugged: String = slug
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '-' => ' ',
            '_' => '\'',
            other => other,
        })
        .collect();

    let mut chars = unslugged.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
