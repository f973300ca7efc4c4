//! Slug derivation for book page URLs.

/// Derive a URL-safe slug from a title.
///
/// Lowercases, collapses runs of non-alphanumeric characters into a single
/// hyphen and trims leading/trailing hyphens.
///
/// ```
/// use bookpitch::utils::slugify;
///
/// assert_eq!(slugify("The Lean Startup!"), "the-lean-startup");
/// assert_eq!(slugify("  --Foo_Bar--  "), "foo-bar");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Disambiguating suffix derived from a catalog key: the trailing
/// alphanumeric run, lowercased (`/works/OL45883W` -> `ol45883w`).
///
/// Falls back to the slugified key when the key has no trailing run.
pub fn key_suffix(key: &str) -> String {
    let trimmed = key.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    let run: String = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    if run.is_empty() {
        slugify(key)
    } else {
        run.to_lowercase()
    }
}
