//! URL slugs for organizations and personalities

use hr_common::validation::SLUG_MAX;

/// Attempts made before giving up on a unique slug
pub const MAX_SLUG_ATTEMPTS: u32 = 50;

/// Lowercase ASCII alphanumerics separated by single hyphens
///
/// ```
/// use hr_server::slug::slugify;
///
/// assert_eq!(slugify("  Hello,  World! ", "org"), "hello-world");
/// assert_eq!(slugify("***", "org"), "org");
/// ```
pub fn slugify(text: &str, fallback: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > SLUG_MAX {
        slug.truncate(SLUG_MAX);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// Slug to try on the given 1-based attempt: `base`, `base-2`, `base-3`, ...
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}
