//! Slug rules.
//!
//! A slug is a URL-safe key: lowercase ASCII letters and digits in runs
//! separated by single hyphens.

use crate::error::{CoreError, CoreResult};

/// Maximum slug length in bytes.
pub const MAX_SLUG_LEN: usize = 96;

/// Checks that `slug` is well formed.
pub fn validate_slug(slug: &str) -> CoreResult<()> {
    if slug.is_empty() {
        return Err(CoreError::validation("slug must not be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(CoreError::validation(format!(
            "slug '{slug}' exceeds {MAX_SLUG_LEN} characters"
        )));
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(CoreError::validation(format!(
            "slug '{slug}' has a stray hyphen"
        )));
    }
    if let Some(c) = slug
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(CoreError::validation(format!(
            "slug '{slug}' contains invalid character {c:?}"
        )));
    }
    Ok(())
}

/// Derives a slug from a display name.
///
/// Letters are lowercased, common accented Latin letters are folded to
/// ASCII and everything else becomes a separator. The result may be
/// empty if `name` has no usable characters.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => Some('a'),
            'ç' => Some('c'),
            'è' | 'é' | 'ê' | 'ë' => Some('e'),
            'ì' | 'í' | 'î' | 'ï' => Some('i'),
            'ñ' => Some('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => Some('o'),
            'ù' | 'ú' | 'û' | 'ü' => Some('u'),
            'ý' | 'ÿ' => Some('y'),
            c if c.is_ascii_alphanumeric() => Some(c),
            _ => None,
        };

        match folded {
            Some(c) => {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                if slug.len() < MAX_SLUG_LEN {
                    slug.push(c);
                }
            }
            None => pending_hyphen = true,
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_slugs() {
        assert!(validate_slug("berghain").is_ok());
        assert!(validate_slug("dj-koze-2024").is_ok());
    }

    #[test]
    fn invalid_slugs() {
        assert!(validate_slug("").is_err());
        assert!(validate_slug("-leading").is_err());
        assert!(validate_slug("trailing-").is_err());
        assert!(validate_slug("double--hyphen").is_err());
        assert!(validate_slug("Upper").is_err());
        assert!(validate_slug("with space").is_err());
        assert!(validate_slug(&"a".repeat(MAX_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn slugify_names() {
        assert_eq!(slugify("Berghain / Panorama Bar"), "berghain-panorama-bar");
        assert_eq!(slugify("  Röyksopp  "), "royksopp");
        assert_eq!(slugify("Café del Mar!"), "cafe-del-mar");
        assert_eq!(slugify("!!!"), "");
    }

    proptest! {
        #[test]
        fn slugify_output_is_valid_or_empty(name in "\\PC{0,64}") {
            let slug = slugify(&name);
            prop_assert!(slug.is_empty() || validate_slug(&slug).is_ok());
        }
    }
}
