//! Free-text place name cleanup.

use std::sync::LazyLock;

use regex::Regex;

static DIRECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(North|South|East|West|Inner|Outer)?\s*(.*?)\s*(North|South|East|West|Inner|Outer)?$",
    )
    .expect("valid direction regex")
});

static LEGAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(The\s+)?(City|Shire|Town|Borough|District Council)\s+of\s+")
        .expect("valid prefix regex")
});

static LEGAL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(City Council|Regional Council|LGA|Council)$").expect("valid suffix regex")
});

pub const CENTRE: &str = "Centre";

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Uppercase the first letter of every run of letters, lowercase the rest
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Split a name into its base and a cardinal direction.
///
/// A leading direction wins over a trailing one; names without one are
/// `Centre`.
pub fn split_name(name: &str) -> (String, String) {
    let Some(caps) = DIRECTION.captures(name) else {
        return (name.to_string(), CENTRE.to_string());
    };
    let base = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    let direction = caps
        .get(1)
        .or_else(|| caps.get(3))
        .map(|m| capitalize(m.as_str()))
        .unwrap_or_else(|| CENTRE.to_string());
    (base.to_string(), direction)
}

/// Strip legal designations ("City of", "Shire Council", ...) and title-case
pub fn sanitize_legal_name(text: &str) -> String {
    let text = LEGAL_PREFIX.replace(text, "");
    let text = LEGAL_SUFFIX.replace(&text, "");
    title_case(text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(name: &str) -> (String, String) {
        split_name(name)
    }

    #[test]
    fn test_split_prefix_direction() {
        assert_eq!(split("North Sydney"), ("Sydney".into(), "North".into()));
    }

    #[test]
    fn test_split_suffix_direction() {
        assert_eq!(split("Melbourne East"), ("Melbourne".into(), "East".into()));
        assert_eq!(split("Adelaide inner"), ("Adelaide".into(), "Inner".into()));
    }

    #[test]
    fn test_split_no_direction() {
        assert_eq!(split("Sydney"), ("Sydney".into(), "Centre".into()));
    }

    #[test]
    fn test_split_prefix_wins() {
        assert_eq!(
            split("West Melbourne East"),
            ("Melbourne".into(), "West".into())
        );
    }

    #[test]
    fn test_split_lowercase_direction_capitalized() {
        assert_eq!(split("SOUTH Brisbane"), ("Brisbane".into(), "South".into()));
    }

    #[test]
    fn test_sanitize_prefixes() {
        assert_eq!(sanitize_legal_name("City of Sydney"), "Sydney");
        assert_eq!(sanitize_legal_name("The Shire of HORNSBY"), "Hornsby");
        assert_eq!(sanitize_legal_name("district council of grant"), "Grant");
    }

    #[test]
    fn test_sanitize_suffixes() {
        assert_eq!(sanitize_legal_name("Blacktown City Council"), "Blacktown");
        assert_eq!(sanitize_legal_name("Moreton Bay Regional Council"), "Moreton Bay");
        assert_eq!(sanitize_legal_name("  Parramatta LGA"), "Parramatta");
    }

    #[test]
    fn test_title_case_word_runs() {
        assert_eq!(title_case("o'connor"), "O'Connor");
        assert_eq!(title_case("mount-isa"), "Mount-Isa");
    }
}
