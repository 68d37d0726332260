//! Inflection helpers for derived collection names.
//!
//! Edge-collection names are derived from edge type names: the name is
//! demodulized, pluralized, and snake_cased (`blog::Authorship` becomes
//! `authorships`). The rules cover what type names need, not a full
//! natural-language inflector.

/// Strips any leading module path from a type name.
///
/// `"blog::Authorship"` -> `"Authorship"`.
pub fn demodulize(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

/// Pluralizes the final word of a type name.
///
/// Covers the regular English rules: trailing consonant-`y` becomes `ies`,
/// sibilant endings take `es`, everything else takes `s`.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = word.chars().collect();
    let last = chars[chars.len() - 1];

    if last == 'y' || last == 'Y' {
        let preceded_by_vowel = chars
            .len()
            .checked_sub(2)
            .map(|i| is_vowel(chars[i]))
            .unwrap_or(false);
        if !preceded_by_vowel {
            let stem: String = chars[..chars.len() - 1].iter().collect();
            return format!("{stem}ies");
        }
    }

    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }

    format!("{word}s")
}

/// Converts a CamelCase type name to snake_case.
pub fn snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;

    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                result.push('_');
            }
            for lower in c.to_lowercase() {
                result.push(lower);
            }
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            result.push(c);
        }
    }

    result
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}
