//! Identifier conventions: snake_case columns, pluralized table names.

/// Convert an identifier to snake_case.
///
/// Acronyms stay together: `HTTPRequest` becomes `http_request`.
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p == '_' => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert a snake_case identifier to camelCase.
pub fn camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize = false;
    for c in s.chars() {
        if c == '_' {
            capitalize = !result.is_empty();
        } else if capitalize {
            result.extend(c.to_uppercase());
            capitalize = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// English plural of a (snake_case) word. Only the last word of a compound changes.
pub fn pluralize(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}

/// Table name for a model type: optional prefix, snake_case type name, pluralized as a whole.
pub fn table_name(prefix: &str, type_name: &str) -> String {
    let base = snake_case(type_name);
    let compound = if prefix.is_empty() {
        base
    } else if prefix.ends_with('_') {
        format!("{prefix}{base}")
    } else {
        format!("{prefix}_{base}")
    };
    pluralize(&compound)
}
