//! Display names derived from identifiers and type paths.

/// Words stripped from the end of configuration type names.
const CONFIGURATION_SUFFIXES: &[&str] = &["Setting", "Conf", "Config", "Configuration"];

/// Split an identifier into capitalized words.
///
/// Handles `camelCase`, `PascalCase`, `snake_case`, `kebab-case` and
/// acronyms (`HTTPServer` becomes `HTTP Server`).
pub fn display_name(identifier: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for part in identifier.split(|c: char| c == '_' || c == '-' || c.is_whitespace()) {
        let chars: Vec<char> = part.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            if i > 0 && c.is_uppercase() {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
                {
                    words.push(std::mem::take(&mut current));
                }
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
        .into_iter()
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sentence-case form of an identifier: `PropertyRequired` becomes
/// `Property required`.
pub fn sentence_name(identifier: &str) -> String {
    let words = display_name(identifier);
    let mut out = String::with_capacity(words.len());
    for (i, word) in words.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
            let all_caps = word.len() > 1 && word.chars().all(|c| !c.is_lowercase());
            if all_caps {
                out.push_str(word);
            } else {
                out.push_str(&word.to_lowercase());
            }
        } else {
            out.push_str(word);
        }
    }
    out
}

/// Display name of a configuration type given its fully qualified path.
///
/// Trailing configuration suffixes are dropped (`RenamerSettings` becomes
/// `Renamer`). A type named exactly like a suffix takes the name of its
/// enclosing module instead (`renamer::Settings` becomes `Renamer`).
pub fn type_display_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let segments: Vec<&str> = base.split("::").filter(|s| !s.is_empty()).collect();
    let Some(short) = segments.last() else {
        return String::new();
    };
    let fallback = display_name(short);
    let mut name = fallback.clone();
    let mut offset = 0;
    'retry: loop {
        for suffix in CONFIGURATION_SUFFIXES {
            let plural = format!("{suffix}s");
            if name == *suffix || name == plural {
                offset += 1;
                let parent = segments
                    .len()
                    .checked_sub(1 + offset)
                    .and_then(|i| segments.get(i))
                    .map(|segment| display_name(segment))
                    .unwrap_or_default();
                if parent.is_empty() {
                    return fallback;
                }
                name = parent;
                continue 'retry;
            }
            for ending in [format!(" {suffix}"), format!(" {suffix}s")] {
                if ends_with_ignore_case(&name, &ending) {
                    name.truncate(name.len() - ending.len());
                }
            }
        }
        break;
    }
    name.trim().to_string()
}

/// The last path segment of a type name without generic arguments.
pub fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

fn ends_with_ignore_case(text: &str, ending: &str) -> bool {
    text.len() >= ending.len()
        && text.is_char_boundary(text.len() - ending.len())
        && text[text.len() - ending.len()..].eq_ignore_ascii_case(ending)
}
