//! Canonicalizes user-supplied text into something typeable on a standard
//! keyboard, and judges whether it is rich enough to practice on.

const MIN_LENGTH: usize = 10;
const MIN_WORDS: usize = 3;

/// Outcome of [`validate`]: every failing condition is reported, not just the
/// first one, so the caller can show the user a complete list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
    pub normalized_length: usize,
    pub word_count: usize,
    pub issues: Vec<String>,
}

/// Folds accented Latin letters, maps typographic punctuation to ASCII,
/// strips everything outside word chars / whitespace / `-` `'` `"` `.`, and
/// collapses whitespace runs. Pure and deterministic; empty in, empty out.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for c in raw.chars() {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => {
                out.push('a')
            }
            'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => out.push('e'),
            'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => out.push('i'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => out.push('o'),
            'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => out.push('u'),
            'ý' | 'ÿ' | 'Ý' => out.push('y'),
            'ç' | 'Ç' => out.push('c'),
            'ñ' | 'Ñ' => out.push('n'),
            'æ' | 'Æ' => out.push_str("ae"),
            'œ' | 'Œ' => out.push_str("oe"),
            'ð' | 'Ð' => out.push('d'),
            'þ' | 'Þ' => out.push_str("th"),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '-' | '\'' | '"' | '.' | '_' => out.push(c),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c if c.is_whitespace() => out.push(' '),
            // Anything else becomes a space and gets collapsed below
            _ => out.push(' '),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_word_char(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalizes `raw` and checks three independent suitability conditions:
/// minimum length, at least one word character, minimum word count.
pub fn validate(raw: &str) -> ValidationResult {
    let normalized = normalize(raw);
    let normalized_length = normalized.chars().count();
    let words = word_count(&normalized);

    let mut issues = Vec::new();

    if normalized_length < MIN_LENGTH {
        issues.push(format!(
            "Text too short ({}/{} characters)",
            normalized_length, MIN_LENGTH
        ));
    }

    if !has_word_char(&normalized) {
        issues.push("No valid word characters found".to_string());
    }

    if words < MIN_WORDS {
        issues.push(format!("Too few words ({} words)", words));
    }

    let is_valid = issues.is_empty();

    ValidationResult {
        is_valid,
        message: if is_valid {
            format!("Ready! {} chars, {} words", normalized_length, words)
        } else {
            "Text not suitable for typing test".to_string()
        },
        normalized_length,
        word_count: words,
        issues,
    }
}
