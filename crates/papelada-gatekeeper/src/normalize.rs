//! Value normalization
//!
//! Converted document text is inconsistent about diacritics ("Inscrição" vs
//! "Inscricao") and whitespace, so values are compared after folding both.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics: NFD decomposition, combining marks dropped
pub fn fold_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Readable form of a pattern, used for leakage detection
///
/// Escaped punctuation becomes the literal character, `\s` (with an
/// optional quantifier) becomes a space, and other escapes (`\d`, `\b`, ...)
/// become a separator that cannot be part of a value.
pub fn literal_view(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => {
                out.push(' ');
                if matches!(chars.peek(), Some('+' | '*' | '?')) {
                    chars.next();
                }
            }
            Some(escaped) if !escaped.is_alphanumeric() => out.push(escaped),
            Some(_) => out.push('\u{0}'),
            None => {}
        }
    }

    out
}

/// Normalizes values for comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    case_insensitive: bool,
}

impl Normalizer {
    /// Create a normalizer
    pub fn new(case_insensitive: bool) -> Self {
        Self { case_insensitive }
    }

    /// Trim, fold accents, collapse internal whitespace, optionally lowercase
    pub fn normalize(&self, value: &str) -> String {
        let folded = fold_accents(value.trim());
        let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.case_insensitive {
            collapsed.to_lowercase()
        } else {
            collapsed
        }
    }

    /// Whether two values are equal after normalization
    pub fn equivalent(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_accents() {
        assert_eq!(fold_accents("Inscrição"), "Inscricao");
        assert_eq!(fold_accents("SÃO PAULO"), "SAO PAULO");
        assert_eq!(fold_accents("plain"), "plain");
    }

    #[test]
    fn test_normalize_whitespace_and_accents() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize("  José   da\nSilva "), "Jose da Silva");
        assert!(normalizer.equivalent("São Paulo", "Sao Paulo"));
        assert!(!normalizer.equivalent("sao paulo", "Sao Paulo"));
    }

    #[test]
    fn test_case_insensitive() {
        let normalizer = Normalizer::new(true);
        assert!(normalizer.equivalent("sao paulo", "SÃO PAULO"));
    }

    #[test]
    fn test_literal_view() {
        assert_eq!(literal_view(r"Valor:\s*(10\.50)"), "Valor: (10.50)");
        assert_eq!(literal_view(r"JOAO\s+SILVA"), "JOAO SILVA");
        assert_eq!(literal_view(r"\d+"), "\u{0}+");
        assert_eq!(literal_view(r"trailing\"), "trailing");
    }
}
