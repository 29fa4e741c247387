//! Text cleanup shared by strategies and finalization

/// Title used when OCR text yields no usable words
pub const DEFAULT_PLACEHOLDER_TITLE: &str = "Unidentified Product";

/// Maximum words taken from OCR text for a placeholder title
const PLACEHOLDER_MAX_WORDS: usize = 4;

/// Minimum word length (chars) considered for a placeholder title
const PLACEHOLDER_MIN_WORD_LEN: usize = 4;

/// Phrases that mean "nothing known", whatever the source language
const PLACEHOLDER_PHRASES: &[&str] = &[
    "unidentified product",
    "unknown product",
    "unknown",
    "n/a",
    "null",
    "none",
    "produto não identificado",
    "produto nao identificado",
    "não identificado",
    "nao identificado",
    "desconhecido",
];

/// Collapse whitespace and title-case shouted words
///
/// `"NESCAU   cereal  MATINAL"` → `"Nescau cereal Matinal"`. Single-letter
/// words and mixed-case words are left alone.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let letters = word.chars().filter(|c| c.is_alphabetic()).count();
            let shouted = letters > 0 && !word.chars().any(|c| c.is_lowercase());
            if shouted && word.chars().count() > 1 {
                title_case_word(word)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_start = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if at_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_start = false;
        } else {
            out.push(c);
            at_start = true;
        }
    }
    out
}

/// True for blank strings and "nothing known" phrases
pub fn is_placeholder_phrase(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    normalized.is_empty() || PLACEHOLDER_PHRASES.contains(&normalized.as_str())
}

/// Build a placeholder title from OCR text
///
/// Takes up to four words of at least four characters; falls back to
/// [`DEFAULT_PLACEHOLDER_TITLE`]. Never returns an empty string.
pub fn placeholder_title(raw_text: &str) -> String {
    let words: Vec<String> = raw_text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() >= PLACEHOLDER_MIN_WORD_LEN)
        .filter(|w| w.chars().any(|c| c.is_alphabetic()))
        .take(PLACEHOLDER_MAX_WORDS)
        .map(|w| w.to_string())
        .collect();

    if words.is_empty() {
        DEFAULT_PLACEHOLDER_TITLE.to_string()
    } else {
        clean_text(&words.join(" "))
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  NESCAU   cereal\tMATINAL "), "Nescau cereal Matinal");
        assert_eq!(clean_text("COCA-COLA 2L"), "Coca-Cola 2L");
        assert_eq!(clean_text("a B iPhone"), "a B iPhone");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_placeholder_phrases() {
        assert!(is_placeholder_phrase("  "));
        assert!(is_placeholder_phrase("Produto Não Identificado"));
        assert!(is_placeholder_phrase("UNKNOWN"));
        assert!(!is_placeholder_phrase("Leite Integral"));
    }

    #[test]
    fn test_placeholder_title_from_ocr() {
        assert_eq!(
            placeholder_title("LEITE integral 1L caixa PARMALAT extra"),
            "Leite integral caixa Parmalat"
        );
        assert_eq!(placeholder_title("1L 500 ml"), DEFAULT_PLACEHOLDER_TITLE);
        assert_eq!(placeholder_title(""), DEFAULT_PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.345_6), 12.35);
        assert_eq!(round2(0.1), 0.1);
    }
}
