//! Product code checksum validation
//!
//! EAN-8, UPC-12, EAN-13 and GTIN-14 share one mod-10 check digit:
//! walking the payload right-to-left, digits are weighted 3,1,3,1,...; the
//! check digit brings the weighted sum up to a multiple of ten.

/// Accepted code lengths (digits only)
pub const VALID_CODE_LENGTHS: [usize; 4] = [8, 12, 13, 14];

/// Lengths probed when hunting a code in OCR text, most common first
const SEARCH_ORDER: [usize; 4] = [13, 12, 14, 8];

/// True if `input` (non-digits stripped) is a well-formed code
pub fn is_valid_code(input: &str) -> bool {
    normalize_code(input).is_some()
}

/// Strip non-digits and return the code if length and check digit are valid
pub fn normalize_code(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if checksum_ok(&digits) {
        Some(digits)
    } else {
        None
    }
}

fn checksum_ok(digits: &str) -> bool {
    if !VALID_CODE_LENGTHS.contains(&digits.len()) {
        return false;
    }

    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    let Some((check, payload)) = values.split_last() else {
        return false;
    };

    *check == expected_check_digit(payload)
}

fn expected_check_digit(payload: &[u32]) -> u32 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - sum % 10) % 10
}

/// Find the first valid code among the digit runs of `text`
///
/// Runs are probed by length (13, 12, 14, then 8); within a length the
/// earliest run wins.
pub fn find_code_in_text(text: &str) -> Option<String> {
    let runs: Vec<&str> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect();

    SEARCH_ORDER.iter().find_map(|len| {
        runs.iter()
            .filter(|run| run.len() == *len)
            .find(|run| checksum_ok(run))
            .map(|run| run.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_codes_each_length() {
        assert!(is_valid_code("96385074")); // EAN-8
        assert!(is_valid_code("036000291452")); // UPC-12
        assert!(is_valid_code("7891000315507")); // EAN-13
        assert!(is_valid_code("10012345678902")); // GTIN-14
    }

    #[test]
    fn test_bad_check_digit_rejected() {
        assert!(!is_valid_code("7896006700139"));
        assert!(!is_valid_code("7891000315508"));
    }

    #[test]
    fn test_single_digit_change_rejected() {
        let code = "7891000315507";
        for i in 0..code.len() {
            let mut digits: Vec<u32> = code.chars().filter_map(|c| c.to_digit(10)).collect();
            digits[i] = (digits[i] + 1) % 10;
            let mutated: String = digits
                .iter()
                .filter_map(|d| char::from_digit(*d, 10))
                .collect();
            assert!(!is_valid_code(&mutated), "mutation at {} accepted", i);
        }
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        assert!(!is_valid_code(""));
        assert!(!is_valid_code("1234567"));
        assert!(!is_valid_code("123456789012345"));
        assert!(!is_valid_code("abcdefgh"));
    }

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(
            normalize_code("789-1000 315507"),
            Some("7891000315507".to_string())
        );
        assert_eq!(normalize_code(" 9638-5074 "), Some("96385074".to_string()));
        assert_eq!(normalize_code("7896006700139"), None);
    }

    #[test]
    fn test_find_code_in_text() {
        let text = "NESCAU 2.0 400g\nLote 123456 EAN 7891000315507 val 12/2026";
        assert_eq!(find_code_in_text(text), Some("7891000315507".to_string()));

        // 13-digit run with a bad check digit is skipped; the 8-digit one is used
        let text = "7896006700139 ref 96385074";
        assert_eq!(find_code_in_text(text), Some("96385074".to_string()));

        assert_eq!(find_code_in_text("no digits here"), None);
    }
}
