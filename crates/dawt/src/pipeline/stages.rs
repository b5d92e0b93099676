//! Pure stage logic, kept free of I/O so it can be tested directly.

use crate::jobs::Segment;
use crate::language::Language;

/// Translations shorter than this (in characters, after trimming) carry no
/// useful information.
pub const MIN_ENHANCED_CHARS: usize = 2;

/// Keyword classification.
///
/// Only runs when the caller left the language at its default. Languages
/// are scanned in [`Language::ALL`] order and the first one with a keyword
/// contained in the text wins.
pub fn classify(declared: Language, full_text: &str) -> Language {
    if !declared.is_default() {
        return declared;
    }

    let haystack = full_text.to_lowercase();
    Language::ALL
        .iter()
        .find(|lang| {
            lang.keywords()
                .iter()
                .any(|keyword| haystack.contains(&keyword.to_lowercase()))
        })
        .copied()
        .unwrap_or(declared)
}

/// Whether `translated` is worth attaching as an overlay on `original`.
pub fn is_meaningful_enhancement(original: &str, translated: &str) -> bool {
    let translated = translated.trim();
    translated.chars().count() >= MIN_ENHANCED_CHARS && translated != original.trim()
}

/// Attaches translations positionally. Returns how many segments gained an
/// overlay.
pub fn apply_translations(segments: &mut [Segment], translations: &[String]) -> usize {
    let mut applied = 0;
    for (segment, translated) in segments.iter_mut().zip(translations) {
        if is_meaningful_enhancement(&segment.text, translated) {
            segment.enhanced_text = Some(translated.trim().to_string());
            applied += 1;
        } else {
            segment.enhanced_text = None;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_finds_pidgin_keyword() {
        assert_eq!(
            classify(Language::En, "Abeg make you come here"),
            Language::Pidgin
        );
    }

    #[test]
    fn test_classify_respects_declared_language() {
        assert_eq!(classify(Language::Yoruba, "abeg"), Language::Yoruba);
    }

    #[test]
    fn test_classify_no_match_keeps_default() {
        assert_eq!(classify(Language::En, "Good job, thanks."), Language::En);
        assert_eq!(classify(Language::En, ""), Language::En);
    }

    #[test]
    fn test_classify_first_in_list_order_wins() {
        // Contains both a twi ("medaase") and a hausa ("sannu") keyword.
        assert_eq!(classify(Language::En, "sannu medaase"), Language::Twi);
    }

    #[test]
    fn test_classify_non_latin_keywords() {
        assert_eq!(classify(Language::En, "ሰላም ጤና"), Language::Amharic);
    }

    #[test]
    fn test_meaningful_enhancement() {
        assert!(is_meaningful_enhancement("abeg come", "Please come"));
        assert!(!is_meaningful_enhancement("abeg come", "  abeg come "));
        assert!(!is_meaningful_enhancement("abeg", "a"));
        assert!(!is_meaningful_enhancement("abeg", "   "));
    }

    #[test]
    fn test_apply_translations() {
        let mut segments = vec![
            Segment::new(0.0, 1.0, "abeg come"),
            Segment::new(1.0, 2.0, "ok"),
        ];
        let applied = apply_translations(
            &mut segments,
            &["Please come".to_string(), "ok".to_string()],
        );
        assert_eq!(applied, 1);
        assert_eq!(segments[0].enhanced_text.as_deref(), Some("Please come"));
        assert!(segments[1].enhanced_text.is_none());
    }
}
