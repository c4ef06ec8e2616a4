use crate::intent::tokenize;
use crate::models::Language;

/// Script signatures tested in order; the first block present in the text wins.
const SCRIPT_SIGNATURES: &[(Language, &[(u32, u32)])] = &[
    (
        Language::Ar,
        &[
            (0x0600, 0x06FF),
            (0x0750, 0x077F),
            (0xFB50, 0xFDFF),
            (0xFE70, 0xFEFF),
        ],
    ),
    (Language::En, &[(0x0041, 0x005A), (0x0061, 0x007A)]),
];

/// Dialect markers, only consulted once the base language matched.
const DIALECT_SIGNATURES: &[(Language, Language, &[&str])] = &[
    (
        Language::Ar,
        Language::ArGulf,
        &[
            "وش", "ابغى", "أبغى", "ابغي", "شلون", "الحين", "وايد", "زين", "عساك", "يبيله",
        ],
    ),
    (
        Language::Ar,
        Language::ArEgypt,
        &[
            "عايز", "عايزة", "ازاي", "إزاي", "كده", "دلوقتي", "ايه", "إيه", "مش", "بتاع", "اوي",
            "أوي", "فين",
        ],
    ),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageDetector {
    default: Language,
}

impl LanguageDetector {
    pub fn new(default: Language) -> Self {
        Self { default }
    }

    pub fn detect(&self, text: &str) -> Language {
        detect_language(text).unwrap_or(self.default)
    }
}

/// Returns `None` when no script signature matches.
pub fn detect_language(text: &str) -> Option<Language> {
    let base = SCRIPT_SIGNATURES
        .iter()
        .find(|(_, ranges)| text.chars().any(|ch| in_ranges(ch, ranges)))
        .map(|(language, _)| *language)?;

    Some(refine_dialect(base, text))
}

fn refine_dialect(base: Language, text: &str) -> Language {
    let candidates = DIALECT_SIGNATURES
        .iter()
        .filter(|(parent, _, _)| *parent == base)
        .collect::<Vec<_>>();
    if candidates.is_empty() {
        return base;
    }

    let tokens = tokenize(text);
    candidates
        .into_iter()
        .find(|(_, _, markers)| {
            markers
                .iter()
                .any(|marker| tokens.iter().any(|token| token == marker))
        })
        .map(|(_, dialect, _)| *dialect)
        .unwrap_or(base)
}

fn in_ranges(ch: char, ranges: &[(u32, u32)]) -> bool {
    let code = ch as u32;
    ranges
        .iter()
        .any(|(start, end)| (*start..=*end).contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_arabic_script() {
        assert_eq!(detect_language("اتصل بجميع العملاء"), Some(Language::Ar));
    }

    #[test]
    fn arabic_wins_over_latin_in_mixed_text() {
        assert_eq!(detect_language("أريد نظام CRM"), Some(Language::Ar));
    }

    #[test]
    fn refines_gulf_and_egyptian_dialects() {
        assert_eq!(detect_language("ابغى موعد بكرة"), Some(Language::ArGulf));
        assert_eq!(detect_language("عايز اعرف السعر"), Some(Language::ArEgypt));
    }

    #[test]
    fn english_and_default() {
        let detector = LanguageDetector::new(Language::En);
        assert_eq!(detector.detect("I need a quote"), Language::En);
        assert_eq!(detector.detect("12345 !!"), Language::En);
        assert_eq!(detect_language("😀 123"), None);
    }
}
