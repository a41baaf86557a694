//! Heuristic prescription classifier.
//!
//! This is a deliberately crude keyword heuristic: a handful of independent
//! regex rules combined with a short-circuiting OR. Any single match is
//! enough to call the text a prescription. Keeping the rules as data makes
//! it easy to add or remove one, and to test each in isolation.

use std::sync::LazyLock;

use regex::Regex;

/// A single positive signal that some text looks like a prescription.
pub struct Rule {
    /// A short name for this rule, used in logs.
    pub name: &'static str,
    /// The pattern to look for. Input is lowercased before matching, so
    /// patterns are written in lowercase.
    pattern: Regex,
}

impl Rule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("rule pattern should be valid"),
        }
    }

    /// Does this rule match the (already lowercased) text?
    fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Our fixed rule list. Order only affects which rule gets reported by
/// [`matching_rule`]; the boolean verdict is an OR over all of them.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // A standalone "Rx" token.
        Rule::new("rx-marker", r"\brx\b"),
        // "Dr. Sharma", with or without the space.
        Rule::new("physician-signature", r"dr\.\s?[a-z]{2,}"),
        // Dosage strengths like "500mg" or "10 ml".
        Rule::new("dosage-strength", r"\b\d{2,4}\s?(mg|ml)\b"),
        // Dosing instructions like "Take once daily".
        Rule::new("dosing-instruction", r"\btake\s?(once|twice|daily)?\b"),
        // Medicine forms.
        Rule::new("medicine-form", r"\btablet|capsule|syrup\b"),
    ]
});

/// Find the first rule matching `text`, if any. Matching is
/// case-insensitive.
pub fn matching_rule(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    RULES.iter().find(|rule| rule.matches(&text)).map(|rule| rule.name)
}

/// Does `text` contain at least one marker of a medical prescription?
///
/// Never fails: empty or nonsense input simply yields `false`.
pub fn is_prescription(text: &str) -> bool {
    matching_rule(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_token_matches() {
        assert!(is_prescription("Please see Rx below"));
        assert_eq!(matching_rule("rx 12345"), Some("rx-marker"));
        // "rx" must be a standalone token.
        assert!(!is_prescription("borax crystals"));
    }

    #[test]
    fn physician_signature_matches() {
        assert!(is_prescription("Dr. Sharma"));
        assert!(is_prescription("signed, dr.patel"));
        // Needs at least two letters after the period.
        assert!(!is_prescription("dr. a"));
    }

    #[test]
    fn dosage_strength_matches() {
        assert!(is_prescription("Amoxicillin 500mg"));
        assert!(is_prescription("take 10 doses of 250 ml"));
        // A single digit is not a dosage strength.
        assert!(!is_prescription("5mg"));
    }

    #[test]
    fn dosing_instruction_matches() {
        assert!(is_prescription("Take once daily"));
        assert!(is_prescription("take twice"));
        // "take" alone is enough for this rule, per the original heuristic.
        assert!(is_prescription("take with food"));
    }

    #[test]
    fn medicine_form_matches() {
        assert!(is_prescription("one tablet after meals"));
        assert!(is_prescription("COUGH SYRUP"));
        assert!(is_prescription("capsules"));
    }

    #[test]
    fn no_rule_matches_plain_text() {
        assert!(!is_prescription("hello world, nice weather"));
        assert!(!is_prescription(""));
        assert_eq!(matching_rule("hello world"), None);
    }

    #[test]
    fn classification_is_case_insensitive() {
        for text in ["RX 500MG", "Dr. Who prescribed a SYRUP", "TAKE TWICE"] {
            assert_eq!(is_prescription(text), is_prescription(&text.to_lowercase()));
            assert!(is_prescription(text));
        }
    }
}
