//! Build phase classification.

use buildwatch_core::{default_phase_rules, PhaseRule};

/// Maps log content to a phase label using an ordered rule list.
///
/// Rules are checked in list order and the first whose pattern occurs in the
/// line wins, so more specific patterns must come before general ones.
#[derive(Debug, Clone)]
pub struct PhaseClassifier {
    rules: Vec<PhaseRule>,
}

impl PhaseClassifier {
    /// Create a classifier over the given rules, kept in order.
    pub fn new(rules: Vec<PhaseRule>) -> Self {
        Self { rules }
    }

    /// Label of the first matching rule, or `None` when nothing matches.
    pub fn classify(&self, line: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| line.contains(rule.pattern.as_str()))
            .map(|rule| rule.label.as_str())
    }

    /// The rules in priority order.
    pub fn rules(&self) -> &[PhaseRule] {
        &self.rules
    }
}

impl Default for PhaseClassifier {
    fn default() -> Self {
        Self::new(default_phase_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_rule_checked_first() {
        let classifier = PhaseClassifier::new(vec![
            PhaseRule::new("v8/", "V8"),
            PhaseRule::new("v", "generic"),
        ]);
        assert_eq!(classifier.classify("CXX obj/v8/x.cc"), Some("V8"));
        assert_eq!(classifier.classify("CXX obj/base/vector.cc"), Some("generic"));
    }

    #[test]
    fn test_order_is_part_of_the_contract() {
        let classifier = PhaseClassifier::new(vec![
            PhaseRule::new("v", "generic"),
            PhaseRule::new("v8/", "V8"),
        ]);
        assert_eq!(classifier.classify("CXX obj/v8/x.cc"), Some("generic"));
    }

    #[test]
    fn test_no_match() {
        let classifier = PhaseClassifier::default();
        assert_eq!(classifier.classify("STAMP obj/base/base.stamp"), None);
    }

    #[test]
    fn test_default_rules() {
        let classifier = PhaseClassifier::default();
        assert_eq!(
            classifier.classify("CXX obj/third_party/blink/renderer/core/dom.o"),
            Some("Compiling Blink Renderer")
        );
        assert_eq!(
            classifier.classify("ACTION //services/network/public/mojom:mojom"),
            Some("Generating IPC Bindings")
        );
        assert_eq!(
            classifier.classify("LINK ./chrome"),
            Some("Linking Executables")
        );
    }

    #[test]
    fn test_v8_wins_over_later_rules() {
        let classifier = PhaseClassifier::default();
        // matches both "v8/" and "chrome/"
        assert_eq!(
            classifier.classify("CXX obj/v8/chrome/glue.o"),
            Some("Compiling V8 JS Engine")
        );
    }
}
