//! # Rule Interface
//!
//! A [`Rule`] inspects a context and either stays silent or returns a
//! [`RuleHit`] with a confidence. A [`RuleSet`] holds rules in a fixed
//! order and picks the strongest hit; on equal confidence the rule that
//! comes first wins.
//!
//! Confidences are integer basis points (`10_000` is certainty) so that
//! summed signal weights land exactly on band edges.

use serde::{Deserialize, Serialize};

/// Confidence of a certain hit, in basis points.
pub const FULL_CONFIDENCE: u32 = 10_000;

/// Basis points as a fraction in `[0, 1]`.
pub fn confidence_fraction(basis_points: u32) -> f64 {
    f64::from(basis_points.min(FULL_CONFIDENCE)) / f64::from(FULL_CONFIDENCE)
}

/// A fraction in `[0, 1]` as basis points, rounded to the nearest point.
pub fn confidence_basis_points(fraction: f64) -> u32 {
    (fraction.clamp(0.0, 1.0) * f64::from(FULL_CONFIDENCE)).round() as u32
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A single heuristic over a context `C`.
pub trait Rule<C: ?Sized>: Send + Sync {
    /// Stable identifier, reported in [`RuleHit::rule_id`].
    fn id(&self) -> &'static str;

    /// Evaluate against `ctx`. `None` when the predicate does not hold.
    fn evaluate(&self, ctx: &C) -> Option<RuleHit>;
}

/// A positive rule result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    /// The rule that fired.
    pub rule_id: String,
    /// Confidence in basis points, at most [`FULL_CONFIDENCE`].
    pub confidence: u32,
    /// Human-readable reasons (matched phrases, counts).
    pub evidence: Vec<String>,
}

impl RuleHit {
    /// Build a hit, capping confidence at [`FULL_CONFIDENCE`].
    pub fn new(rule_id: &str, confidence: u32, evidence: Vec<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            confidence: confidence.min(FULL_CONFIDENCE),
            evidence,
        }
    }

    /// Confidence as a fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        confidence_fraction(self.confidence)
    }
}

// ---------------------------------------------------------------------------
// Weighted signals
// ---------------------------------------------------------------------------

/// One contribution to a rule's confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSignal {
    /// Signal name, used as evidence when it fires.
    pub name: &'static str,
    /// Basis points added when the signal fires.
    pub weight: u32,
    /// Whether the signal fired.
    pub fired: bool,
}

impl WeightedSignal {
    /// Shorthand constructor.
    pub fn new(name: &'static str, weight: u32, fired: bool) -> Self {
        Self {
            name,
            weight,
            fired,
        }
    }

    /// Sum of fired weights, capped at [`FULL_CONFIDENCE`].
    pub fn combine(signals: &[WeightedSignal]) -> u32 {
        signals
            .iter()
            .filter(|s| s.fired)
            .fold(0u32, |acc, s| acc.saturating_add(s.weight))
            .min(FULL_CONFIDENCE)
    }

    /// Names of the signals that fired.
    pub fn fired_names(signals: &[WeightedSignal]) -> Vec<String> {
        signals
            .iter()
            .filter(|s| s.fired)
            .map(|s| s.name.to_string())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// An ordered list of rules over the same context type.
pub struct RuleSet<C: ?Sized> {
    rules: Vec<Box<dyn Rule<C>>>,
}

impl<C: ?Sized> RuleSet<C> {
    /// An empty set.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; it is evaluated after every rule already present.
    pub fn push(&mut self, rule: impl Rule<C> + 'static) {
        self.rules.push(Box::new(rule));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, rule: impl Rule<C> + 'static) -> Self {
        self.push(rule);
        self
    }

    /// Rule identifiers in evaluation order.
    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every hit, in rule order.
    pub fn evaluate_all(&self, ctx: &C) -> Vec<RuleHit> {
        self.rules.iter().filter_map(|r| r.evaluate(ctx)).collect()
    }

    /// The highest-confidence hit; the earliest rule wins ties.
    pub fn strongest(&self, ctx: &C) -> Option<RuleHit> {
        let mut best: Option<RuleHit> = None;
        for hit in self.evaluate_all(ctx) {
            match &best {
                Some(b) if hit.confidence <= b.confidence => {}
                _ => best = Some(hit),
            }
        }
        best
    }
}

impl<C: ?Sized> Default for RuleSet<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> std::fmt::Debug for RuleSet<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rule_ids())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Keyword matching
// ---------------------------------------------------------------------------

/// Whole-word phrase matcher over normalized text.
///
/// Text and phrases are lowercased, every non-alphanumeric character
/// becomes a space, and runs of spaces collapse, so `"You OWE me!!"`
/// matches the phrase `"you owe me"` but `"yellow"` does not match `"yell"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatcher {
    phrases: Vec<String>,
}

impl KeywordMatcher {
    /// Build from raw phrases. Blank phrases are dropped.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// Phrases found in `text`, in matcher order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        let padded = format!(" {} ", normalize(text));
        self.phrases
            .iter()
            .filter(|p| padded.contains(&format!(" {p} ")))
            .cloned()
            .collect()
    }

    /// Number of configured phrases.
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// Whether there are no phrases.
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, u32);

    impl Rule<()> for Fixed {
        fn id(&self) -> &'static str {
            self.0
        }
        fn evaluate(&self, _: &()) -> Option<RuleHit> {
            Some(RuleHit::new(self.0, self.1, vec![]))
        }
    }

    struct Never;

    impl Rule<()> for Never {
        fn id(&self) -> &'static str {
            "never"
        }
        fn evaluate(&self, _: &()) -> Option<RuleHit> {
            None
        }
    }

    #[test]
    fn strongest_picks_highest_confidence() {
        let set = RuleSet::new()
            .with(Fixed("a", 5_000))
            .with(Fixed("b", 9_000))
            .with(Never);
        assert_eq!(set.strongest(&()).unwrap().rule_id, "b");
        assert_eq!(set.evaluate_all(&()).len(), 2);
    }

    #[test]
    fn ties_go_to_first_rule() {
        let set = RuleSet::new().with(Fixed("first", 7_000)).with(Fixed("second", 7_000));
        assert_eq!(set.strongest(&()).unwrap().rule_id, "first");
    }

    #[test]
    fn empty_set_has_no_hit() {
        let set: RuleSet<()> = RuleSet::new();
        assert!(set.strongest(&()).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn confidence_is_capped() {
        assert_eq!(RuleHit::new("x", 17_000, vec![]).confidence, FULL_CONFIDENCE);
        assert_eq!(RuleHit::new("x", 7_500, vec![]).fraction(), 0.75);
    }

    #[test]
    fn basis_point_conversions() {
        assert_eq!(confidence_basis_points(0.9), 9_000);
        assert_eq!(confidence_basis_points(0.7 + 0.2), 9_000);
        assert_eq!(confidence_basis_points(1.5), FULL_CONFIDENCE);
        assert_eq!(confidence_basis_points(-0.1), 0);
        assert_eq!(confidence_fraction(6_000), 0.6);
    }

    #[test]
    fn signals_combine_fired_weights() {
        let signals = [
            WeightedSignal::new("a", 7_000, true),
            WeightedSignal::new("b", 3_000, false),
            WeightedSignal::new("c", 2_000, true),
        ];
        assert_eq!(WeightedSignal::combine(&signals), 9_000);
        assert_eq!(WeightedSignal::fired_names(&signals), vec!["a", "c"]);

        let saturated = [
            WeightedSignal::new("a", 8_000, true),
            WeightedSignal::new("b", 5_000, true),
        ];
        assert_eq!(WeightedSignal::combine(&saturated), FULL_CONFIDENCE);
    }

    #[test]
    fn keyword_matcher_is_whole_word_and_case_insensitive() {
        let m = KeywordMatcher::new(["you owe me", "yell"]);
        assert_eq!(m.matches("Honestly, YOU   owe me!!"), vec!["you owe me"]);
        assert!(m.matches("a yellow flower").is_empty());
        assert_eq!(m.matches("don't yell."), vec!["yell"]);
    }

    #[test]
    fn normalize_collapses_punctuation() {
        assert_eq!(normalize("  Cash-App   me! "), "cash app me");
    }
}
