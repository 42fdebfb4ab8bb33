use super::Pattern;

/// Patterns sharing one anchor directory, kept in registration order
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    anchor: String,
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new(anchor: impl Into<String>) -> Self {
        Self {
            anchor: anchor.into(),
            patterns: Vec::new(),
        }
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Append a pattern. Its anchor must equal the set's anchor.
    pub fn push(&mut self, pattern: Pattern) {
        debug_assert_eq!(pattern.anchor(), self.anchor);
        self.patterns.push(pattern);
    }

    /// First registered pattern matching `path`, if any
    pub fn matches(&self, path: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.is_match(path))
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matches(path).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
