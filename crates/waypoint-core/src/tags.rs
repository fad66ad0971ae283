//! Tag sets attached to networks, nodes and connections, and the
//! required/excluded [`TagFilter`] searches apply to them.

use std::collections::BTreeSet;

/// An ordered set of string tags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Create an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag. Returns `true` if it was not present before.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    /// Remove a tag. Returns `true` if it was present.
    pub fn remove(&mut self, tag: &str) -> bool {
        self.0.remove(tag)
    }

    #[inline]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for TagSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

/// Required/excluded tag predicate.
///
/// A tag set passes the filter when every required tag is present and no
/// excluded tag is. The default filter accepts everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagFilter {
    pub required: Vec<String>,
    pub excluded: Vec<String>,
}

impl TagFilter {
    /// A filter that accepts every tag set.
    pub fn any() -> Self {
        Self::default()
    }

    /// Add a required tag.
    pub fn require(mut self, tag: impl Into<String>) -> Self {
        self.required.push(tag.into());
        self
    }

    /// Add an excluded tag.
    pub fn exclude(mut self, tag: impl Into<String>) -> Self {
        self.excluded.push(tag.into());
        self
    }

    /// Whether the filter constrains anything at all.
    pub fn is_unconstrained(&self) -> bool {
        self.required.is_empty() && self.excluded.is_empty()
    }

    /// Whether `tags` passes the filter.
    pub fn accepts(&self, tags: &TagSet) -> bool {
        self.required.iter().all(|t| tags.contains(t))
            && !self.excluded.iter().any(|t| tags.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_set_basics() {
        let mut tags = TagSet::new();
        assert!(tags.is_empty());
        assert!(tags.insert("road"));
        assert!(!tags.insert("road"));
        assert!(tags.insert("lit"));
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("road"));
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["lit", "road"]);
        assert!(tags.remove("road"));
        assert!(!tags.contains("road"));
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = TagFilter::any();
        assert!(filter.is_unconstrained());
        assert!(filter.accepts(&TagSet::new()));
        assert!(filter.accepts(&["water"].into_iter().collect()));
    }

    #[test]
    fn required_tags_must_all_be_present() {
        let filter = TagFilter::any().require("road").require("lit");
        assert!(filter.accepts(&["road", "lit", "paved"].into_iter().collect()));
        assert!(!filter.accepts(&["road"].into_iter().collect()));
        assert!(!filter.accepts(&TagSet::new()));
    }

    #[test]
    fn excluded_tags_reject() {
        let filter = TagFilter::any().require("road").exclude("water");
        assert!(filter.accepts(&["road"].into_iter().collect()));
        assert!(!filter.accepts(&["road", "water"].into_iter().collect()));
    }
}
