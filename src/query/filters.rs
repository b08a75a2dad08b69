//! Facet filters: the `category -> facet -> predicate` part of a query.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ast::Value;
use crate::error::{PqlError, Result};
use crate::query::names::check_path;

/// A term list with its polarity.
#[derive(Debug, Clone, PartialEq)]
pub enum TermFilter {
    /// `is: [...]`, the facet must take one of these values.
    Include(Vec<Value>),
    /// `not: [...]`, the facet must take none of these values.
    Exclude(Vec<Value>),
}

impl TermFilter {
    /// The terms regardless of polarity.
    pub fn terms(&self) -> &[Value] {
        match self {
            TermFilter::Include(terms) | TermFilter::Exclude(terms) => terms,
        }
    }

    fn terms_mut(&mut self) -> &mut Vec<Value> {
        match self {
            TermFilter::Include(terms) | TermFilter::Exclude(terms) => terms,
        }
    }

    fn same_polarity(&self, other: &TermFilter) -> bool {
        matches!(
            (self, other),
            (TermFilter::Include(_), TermFilter::Include(_))
                | (TermFilter::Exclude(_), TermFilter::Exclude(_))
        )
    }
}

/// Predicate on a single facet.
///
/// The term list is either inclusive or exclusive, never both. The existence
/// and missing flags combine with it as alternatives (`or`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFacetFilter", into = "RawFacetFilter")]
pub struct FacetFilter {
    terms: Option<TermFilter>,
    exists: bool,
    missing: bool,
}

impl FacetFilter {
    /// `is: terms`
    pub fn include<I, V>(terms: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FacetFilter {
            terms: non_empty(terms).map(TermFilter::Include),
            ..Default::default()
        }
    }

    /// `not: terms`
    pub fn exclude<I, V>(terms: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FacetFilter {
            terms: non_empty(terms).map(TermFilter::Exclude),
            ..Default::default()
        }
    }

    /// Only an existence predicate.
    pub fn existing() -> Self {
        FacetFilter {
            exists: true,
            ..Default::default()
        }
    }

    /// Only a missing-value predicate.
    pub fn missing_value() -> Self {
        FacetFilter {
            missing: true,
            ..Default::default()
        }
    }

    /// The term list, if any.
    pub fn terms(&self) -> Option<&TermFilter> {
        self.terms.as_ref()
    }

    /// Included terms, if the term list is inclusive.
    pub fn included(&self) -> Option<&[Value]> {
        match &self.terms {
            Some(TermFilter::Include(terms)) => Some(terms),
            _ => None,
        }
    }

    /// Excluded terms, if the term list is exclusive.
    pub fn excluded(&self) -> Option<&[Value]> {
        match &self.terms {
            Some(TermFilter::Exclude(terms)) => Some(terms),
            _ => None,
        }
    }

    /// Whether an existence predicate is set.
    pub fn has_exists(&self) -> bool {
        self.exists
    }

    /// Whether a missing-value predicate is set.
    pub fn has_missing(&self) -> bool {
        self.missing
    }

    /// A facet filter with no predicate at all. Never stored in [`Filters`].
    pub fn is_empty(&self) -> bool {
        self.terms.is_none() && !self.exists && !self.missing
    }

    fn add(&mut self, incoming: TermFilter) {
        match &mut self.terms {
            Some(current) if current.same_polarity(&incoming) => {
                let list = current.terms_mut();
                for term in incoming.terms() {
                    if !list.contains(term) {
                        list.push(term.clone());
                    }
                }
            }
            // A polarity flip replaces the list.
            slot => *slot = Some(incoming),
        }
    }

    fn remove(&mut self, term: &Value) {
        if let Some(current) = &mut self.terms {
            current.terms_mut().retain(|t| t != term);
            if current.terms().is_empty() {
                self.terms = None;
            }
        }
    }

    pub(crate) fn merge(&mut self, other: &FacetFilter) {
        if let Some(incoming) = &other.terms {
            let conflict = self
                .terms
                .as_ref()
                .is_some_and(|current| !current.same_polarity(incoming));
            if conflict {
                log::debug!("Facet polarity conflict while merging; the later filter wins");
            }
            self.add(incoming.clone());
        }
        self.exists |= other.exists;
        self.missing |= other.missing;
    }
}

fn non_empty<I, V>(terms: I) -> Option<Vec<Value>>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let mut list: Vec<Value> = Vec::new();
    for term in terms.into_iter().map(Into::into) {
        if !term.is_blank() && !list.contains(&term) {
            list.push(term);
        }
    }
    (!list.is_empty()).then_some(list)
}

/// Like [`non_empty`], but fails on terms that have no PQL literal.
fn checked_terms<I, V>(terms: I) -> Result<Option<Vec<Value>>>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let terms = non_empty(terms);
    if let Some(term) = terms.iter().flatten().find(|term| !term.is_literal()) {
        return Err(PqlError::invalid_argument(format!(
            "term {term} cannot be written as PQL"
        )));
    }
    Ok(terms)
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Wire form of a facet filter: `{"is": [...]}` / `{"not": [...]}` plus
/// optional `"exists": true` and `"missing": true`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFacetFilter {
    #[serde(default, alias = "in", skip_serializing_if = "Option::is_none")]
    is: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "is_false")]
    exists: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    missing: bool,
}

impl TryFrom<RawFacetFilter> for FacetFilter {
    type Error = PqlError;

    fn try_from(raw: RawFacetFilter) -> Result<Self> {
        let is = raw.is.and_then(non_empty);
        let not = raw.not.and_then(non_empty);

        let terms = match (is, not) {
            (Some(_), Some(_)) => {
                return Err(PqlError::invalid_argument(
                    "a facet cannot have both 'is' and 'not' terms",
                ));
            }
            (Some(is), None) => Some(TermFilter::Include(is)),
            (None, Some(not)) => Some(TermFilter::Exclude(not)),
            (None, None) => None,
        };

        Ok(FacetFilter {
            terms,
            exists: raw.exists,
            missing: raw.missing,
        })
    }
}

impl From<FacetFilter> for RawFacetFilter {
    fn from(filter: FacetFilter) -> Self {
        let (is, not) = match filter.terms {
            Some(TermFilter::Include(terms)) => (Some(terms), None),
            Some(TermFilter::Exclude(terms)) => (None, Some(terms)),
            None => (None, None),
        };

        RawFacetFilter {
            is,
            not,
            exists: filter.exists,
            missing: filter.missing,
        }
    }
}

type FacetMap = IndexMap<String, FacetFilter>;

/// Ordered `category -> facet -> FacetFilter` mapping.
///
/// Categories and facets keep insertion order. Empty facets and empty
/// categories are removed as soon as they become empty. Equality ignores
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    categories: IndexMap<String, FacetMap>,
}

impl Filters {
    /// Create empty filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no category carries a predicate.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Category names in insertion order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Facets of a category in insertion order.
    pub fn facets(&self, category: &str) -> impl Iterator<Item = (&str, &FacetFilter)> {
        self.categories
            .get(category)
            .into_iter()
            .flat_map(|facets| facets.iter().map(|(name, filter)| (name.as_str(), filter)))
    }

    /// The filter on `category.facet`, if any.
    pub fn facet(&self, category: &str, facet: &str) -> Option<&FacetFilter> {
        self.categories.get(category)?.get(facet)
    }

    /// Append terms to the inclusive list of `category.facet`, replacing an
    /// exclusive list. Blank and duplicate terms are skipped.
    pub fn add_terms<I, V>(&mut self, category: &str, facet: &str, terms: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        check_path(category, facet)?;
        if let Some(terms) = checked_terms(terms)? {
            self.entry(category, facet).add(TermFilter::Include(terms));
        }
        Ok(())
    }

    /// Append terms to the exclusive list of `category.facet`, replacing an
    /// inclusive list.
    pub fn exclude_terms<I, V>(&mut self, category: &str, facet: &str, terms: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        check_path(category, facet)?;
        if let Some(terms) = checked_terms(terms)? {
            self.entry(category, facet).add(TermFilter::Exclude(terms));
        }
        Ok(())
    }

    /// Remove one term from whichever list holds it.
    pub fn remove_term(&mut self, category: &str, facet: &str, term: &Value) -> Result<()> {
        check_path(category, facet)?;
        self.update(category, facet, |filter| filter.remove(term));
        Ok(())
    }

    /// Remove the whole facet.
    pub fn remove_facet(&mut self, category: &str, facet: &str) -> Result<()> {
        check_path(category, facet)?;
        self.update(category, facet, |filter| *filter = FacetFilter::default());
        Ok(())
    }

    /// Replace the facet with `is: terms`, dropping any prior predicate.
    pub fn overwrite<I, V>(&mut self, category: &str, facet: &str, terms: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        check_path(category, facet)?;
        let terms = checked_terms(terms)?;

        self.remove_facet(category, facet)?;
        if let Some(terms) = terms {
            self.entry(category, facet).add(TermFilter::Include(terms));
        }
        Ok(())
    }

    /// Set the existence predicate.
    pub fn set_exists(&mut self, category: &str, facet: &str) -> Result<()> {
        check_path(category, facet)?;
        self.entry(category, facet).exists = true;
        Ok(())
    }

    /// Clear the existence predicate.
    pub fn clear_exists(&mut self, category: &str, facet: &str) -> Result<()> {
        check_path(category, facet)?;
        self.update(category, facet, |filter| filter.exists = false);
        Ok(())
    }

    /// Set the missing-value predicate.
    pub fn set_missing(&mut self, category: &str, facet: &str) -> Result<()> {
        check_path(category, facet)?;
        self.entry(category, facet).missing = true;
        Ok(())
    }

    /// Clear the missing-value predicate.
    pub fn clear_missing(&mut self, category: &str, facet: &str) -> Result<()> {
        check_path(category, facet)?;
        self.update(category, facet, |filter| filter.missing = false);
        Ok(())
    }

    /// Deep-merge `other` into these filters, category by category and facet
    /// by facet. On a polarity conflict the terms of `other` win.
    pub fn merge(&mut self, other: &Filters) {
        for (category, facets) in &other.categories {
            for (facet, filter) in facets {
                self.entry(category, facet).merge(filter);
            }
        }
    }

    /// Serialize to the JSON `filters` form used by the REST layer.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON `filters` form. Empty facets and categories are dropped.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn insert_facet(&mut self, category: &str, facet: &str, filter: FacetFilter) -> Result<()> {
        check_path(category, facet)?;
        if !filter.is_empty() {
            self.categories
                .entry(category.to_string())
                .or_default()
                .insert(facet.to_string(), filter);
        }
        Ok(())
    }

    fn entry(&mut self, category: &str, facet: &str) -> &mut FacetFilter {
        self.categories
            .entry(category.to_string())
            .or_default()
            .entry(facet.to_string())
            .or_default()
    }

    /// Apply `f` to an existing facet, then cascade-delete empties.
    fn update(&mut self, category: &str, facet: &str, f: impl FnOnce(&mut FacetFilter)) {
        let Some(facets) = self.categories.get_mut(category) else {
            return;
        };
        let Some(filter) = facets.get_mut(facet) else {
            return;
        };

        f(filter);

        if filter.is_empty() {
            facets.shift_remove(facet);
            if facets.is_empty() {
                self.categories.shift_remove(category);
            }
        }
    }
}

impl Serialize for Filters {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.categories.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = IndexMap::<String, FacetMap>::deserialize(deserializer)?;

        let mut filters = Filters::new();
        for (category, facets) in raw {
            for (facet, filter) in facets {
                filters
                    .insert_facet(&category, &facet, filter)
                    .map_err(D::Error::custom)?;
            }
        }
        Ok(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_terms_deduplicates() {
        let mut filters = Filters::new();
        filters.add_terms("donor", "gender", ["male", "female"]).unwrap();
        filters.add_terms("donor", "gender", ["female", "unknown"]).unwrap();

        let facet = filters.facet("donor", "gender").unwrap();
        assert_eq!(
            facet.included().unwrap(),
            &[Value::from("male"), Value::from("female"), Value::from("unknown")]
        );
    }

    #[test]
    fn test_blank_terms_are_ignored() {
        let mut filters = Filters::new();
        filters.add_terms("donor", "gender", [""]).unwrap();
        assert!(filters.is_empty());

        filters.add_terms::<_, &str>("donor", "gender", []).unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn test_non_finite_terms_fail() {
        let mut filters = Filters::new();
        filters.add_terms("donor", "age", [21.5]).unwrap();

        for term in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = filters.add_terms("donor", "age", [term]).unwrap_err();
            assert!(matches!(err, PqlError::InvalidArgument(_)));
            assert!(filters.exclude_terms("donor", "age", [term]).is_err());
            assert!(filters.overwrite("donor", "age", [1.0, term]).is_err());
        }

        // Failed edits leave the facet untouched.
        assert_eq!(
            filters.facet("donor", "age"),
            Some(&FacetFilter::include([21.5]))
        );
    }

    #[test]
    fn test_polarity_flip_replaces() {
        let mut filters = Filters::new();
        filters.add_terms("gene", "type", ["protein_coding", "lincRNA"]).unwrap();
        filters.exclude_terms("gene", "type", ["protein_coding"]).unwrap();

        let facet = filters.facet("gene", "type").unwrap();
        assert_eq!(facet.included(), None);
        assert_eq!(facet.excluded().unwrap(), &[Value::from("protein_coding")]);
    }

    #[test]
    fn test_remove_term_cascades() {
        let mut filters = Filters::new();
        filters.add_terms("donor", "id", ["DO1"]).unwrap();
        filters.remove_term("donor", "id", &"DO1".into()).unwrap();

        assert!(filters.is_empty());
    }

    #[test]
    fn test_remove_term_keeps_flags() {
        let mut filters = Filters::new();
        filters.add_terms("donor", "gender", ["male"]).unwrap();
        filters.set_missing("donor", "gender").unwrap();
        filters.remove_term("donor", "gender", &"male".into()).unwrap();

        let facet = filters.facet("donor", "gender").unwrap();
        assert!(facet.terms().is_none());
        assert!(facet.has_missing());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut filters = Filters::new();
        filters.add_terms("donor", "id", ["DO1"]).unwrap();
        filters.remove_term("donor", "id", &"DO2".into()).unwrap();
        filters.remove_facet("gene", "id").unwrap();
        filters.clear_exists("donor", "other").unwrap();

        assert_eq!(filters.facet("donor", "id"), Some(&FacetFilter::include(["DO1"])));
    }

    #[test]
    fn test_remove_facet_keeps_category() {
        let mut filters = Filters::new();
        filters.add_terms("donor", "id", ["DO1"]).unwrap();
        filters.add_terms("donor", "age", [22]).unwrap();
        filters.remove_facet("donor", "id").unwrap();

        assert_eq!(filters.categories().collect::<Vec<_>>(), vec!["donor"]);
        assert_eq!(filters.facets("donor").count(), 1);
    }

    #[test]
    fn test_overwrite_drops_flags_and_polarity() {
        let mut filters = Filters::new();
        filters.exclude_terms("donor", "gender", ["male"]).unwrap();
        filters.set_exists("donor", "gender").unwrap();
        filters.overwrite("donor", "gender", ["unknown"]).unwrap();

        assert_eq!(
            filters.facet("donor", "gender"),
            Some(&FacetFilter::include(["unknown"]))
        );
    }

    #[test]
    fn test_flags_cascade() {
        let mut filters = Filters::new();
        filters.set_exists("gene", "pathwayId").unwrap();
        filters.set_missing("gene", "pathwayId").unwrap();
        filters.clear_exists("gene", "pathwayId").unwrap();
        assert!(!filters.is_empty());

        filters.clear_missing("gene", "pathwayId").unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn test_missing_names_fail() {
        let mut filters = Filters::new();

        let err = filters.add_terms("", "gender", ["male"]).unwrap_err();
        assert!(matches!(err, PqlError::Precondition(p) if p == "category"));

        let err = filters.set_exists("donor", "").unwrap_err();
        assert!(matches!(err, PqlError::Precondition(p) if p == "facet"));
    }

    #[test]
    fn test_merge() {
        let mut left = Filters::new();
        left.add_terms("donor", "gender", ["male"]).unwrap();
        left.add_terms("gene", "type", ["lincRNA"]).unwrap();

        let mut right = Filters::new();
        right.add_terms("donor", "gender", ["female", "male"]).unwrap();
        right.exclude_terms("gene", "type", ["protein_coding"]).unwrap();
        right.set_exists("gene", "pathwayId").unwrap();

        left.merge(&right);

        assert_eq!(
            left.facet("donor", "gender").unwrap().included().unwrap(),
            &[Value::from("male"), Value::from("female")]
        );
        assert_eq!(
            left.facet("gene", "type"),
            Some(&FacetFilter::exclude(["protein_coding"]))
        );
        assert!(left.facet("gene", "pathwayId").unwrap().has_exists());
    }

    #[test]
    fn test_json_round_trip() {
        let mut filters = Filters::new();
        filters.add_terms("donor", "gender", ["male"]).unwrap();
        filters.exclude_terms("gene", "type", ["lincRNA"]).unwrap();
        filters.set_missing("donor", "gender").unwrap();

        let json = filters.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"donor":{"gender":{"is":["male"],"missing":true}},"gene":{"type":{"not":["lincRNA"]}}}"#
        );
        assert_eq!(Filters::from_json(&json).unwrap(), filters);
    }

    #[test]
    fn test_json_rejects_both_polarities() {
        let result = Filters::from_json(r#"{"donor":{"gender":{"is":["a"],"not":["b"]}}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_drops_empty_and_accepts_in_alias() {
        let filters =
            Filters::from_json(r#"{"donor":{"gender":{"is":[]},"age":{"in":[22]}},"gene":{}}"#)
                .unwrap();

        assert_eq!(filters.categories().collect::<Vec<_>>(), vec!["donor"]);
        assert_eq!(filters.facet("donor", "gender"), None);
        assert_eq!(
            filters.facet("donor", "age").unwrap().included().unwrap(),
            &[Value::Integer(22)]
        );
    }

    #[test]
    fn test_json_rejects_unwritable_names() {
        for json in [
            r#"{"donor.x":{"y":{"is":["a"]}}}"#,
            r#"{"donor":{"first name":{"is":["a"]}}}"#,
            r#"{"":{"id":{"is":["a"]}}}"#,
        ] {
            assert!(Filters::from_json(json).is_err(), "{json}");
        }

        let filters = Filters::from_json(r#"{"gene":{"ssm.id":{"is":["a"]}}}"#).unwrap();
        assert!(filters.facet("gene", "ssm.id").is_some());
    }
}
