//! Edits on PQL text: terms, facets and existence predicates.
//!
//! Each operation parses the input, edits the query object and serializes
//! it again. A blank `category` or `facet` fails with
//! [`PqlError::Precondition`](crate::error::PqlError::Precondition).

use crate::ast::Value;
use crate::error::Result;
use crate::translation::PqlService;

impl PqlService {
    /// Include one term.
    pub fn add_term<V: Into<Value>>(
        &self,
        pql: &str,
        category: &str,
        facet: &str,
        term: V,
    ) -> Result<String> {
        self.add_terms(pql, category, facet, [term])
    }

    /// Include several terms, replacing an exclusion on the same facet.
    pub fn add_terms<I, V>(&self, pql: &str, category: &str, facet: &str, terms: I) -> Result<String>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.update(pql, |query| query.filters.add_terms(category, facet, terms))
    }

    /// Exclude one term.
    pub fn exclude_term<V: Into<Value>>(
        &self,
        pql: &str,
        category: &str,
        facet: &str,
        term: V,
    ) -> Result<String> {
        self.exclude_terms(pql, category, facet, [term])
    }

    /// Exclude several terms, replacing an inclusion on the same facet.
    pub fn exclude_terms<I, V>(
        &self,
        pql: &str,
        category: &str,
        facet: &str,
        terms: I,
    ) -> Result<String>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.update(pql, |query| query.filters.exclude_terms(category, facet, terms))
    }

    /// Remove a term from whichever list holds it.
    pub fn remove_term<V: Into<Value>>(
        &self,
        pql: &str,
        category: &str,
        facet: &str,
        term: V,
    ) -> Result<String> {
        let term = term.into();
        self.update(pql, |query| query.filters.remove_term(category, facet, &term))
    }

    /// Remove every predicate on a facet.
    pub fn remove_facet(&self, pql: &str, category: &str, facet: &str) -> Result<String> {
        self.update(pql, |query| query.filters.remove_facet(category, facet))
    }

    /// Replace the facet's predicate with a single included term.
    pub fn overwrite<V: Into<Value>>(
        &self,
        pql: &str,
        category: &str,
        facet: &str,
        term: V,
    ) -> Result<String> {
        self.overwrite_terms(pql, category, facet, [term])
    }

    /// Replace the facet's predicate with included terms.
    pub fn overwrite_terms<I, V>(
        &self,
        pql: &str,
        category: &str,
        facet: &str,
        terms: I,
    ) -> Result<String>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.update(pql, |query| query.filters.overwrite(category, facet, terms))
    }

    /// Require the facet to have a value.
    pub fn has(&self, pql: &str, category: &str, facet: &str) -> Result<String> {
        self.update(pql, |query| query.filters.set_exists(category, facet))
    }

    /// Drop the existence requirement.
    pub fn has_no(&self, pql: &str, category: &str, facet: &str) -> Result<String> {
        self.update(pql, |query| query.filters.clear_exists(category, facet))
    }

    /// Accept documents where the facet has no value.
    pub fn with_missing(&self, pql: &str, category: &str, facet: &str) -> Result<String> {
        self.update(pql, |query| query.filters.set_missing(category, facet))
    }

    /// Drop the missing-value predicate.
    pub fn without_missing(&self, pql: &str, category: &str, facet: &str) -> Result<String> {
        self.update(pql, |query| query.filters.clear_missing(category, facet))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PqlError;
    use crate::translation::PqlService;

    #[test]
    fn test_add_exclude_remove_scenario() {
        let service = PqlService::new();

        let pql = service.add_term("", "donor", "gender", "male").unwrap();
        assert_eq!(pql, r#"eq(donor.gender,"male")"#);

        let pql = service.exclude_term(&pql, "donor", "gender", "male").unwrap();
        assert_eq!(pql, r#"not(eq(donor.gender,"male"))"#);

        let pql = service.remove_term(&pql, "donor", "gender", "male").unwrap();
        assert_eq!(pql, "");
    }

    #[test]
    fn test_add_term_is_idempotent() {
        let service = PqlService::new();
        let once = service.add_term("", "donor", "id", "DO1").unwrap();
        let twice = service.add_term(&once, "donor", "id", "DO1").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_add_terms_keep_order() {
        let service = PqlService::new();
        let pql = service
            .add_terms("eq(donor.id,'DO1')", "donor", "id", ["DO3", "DO2", "DO1"])
            .unwrap();
        assert_eq!(pql, r#"in(donor.id,"DO1","DO3","DO2")"#);
    }

    #[test]
    fn test_empty_term_is_ignored() {
        let service = PqlService::new();
        assert_eq!(service.add_term("", "donor", "id", "").unwrap(), "");
    }

    #[test]
    fn test_remove_facet_keeps_others() {
        let service = PqlService::new();
        let pql = "and(eq(donor.id,'DO1'),eq(donor.gender,'male'))";
        assert_eq!(
            service.remove_facet(pql, "donor", "id").unwrap(),
            r#"eq(donor.gender,"male")"#
        );
    }

    #[test]
    fn test_overwrite() {
        let service = PqlService::new();
        let pql = "or(not(in(donor.gender,'male','female')),missing(donor.gender))";
        assert_eq!(
            service.overwrite(pql, "donor", "gender", "unknown").unwrap(),
            r#"eq(donor.gender,"unknown")"#
        );
        assert_eq!(
            service
                .overwrite_terms(pql, "donor", "gender", ["a", "b"])
                .unwrap(),
            r#"in(donor.gender,"a","b")"#
        );
    }

    #[test]
    fn test_existence_flags() {
        let service = PqlService::new();

        let pql = service.has("eq(gene.id,'G1')", "gene", "pathwayId").unwrap();
        assert_eq!(pql, r#"and(eq(gene.id,"G1"),exists(gene.pathwayId))"#);

        let pql = service.with_missing(&pql, "gene", "id").unwrap();
        assert_eq!(
            pql,
            r#"and(or(eq(gene.id,"G1"),missing(gene.id)),exists(gene.pathwayId))"#
        );

        let pql = service.has_no(&pql, "gene", "pathwayId").unwrap();
        let pql = service.without_missing(&pql, "gene", "id").unwrap();
        assert_eq!(pql, r#"eq(gene.id,"G1")"#);
    }

    #[test]
    fn test_numeric_terms() {
        let service = PqlService::new();
        let pql = service.add_terms("", "donor", "age", [22, 40]).unwrap();
        assert_eq!(pql, "in(donor.age,22,40)");
        assert_eq!(service.remove_term(&pql, "donor", "age", 22).unwrap(), "eq(donor.age,40)");
    }

    #[test]
    fn test_missing_parameters() {
        let service = PqlService::new();

        let err = service.add_term("", "", "gender", "male").unwrap_err();
        assert!(matches!(err, PqlError::Precondition(ref p) if p == "category"));

        let err = service.has("", "donor", " ").unwrap_err();
        assert!(matches!(err, PqlError::Precondition(ref p) if p == "facet"));
    }

    #[test]
    fn test_invalid_input_propagates() {
        let service = PqlService::new();
        let err = service.add_term("select(*),", "donor", "id", "DO1").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_unwritable_term_keeps_pql_parseable() {
        let service = PqlService::new();

        let pql = service.add_term("", "donor", "age", 22).unwrap();
        for term in [f64::NAN, f64::INFINITY] {
            let err = service.add_term(&pql, "donor", "age", term).unwrap_err();
            assert!(matches!(err, PqlError::InvalidArgument(_)));
        }

        let pql = service.add_term(&pql, "donor", "age", 23.5).unwrap();
        assert_eq!(pql, "in(donor.age,22,23.5)");
    }
}
