//! Translation between PQL text and query objects.

use crate::ast::{Limit, SortField, Statement};
use crate::config::PqlConfig;
use crate::error::Result;
use crate::parser::PqlParser;
use crate::query::convert::{count_statement, filter_statement, from_statement, to_statement};
use crate::query::names::check_field;
use crate::query::{Filters, QueryObject};

/// Converts PQL to query objects and back, and applies edits to PQL text.
///
/// Every operation is a pure function of its inputs: parse, edit the query
/// object, serialize.
#[derive(Debug, Clone, Default)]
pub struct PqlService {
    config: PqlConfig,
    parser: PqlParser,
}

impl PqlService {
    /// Service with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Service with a custom configuration.
    pub fn with_config(config: PqlConfig) -> Self {
        PqlService {
            config,
            parser: PqlParser::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &PqlConfig {
        &self.config
    }

    /// Parse PQL. Failures are logged with the offending input, and error
    /// positions are byte offsets into `pql` as given.
    pub fn parse(&self, pql: &str) -> Result<Statement> {
        self.parser.parse(pql).inspect_err(|e| {
            log::error!("Failed to parse PQL {pql:?}: {e}");
        })
    }

    /// Parse PQL into a query object. Empty input yields an object with no
    /// filters, selecting everything only when the config asks for it.
    pub fn convert_pql_to_query_object(&self, pql: &str) -> Result<QueryObject> {
        if pql.trim().is_empty() {
            let mut query = QueryObject::new();
            query.params.select_all = self.config.select_all_by_default;
            return Ok(query);
        }
        let statement = self.parse(pql)?;
        Ok(from_statement(&statement, &self.config))
    }

    /// Serialize a query object to canonical PQL.
    pub fn convert_query_to_pql(&self, query: &QueryObject) -> String {
        to_statement(query, &self.config).to_string()
    }

    /// The filters of a PQL statement.
    pub fn get_filters(&self, pql: &str) -> Result<Filters> {
        Ok(self.convert_pql_to_query_object(pql)?.filters)
    }

    /// The sort fields of a PQL statement, empty when unsorted.
    pub fn get_sort(&self, pql: &str) -> Result<Vec<SortField>> {
        Ok(self.convert_pql_to_query_object(pql)?.params.sort)
    }

    /// Replace the sort clause. An empty list removes it.
    pub fn set_sort(&self, pql: &str, sort: &[SortField]) -> Result<String> {
        for entry in sort {
            check_field("field", &entry.field)?;
        }
        self.update(pql, |query| {
            query.params.sort = sort.to_vec();
            Ok(())
        })
    }

    /// The paging window of a PQL statement.
    pub fn get_limit(&self, pql: &str) -> Result<Option<Limit>> {
        Ok(self.convert_pql_to_query_object(pql)?.params.limit)
    }

    /// Replace the paging window.
    pub fn set_limit(&self, pql: &str, limit: Limit) -> Result<String> {
        self.update(pql, |query| {
            query.params.limit = Some(limit);
            Ok(())
        })
    }

    /// Remove the paging window.
    pub fn remove_limit(&self, pql: &str) -> Result<String> {
        self.update(pql, |query| {
            query.params.limit = None;
            Ok(())
        })
    }

    /// Request facet counts with `facets(*)`.
    pub fn includes_facets(&self, pql: &str) -> Result<String> {
        self.update(pql, |query| {
            query.params.facets = true;
            Ok(())
        })
    }

    /// Add projections. Only configured include fields are accepted; others
    /// (including `*`) are skipped.
    pub fn includes<I, S>(&self, pql: &str, fields: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.update(pql, |query| {
            include_fields(&self.config, query, fields);
            Ok(())
        })
    }

    /// Deep-merge query objects left to right.
    pub fn merge_queries(&self, queries: &[QueryObject]) -> QueryObject {
        QueryObject::merge_all(queries)
    }

    /// Merge PQL statements.
    ///
    /// Inputs are trimmed, empty and duplicate inputs dropped. No input
    /// yields `""`, a single input is returned as is. Any invalid input
    /// makes the whole merge yield `""`.
    pub fn merge_pqls<S: AsRef<str>>(&self, pqls: &[S]) -> String {
        let mut unique: Vec<&str> = Vec::new();
        for pql in pqls {
            let pql = pql.as_ref().trim();
            if !pql.is_empty() && !unique.contains(&pql) {
                unique.push(pql);
            }
        }

        let mut queries = Vec::with_capacity(unique.len());
        for pql in &unique {
            match self.convert_pql_to_query_object(pql) {
                Ok(query) => queries.push(query),
                Err(e) => {
                    log::warn!("Skipping merge, invalid PQL {pql:?}: {e}");
                    return String::new();
                }
            }
        }

        match unique.as_slice() {
            [] => String::new(),
            [single] => single.to_string(),
            _ => self.convert_query_to_pql(&self.merge_queries(&queries)),
        }
    }

    /// Only the filters of a statement, `""` when there are none.
    pub fn to_filter_only_statement(&self, pql: &str) -> Result<String> {
        let filters = self.get_filters(pql)?;
        Ok(filter_statement(&filters, &self.config).to_string())
    }

    /// `count()` over the filters of a statement, `""` when there are none.
    pub fn to_count_statement(&self, pql: &str) -> Result<String> {
        let filters = self.get_filters(pql)?;
        Ok(count_statement(&filters, &self.config).to_string())
    }

    /// Parse, edit, serialize.
    pub(crate) fn update<F>(&self, pql: &str, edit: F) -> Result<String>
    where
        F: FnOnce(&mut QueryObject) -> Result<()>,
    {
        let mut query = self.convert_pql_to_query_object(pql)?;
        edit(&mut query)?;
        Ok(self.convert_query_to_pql(&query))
    }
}

pub(crate) fn include_fields<I, S>(config: &PqlConfig, query: &mut QueryObject, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for field in fields {
        let field = field.as_ref();
        if config.is_include_field(field) {
            query.params.add_select(field);
        } else {
            log::debug!("Ignoring projection '{field}'");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;
    use crate::query::FacetFilter;

    #[test]
    fn test_empty_input() {
        let service = PqlService::new();

        assert!(service.convert_pql_to_query_object("").unwrap().is_empty());
        assert!(service.convert_pql_to_query_object("  \n ").unwrap().is_empty());
        assert_eq!(service.convert_query_to_pql(&QueryObject::new()), "");

        let service =
            PqlService::with_config(PqlConfig::default().with_select_all_by_default(true));
        let query = service.convert_pql_to_query_object("").unwrap();
        assert_eq!(service.convert_query_to_pql(&query), "select(*)");
    }

    #[test]
    fn test_invalid_input() {
        let service = PqlService::new();
        let err = service.convert_pql_to_query_object("eq(foo,)").unwrap_err();
        assert_eq!(err.position(), Some(7));

        let err = service.convert_pql_to_query_object("   eq(foo,)").unwrap_err();
        assert_eq!(err.position(), Some(10));
    }

    #[test]
    fn test_convert() {
        let service = PqlService::new();
        let query = service
            .convert_pql_to_query_object("select(*),facets(*),in(donor.gender,'male','female')")
            .unwrap();

        assert!(query.params.select_all);
        assert!(query.params.facets);
        assert_eq!(
            query.filters.facet("donor", "gender"),
            Some(&FacetFilter::include(["male", "female"]))
        );
        assert_eq!(
            service.convert_query_to_pql(&query),
            r#"select(*),facets(*),in(donor.gender,"male","female")"#
        );
    }

    #[test]
    fn test_sort_and_limit() {
        let service = PqlService::new();
        let pql = service
            .set_sort("eq(donor.id,'DO1')", &[SortField::desc("donor.age"), SortField::asc("id")])
            .unwrap();
        assert_eq!(pql, r#"eq(donor.id,"DO1"),sort(-donor.age,+id)"#);
        assert_eq!(service.get_sort(&pql).unwrap().len(), 2);

        let pql = service.set_limit(&pql, Limit::new(0, 10)).unwrap();
        assert_eq!(service.get_limit(&pql).unwrap(), Some(Limit::new(0, 10)));

        let pql = service.set_sort(&pql, &[]).unwrap();
        assert_eq!(pql, r#"eq(donor.id,"DO1"),limit(0,10)"#);

        let pql = service.remove_limit(&pql).unwrap();
        assert_eq!(pql, r#"eq(donor.id,"DO1")"#);

        assert!(service.set_sort("", &[SortField::asc("")]).is_err());
    }

    #[test]
    fn test_includes() {
        let service = PqlService::new();

        let pql = service.includes("", ["consequences", "*", "bogus"]).unwrap();
        assert_eq!(pql, "select(consequences)");

        let again = service.includes(&pql, ["consequences"]).unwrap();
        assert_eq!(again, pql);

        let pql = service.includes_facets(&pql).unwrap();
        assert_eq!(service.includes_facets(&pql).unwrap(), "select(consequences),facets(*)");
    }

    #[test]
    fn test_merge_pqls() {
        let service = PqlService::new();

        assert_eq!(service.merge_pqls::<&str>(&[]), "");
        assert_eq!(service.merge_pqls(&["", "  "]), "");
        assert_eq!(
            service.merge_pqls(&["eq(donor.id,'DO1')", " eq(donor.id,'DO1') "]),
            "eq(donor.id,'DO1')"
        );
        assert_eq!(service.merge_pqls(&["eq(donor.id,'DO1')", "eq(foo,)"]), "");
        assert_eq!(
            service.merge_pqls(&["eq(donor.id,'DO1')", "in(donor.id,'DO2','DO1'),facets(*)"]),
            r#"facets(*),in(donor.id,"DO1","DO2")"#
        );
    }

    #[test]
    fn test_merge_conflict_later_wins() {
        let service = PqlService::new();
        let merged = service.merge_pqls(&["eq(gene.type,'a')", "not(eq(gene.type,'b'))"]);
        assert_eq!(merged, r#"not(eq(gene.type,"b"))"#);
    }

    #[test]
    fn test_filter_only_and_count() {
        let service = PqlService::new();
        let pql = "select(*),facets(*),eq(donor.id,'DO1'),sort(+id),limit(10)";

        assert_eq!(
            service.to_filter_only_statement(pql).unwrap(),
            r#"eq(donor.id,"DO1")"#
        );
        assert_eq!(
            service.to_count_statement(pql).unwrap(),
            r#"count(),eq(donor.id,"DO1")"#
        );
        assert_eq!(service.to_count_statement("select(*)").unwrap(), "");
    }

    #[test]
    fn test_get_filters() {
        let service = PqlService::new();
        let filters = service.get_filters("eq(donor.age,22)").unwrap();
        assert_eq!(
            filters.facet("donor", "age").unwrap().included(),
            Some(&[Value::Integer(22)][..])
        );
    }
}
