//! Query objects: filters plus projection, facet, sort and paging parameters.

use serde::{Deserialize, Serialize};

use crate::ast::{Limit, SortField};
use crate::query::filters::Filters;

/// Non-filter parts of a query: projections, facets, sort and paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// `select(*)`
    pub select_all: bool,
    /// Named projections, `select(a,b)`.
    pub custom_selects: Vec<String>,
    /// `facets(*)`
    pub facets: bool,
    /// Sort fields in priority order.
    pub sort: Vec<SortField>,
    /// Paging window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
}

impl QueryParams {
    /// True when no parameter is set.
    pub fn is_empty(&self) -> bool {
        !self.select_all
            && self.custom_selects.is_empty()
            && !self.facets
            && self.sort.is_empty()
            && self.limit.is_none()
    }

    /// Add a projection unless already present.
    pub fn add_select<S: AsRef<str>>(&mut self, field: S) {
        let field = field.as_ref();
        if !self.custom_selects.iter().any(|s| s == field) {
            self.custom_selects.push(field.to_string());
        }
    }

    pub(crate) fn merge(&mut self, other: &QueryParams) {
        self.select_all |= other.select_all;
        self.facets |= other.facets;
        for field in &other.custom_selects {
            self.add_select(field);
        }
        if !other.sort.is_empty() {
            self.sort = other.sort.clone();
        }
        if other.limit.is_some() {
            self.limit = other.limit;
        }
    }
}

/// Structured form of a PQL statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryObject {
    /// `category -> facet -> predicate`
    #[serde(default)]
    pub filters: Filters,
    /// Everything that is not a filter.
    #[serde(default)]
    pub params: QueryParams,
}

impl QueryObject {
    /// An empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// A query with filters and no parameters.
    pub fn with_filters(filters: Filters) -> Self {
        QueryObject {
            filters,
            params: QueryParams::default(),
        }
    }

    /// True when there are neither filters nor parameters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.params.is_empty()
    }

    /// Deep-merge `other` into this query. See [`Filters::merge`] and
    /// [`QueryParams`] for how conflicts resolve.
    pub fn merge(&mut self, other: &QueryObject) {
        self.filters.merge(&other.filters);
        self.params.merge(&other.params);
    }

    /// Merge queries left to right into a new query.
    pub fn merge_all<'a, I>(queries: I) -> QueryObject
    where
        I: IntoIterator<Item = &'a QueryObject>,
    {
        queries.into_iter().fold(QueryObject::new(), |mut acc, query| {
            acc.merge(query);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;

    #[test]
    fn test_params_merge() {
        let mut params = QueryParams {
            custom_selects: vec!["consequences".to_string()],
            sort: vec![SortField::asc("age")],
            limit: Some(Limit::size(10)),
            ..Default::default()
        };

        params.merge(&QueryParams {
            select_all: true,
            custom_selects: vec!["consequences".to_string(), "specimen".to_string()],
            ..Default::default()
        });

        assert!(params.select_all);
        assert!(!params.facets);
        assert_eq!(params.custom_selects, vec!["consequences", "specimen"]);
        assert_eq!(params.sort, vec![SortField::asc("age")]);
        assert_eq!(params.limit, Some(Limit::size(10)));

        params.merge(&QueryParams {
            sort: vec![SortField::desc("id")],
            limit: Some(Limit::new(20, 10)),
            ..Default::default()
        });
        assert_eq!(params.sort, vec![SortField::desc("id")]);
        assert_eq!(params.limit, Some(Limit::new(20, 10)));
    }

    #[test]
    fn test_empty() {
        let mut query = QueryObject::new();
        assert!(query.is_empty());

        query.params.facets = true;
        assert!(!query.is_empty());
    }

    #[test]
    fn test_merge_all() {
        let mut first = QueryObject::new();
        first.filters.add_terms("donor", "id", ["DO1"]).unwrap();
        first.params.facets = true;

        let mut second = QueryObject::new();
        second.filters.add_terms("donor", "id", ["DO2", "DO1"]).unwrap();
        second.params.limit = Some(Limit::size(5));

        let merged = QueryObject::merge_all([&first, &second]);

        assert_eq!(
            merged.filters.facet("donor", "id").unwrap().included().unwrap(),
            &[Value::from("DO1"), Value::from("DO2")]
        );
        assert!(merged.params.facets);
        assert_eq!(merged.params.limit, Some(Limit::size(5)));
        assert!(QueryObject::merge_all(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_json() {
        let json = r#"{"filters":{"donor":{"gender":{"is":["male"]}}},"params":{"facets":true}}"#;
        let query: QueryObject = serde_json::from_str(json).unwrap();

        assert!(query.params.facets);
        assert!(query.filters.facet("donor", "gender").is_some());
    }
}
