//! Binding of PQL to the "current query" of a host, usually a URL.
//!
//! [`PqlUtil`] reads PQL from a [`PqlSource`], applies one edit from
//! [`PqlService`] and writes the result back. The last writer wins.

use std::fmt;

use indexmap::IndexMap;
use url::form_urlencoded;

use crate::ast::{Limit, SortField, Value};
use crate::builder::PqlBuilder;
use crate::config::PqlConfig;
use crate::error::Result;
use crate::query::names::check_field;
use crate::query::{Filters, QueryObject};
use crate::translation::PqlService;

/// Where the current PQL lives.
pub trait PqlSource {
    /// The current PQL, empty when unset.
    fn get_pql(&self) -> String;

    /// Replace the current PQL. An empty string clears it.
    fn set_pql(&mut self, pql: &str);
}

/// A decoded `a=b&c=d` query string with insertion-ordered parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    params: IndexMap<String, String>,
}

impl QueryString {
    /// Parse a query string such as `location.search`. A leading `?` is
    /// ignored; repeated keys keep the last value.
    pub fn parse(search: &str) -> Self {
        let search = search.strip_prefix('?').unwrap_or(search);
        let params = form_urlencoded::parse(search.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        QueryString { params }
    }

    /// The decoded value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Set a parameter. An empty value removes it.
    pub fn set(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.params.shift_remove(name);
        } else {
            self.params.insert(name.to_string(), value.to_string());
        }
    }

    /// Returns true when no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish();
        f.write_str(&encoded)
    }
}

/// In-memory source backed by a query string.
#[derive(Debug, Clone)]
pub struct MemorySource {
    parameter_name: String,
    query: QueryString,
}

impl MemorySource {
    /// Empty source reading the configured parameter.
    pub fn new(config: &PqlConfig) -> Self {
        Self::from_search(config, "")
    }

    /// Source initialised from a query string.
    pub fn from_search(config: &PqlConfig, search: &str) -> Self {
        MemorySource {
            parameter_name: config.parameter_name.clone(),
            query: QueryString::parse(search),
        }
    }

    /// The encoded query string, other parameters included.
    pub fn search(&self) -> String {
        self.query.to_string()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(&PqlConfig::default())
    }
}

impl PqlSource for MemorySource {
    fn get_pql(&self) -> String {
        self.query
            .get(&self.parameter_name)
            .unwrap_or_default()
            .to_string()
    }

    fn set_pql(&mut self, pql: &str) {
        self.query.set(&self.parameter_name, pql);
    }
}

/// Reads, edits and writes back the PQL held by a source.
#[derive(Debug, Clone)]
pub struct PqlUtil<S: PqlSource> {
    source: S,
    service: PqlService,
}

impl PqlUtil<MemorySource> {
    /// Facade over an in-memory query string.
    pub fn in_memory(config: PqlConfig, search: &str) -> Self {
        let source = MemorySource::from_search(&config, search);
        Self::new(source, PqlService::with_config(config))
    }
}

impl<S: PqlSource> PqlUtil<S> {
    /// Facade over any source.
    pub fn new(source: S, service: PqlService) -> Self {
        PqlUtil { source, service }
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The service used for every edit.
    pub fn service(&self) -> &PqlService {
        &self.service
    }

    /// The trimmed PQL of the source.
    pub fn get_raw_pql(&self) -> String {
        let pql = self.source.get_pql().trim().to_string();
        log::debug!("Current PQL: [{pql}]");
        pql
    }

    /// Clear the source.
    pub fn reset(&mut self) {
        self.write("");
    }

    /// Include one term.
    pub fn add_term<V: Into<Value>>(&mut self, category: &str, facet: &str, term: V) -> Result<()> {
        let pql = self.service.add_term(&self.get_raw_pql(), category, facet, term)?;
        self.write(&pql);
        Ok(())
    }

    /// Include several terms, replacing an exclusion on the facet.
    pub fn add_terms<I, V>(&mut self, category: &str, facet: &str, terms: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let pql = self.service.add_terms(&self.get_raw_pql(), category, facet, terms)?;
        self.write(&pql);
        Ok(())
    }

    /// Exclude one term.
    pub fn exclude_term<V: Into<Value>>(
        &mut self,
        category: &str,
        facet: &str,
        term: V,
    ) -> Result<()> {
        let pql = self.service.exclude_term(&self.get_raw_pql(), category, facet, term)?;
        self.write(&pql);
        Ok(())
    }

    /// Exclude several terms, replacing an inclusion on the facet.
    pub fn exclude_terms<I, V>(&mut self, category: &str, facet: &str, terms: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let pql = self.service.exclude_terms(&self.get_raw_pql(), category, facet, terms)?;
        self.write(&pql);
        Ok(())
    }

    /// Remove a term from either list.
    pub fn remove_term<V: Into<Value>>(
        &mut self,
        category: &str,
        facet: &str,
        term: V,
    ) -> Result<()> {
        let pql = self.service.remove_term(&self.get_raw_pql(), category, facet, term)?;
        self.write(&pql);
        Ok(())
    }

    /// Remove the whole facet.
    pub fn remove_facet(&mut self, category: &str, facet: &str) -> Result<()> {
        let pql = self.service.remove_facet(&self.get_raw_pql(), category, facet)?;
        self.write(&pql);
        Ok(())
    }

    /// Replace the facet with a single included term.
    pub fn overwrite<V: Into<Value>>(&mut self, category: &str, facet: &str, term: V) -> Result<()> {
        let pql = self.service.overwrite(&self.get_raw_pql(), category, facet, term)?;
        self.write(&pql);
        Ok(())
    }

    /// Require `category.facet` to exist.
    pub fn has(&mut self, category: &str, facet: &str) -> Result<()> {
        let pql = self.service.has(&self.get_raw_pql(), category, facet)?;
        self.write(&pql);
        Ok(())
    }

    /// Drop the existence requirement.
    pub fn has_no(&mut self, category: &str, facet: &str) -> Result<()> {
        let pql = self.service.has_no(&self.get_raw_pql(), category, facet)?;
        self.write(&pql);
        Ok(())
    }

    /// Match documents where `category.facet` is missing.
    pub fn with_missing(&mut self, category: &str, facet: &str) -> Result<()> {
        let pql = self.service.with_missing(&self.get_raw_pql(), category, facet)?;
        self.write(&pql);
        Ok(())
    }

    /// Drop the missing-value predicate.
    pub fn without_missing(&mut self, category: &str, facet: &str) -> Result<()> {
        let pql = self.service.without_missing(&self.get_raw_pql(), category, facet)?;
        self.write(&pql);
        Ok(())
    }

    /// Request facet counts with `facets(*)`.
    pub fn includes_facets(&mut self) -> Result<()> {
        let pql = self.service.includes_facets(&self.get_raw_pql())?;
        self.write(&pql);
        Ok(())
    }

    /// Add `select(consequences)`.
    pub fn includes_consequences(&mut self) -> Result<()> {
        self.includes(["consequences"])
    }

    /// Add projections from the configured include list.
    pub fn includes<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let pql = self.service.includes(&self.get_raw_pql(), fields)?;
        self.write(&pql);
        Ok(())
    }

    /// Replace the paging window.
    pub fn set_limit(&mut self, limit: Limit) -> Result<()> {
        let pql = self.service.set_limit(&self.get_raw_pql(), limit)?;
        self.write(&pql);
        Ok(())
    }

    /// `limit(from,size)`
    pub fn limit_from_size(&mut self, from: u64, size: u64) -> Result<()> {
        self.set_limit(Limit::new(from, size))
    }

    /// `limit(size)`
    pub fn limit_size(&mut self, size: u64) -> Result<()> {
        self.set_limit(Limit::size(size))
    }

    /// The paging window of the source's PQL.
    pub fn get_limit(&self) -> Result<Option<Limit>> {
        self.service.get_limit(&self.get_raw_pql())
    }

    /// Replace the sort clause. An empty list removes it.
    pub fn set_sort(&mut self, sort: &[SortField]) -> Result<()> {
        let pql = self.service.set_sort(&self.get_raw_pql(), sort)?;
        self.write(&pql);
        Ok(())
    }

    /// The sort fields of the source's PQL.
    pub fn get_sort(&self) -> Result<Vec<SortField>> {
        self.service.get_sort(&self.get_raw_pql())
    }

    /// Append an ascending sort on `field`, moving it last if already sorted.
    pub fn sort_asc(&mut self, field: &str) -> Result<()> {
        self.add_sort(SortField::asc(field))
    }

    /// Append a descending sort on `field`, moving it last if already sorted.
    pub fn sort_desc(&mut self, field: &str) -> Result<()> {
        self.add_sort(SortField::desc(field))
    }

    /// Stop sorting on `field`.
    pub fn remove_sort(&mut self, field: &str) -> Result<()> {
        check_field("field", field)?;
        let mut sort = self.get_sort()?;
        sort.retain(|entry| entry.field != field);
        self.set_sort(&sort)
    }

    fn add_sort(&mut self, entry: SortField) -> Result<()> {
        check_field("field", &entry.field)?;
        let mut sort = self.get_sort()?;
        sort.retain(|existing| existing.field != entry.field);
        sort.push(entry);
        self.set_sort(&sort)
    }

    /// The filters of the source's PQL.
    pub fn get_filters(&self) -> Result<Filters> {
        self.service.get_filters(&self.get_raw_pql())
    }

    /// Serialize a query object to canonical PQL.
    pub fn convert_query_to_pql(&self, query: &QueryObject) -> String {
        self.service.convert_query_to_pql(query)
    }

    /// Parse PQL into a query object.
    pub fn convert_pql_to_query(&self, pql: &str) -> Result<QueryObject> {
        self.service.convert_pql_to_query_object(pql)
    }

    /// Deep-merge query objects left to right.
    pub fn merge_queries(&self, queries: &[QueryObject]) -> QueryObject {
        self.service.merge_queries(queries)
    }

    /// Merge PQL statements, `""` when any is invalid.
    pub fn merge_pqls<T: AsRef<str>>(&self, pqls: &[T]) -> String {
        self.service.merge_pqls(pqls)
    }

    /// A builder over `pql`, or over the source's PQL when `None`.
    pub fn get_builder(&self, pql: Option<&str>) -> PqlBuilder {
        let pql = match pql {
            Some(pql) => pql.to_string(),
            None => self.get_raw_pql(),
        };
        PqlBuilder::with_service(self.service.clone(), &pql)
    }

    fn write(&mut self, pql: &str) {
        self.source.set_pql(pql);
        log::debug!("PQL is updated to [{pql}]");
    }
}
