//! Fluent builder accumulating edits over an initial PQL statement.
//!
//! The builder records [`Action`]s and replays them on [`build`]. Building
//! does not consume the builder, so the same chain can be rendered with
//! and without its metadata.
//!
//! [`build`]: PqlBuilder::build

use crate::ast::{Limit, SortField, Value};
use crate::config::PqlConfig;
use crate::error::Result;
use crate::query::QueryObject;
use crate::query::convert::filter_statement;
use crate::query::names::{check_field, check_path};
use crate::translation::{PqlService, include_fields};

/// A recorded edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddTerms {
        category: String,
        facet: String,
        terms: Vec<Value>,
    },
    ExcludeTerms {
        category: String,
        facet: String,
        terms: Vec<Value>,
    },
    RemoveTerm {
        category: String,
        facet: String,
        term: Value,
    },
    RemoveFacet {
        category: String,
        facet: String,
    },
    Overwrite {
        category: String,
        facet: String,
        terms: Vec<Value>,
    },
    Has {
        category: String,
        facet: String,
    },
    HasNo {
        category: String,
        facet: String,
    },
    WithMissing {
        category: String,
        facet: String,
    },
    WithoutMissing {
        category: String,
        facet: String,
    },
    IncludesFacets,
    Includes(Vec<String>),
    SetLimit(Limit),
    SetSort(Vec<SortField>),
}

impl Action {
    /// True for actions that change filters rather than metadata.
    pub fn is_filter_modifier(&self) -> bool {
        !matches!(
            self,
            Action::IncludesFacets | Action::Includes(_) | Action::SetLimit(_) | Action::SetSort(_)
        )
    }

    /// Apply the action to a query object.
    pub fn apply(&self, query: &mut QueryObject, config: &PqlConfig) -> Result<()> {
        let filters = &mut query.filters;
        match self {
            Action::AddTerms {
                category,
                facet,
                terms,
            } => filters.add_terms(category, facet, terms.iter().cloned()),
            Action::ExcludeTerms {
                category,
                facet,
                terms,
            } => filters.exclude_terms(category, facet, terms.iter().cloned()),
            Action::RemoveTerm {
                category,
                facet,
                term,
            } => filters.remove_term(category, facet, term),
            Action::RemoveFacet { category, facet } => filters.remove_facet(category, facet),
            Action::Overwrite {
                category,
                facet,
                terms,
            } => filters.overwrite(category, facet, terms.iter().cloned()),
            Action::Has { category, facet } => filters.set_exists(category, facet),
            Action::HasNo { category, facet } => filters.clear_exists(category, facet),
            Action::WithMissing { category, facet } => filters.set_missing(category, facet),
            Action::WithoutMissing { category, facet } => filters.clear_missing(category, facet),
            Action::IncludesFacets => {
                query.params.facets = true;
                Ok(())
            }
            Action::Includes(fields) => {
                include_fields(config, query, fields);
                Ok(())
            }
            Action::SetLimit(limit) => {
                query.params.limit = Some(*limit);
                Ok(())
            }
            Action::SetSort(sort) => {
                query.params.sort = sort.clone();
                Ok(())
            }
        }
    }
}

/// Builder over an initial PQL statement.
///
/// ```
/// use portal_pql::builder::PqlBuilder;
///
/// let builder = PqlBuilder::new("")
///     .add_term("donor", "gender", "male")?
///     .includes_facets();
///
/// assert_eq!(builder.build()?, r#"facets(*),eq(donor.gender,"male")"#);
/// assert_eq!(builder.build_filters()?, r#"eq(donor.gender,"male")"#);
/// # Ok::<(), portal_pql::error::PqlError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PqlBuilder {
    service: PqlService,
    initial_pql: String,
    actions: Vec<Action>,
}

impl PqlBuilder {
    /// Builder with the default configuration.
    pub fn new(initial_pql: &str) -> Self {
        Self::with_service(PqlService::new(), initial_pql)
    }

    /// Builder sharing a service's configuration.
    pub fn with_service(service: PqlService, initial_pql: &str) -> Self {
        PqlBuilder {
            service,
            initial_pql: initial_pql.to_string(),
            actions: Vec::new(),
        }
    }

    /// The statement actions are replayed on.
    pub fn initial_pql(&self) -> &str {
        &self.initial_pql
    }

    /// Recorded actions in order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Record including one term.
    pub fn add_term<V: Into<Value>>(self, category: &str, facet: &str, term: V) -> Result<Self> {
        self.add_terms(category, facet, [term])
    }

    /// Record including several terms, replacing an exclusion.
    pub fn add_terms<I, V>(self, category: &str, facet: &str, terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        check_path(category, facet)?;
        Ok(self.push(Action::AddTerms {
            category: category.to_string(),
            facet: facet.to_string(),
            terms: terms.into_iter().map(Into::into).collect(),
        }))
    }

    /// Record excluding one term.
    pub fn exclude_term<V: Into<Value>>(
        self,
        category: &str,
        facet: &str,
        term: V,
    ) -> Result<Self> {
        self.exclude_terms(category, facet, [term])
    }

    /// Record excluding several terms, replacing an inclusion.
    pub fn exclude_terms<I, V>(self, category: &str, facet: &str, terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        check_path(category, facet)?;
        Ok(self.push(Action::ExcludeTerms {
            category: category.to_string(),
            facet: facet.to_string(),
            terms: terms.into_iter().map(Into::into).collect(),
        }))
    }

    /// Record removing a term from either list.
    pub fn remove_term<V: Into<Value>>(self, category: &str, facet: &str, term: V) -> Result<Self> {
        check_path(category, facet)?;
        Ok(self.push(Action::RemoveTerm {
            category: category.to_string(),
            facet: facet.to_string(),
            term: term.into(),
        }))
    }

    /// Record removing the whole facet.
    pub fn remove_facet(self, category: &str, facet: &str) -> Result<Self> {
        check_path(category, facet)?;
        Ok(self.push(Action::RemoveFacet {
            category: category.to_string(),
            facet: facet.to_string(),
        }))
    }

    /// Record replacing the facet with a single included term.
    pub fn overwrite<V: Into<Value>>(self, category: &str, facet: &str, term: V) -> Result<Self> {
        self.overwrite_terms(category, facet, [term])
    }

    /// Record replacing the facet with included terms.
    pub fn overwrite_terms<I, V>(self, category: &str, facet: &str, terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        check_path(category, facet)?;
        Ok(self.push(Action::Overwrite {
            category: category.to_string(),
            facet: facet.to_string(),
            terms: terms.into_iter().map(Into::into).collect(),
        }))
    }

    /// Record setting `exists(category.facet)`.
    pub fn has(self, category: &str, facet: &str) -> Result<Self> {
        check_path(category, facet)?;
        Ok(self.push(Action::Has {
            category: category.to_string(),
            facet: facet.to_string(),
        }))
    }

    /// Record clearing `exists(category.facet)`.
    pub fn has_no(self, category: &str, facet: &str) -> Result<Self> {
        check_path(category, facet)?;
        Ok(self.push(Action::HasNo {
            category: category.to_string(),
            facet: facet.to_string(),
        }))
    }

    /// Record setting `missing(category.facet)`.
    pub fn with_missing(self, category: &str, facet: &str) -> Result<Self> {
        check_path(category, facet)?;
        Ok(self.push(Action::WithMissing {
            category: category.to_string(),
            facet: facet.to_string(),
        }))
    }

    /// Record clearing `missing(category.facet)`.
    pub fn without_missing(self, category: &str, facet: &str) -> Result<Self> {
        check_path(category, facet)?;
        Ok(self.push(Action::WithoutMissing {
            category: category.to_string(),
            facet: facet.to_string(),
        }))
    }

    /// Request facet counts.
    pub fn includes_facets(self) -> Self {
        self.push(Action::IncludesFacets)
    }

    /// Shorthand for `includes(["consequences"])`.
    pub fn includes_consequences(self) -> Self {
        self.includes(["consequences"])
    }

    /// Add projections. Fields outside the configured include list are
    /// ignored at build time.
    pub fn includes<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = fields.into_iter().map(Into::into).collect();
        self.push(Action::Includes(fields))
    }

    /// Record replacing the paging window.
    pub fn set_limit(self, limit: Limit) -> Self {
        self.push(Action::SetLimit(limit))
    }

    /// Record replacing the sort clause. An empty list removes it.
    pub fn set_sort(self, sort: Vec<SortField>) -> Result<Self> {
        for entry in &sort {
            check_field("field", &entry.field)?;
        }
        Ok(self.push(Action::SetSort(sort)))
    }

    /// Drop recorded actions. A non-empty `starting_pql` also replaces the
    /// initial statement.
    pub fn reset(mut self, starting_pql: Option<&str>) -> Self {
        self.actions.clear();
        if let Some(pql) = starting_pql.filter(|pql| !pql.trim().is_empty()) {
            self.initial_pql = pql.to_string();
        }
        self
    }

    /// Replay every action over the initial statement and serialize.
    pub fn build(&self) -> Result<String> {
        let query = self.replay(|_| true)?;
        Ok(self.service.convert_query_to_pql(&query))
    }

    /// Replay filter edits only and serialize the filters alone.
    pub fn build_filters(&self) -> Result<String> {
        let query = self.replay(Action::is_filter_modifier)?;
        Ok(filter_statement(&query.filters, self.service.config()).to_string())
    }

    fn replay(&self, keep: impl Fn(&Action) -> bool) -> Result<QueryObject> {
        let mut query = self.service.convert_pql_to_query_object(&self.initial_pql)?;
        for action in &self.actions {
            if keep(action) {
                action.apply(&mut query, self.service.config())?;
            }
        }
        Ok(query)
    }

    fn push(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}
