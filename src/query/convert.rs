//! Conversion between parse trees and query objects.

use crate::ast::{CompareOp, Filter, Node, Statement, Value};
use crate::config::PqlConfig;
use crate::error::Result;
use crate::query::filters::{FacetFilter, Filters, TermFilter};
use crate::query::names::split_path;
use crate::query::object::{QueryObject, QueryParams};

/// Build a query object from a parsed statement.
///
/// Filters the object model cannot hold (range comparisons, fields without a
/// `category.facet` shape, negations other than `not(eq|in|ne|nin)`) are
/// dropped with a warning.
pub fn from_statement(statement: &Statement, config: &PqlConfig) -> QueryObject {
    let mut query = QueryObject::new();
    query.params.select_all = config.select_all_by_default;

    for node in &statement.nodes {
        match node {
            Node::Select(fields) => {
                for field in fields {
                    if field == "*" {
                        query.params.select_all = true;
                    } else {
                        query.params.add_select(field);
                    }
                }
            }
            Node::Facets(_) => query.params.facets = true,
            Node::Filter(filter) => collect(filter, &mut query.filters),
            Node::Count | Node::Sort(_) | Node::Limit(_) => {}
        }
    }

    query.params.sort = statement.sort().map(<[_]>::to_vec).unwrap_or_default();
    query.params.limit = statement.limit();
    query
}

fn collect(filter: &Filter, filters: &mut Filters) {
    let outcome = match filter {
        Filter::Compare {
            op: CompareOp::Eq,
            field,
            value,
        } => include(filters, field, std::slice::from_ref(value)),
        Filter::Compare {
            op: CompareOp::Ne,
            field,
            value,
        } => exclude(filters, field, std::slice::from_ref(value)),
        Filter::In { field, values } => include(filters, field, values),
        Filter::Nin { field, values } => exclude(filters, field, values),
        Filter::And(children) | Filter::Or(children) | Filter::Nested {
            filters: children, ..
        } => {
            for child in children {
                collect(child, filters);
            }
            Ok(())
        }
        Filter::Not(inner) => match inner.as_ref() {
            Filter::Compare {
                op: CompareOp::Eq,
                field,
                value,
            } => exclude(filters, field, std::slice::from_ref(value)),
            Filter::In { field, values } => exclude(filters, field, values),
            Filter::Compare {
                op: CompareOp::Ne,
                field,
                value,
            } => include(filters, field, std::slice::from_ref(value)),
            Filter::Nin { field, values } => include(filters, field, values),
            _ => {
                log::warn!("Dropping unsupported negation: {filter}");
                Ok(())
            }
        },
        Filter::Exists(field) => with_path(field, |category, facet| {
            filters.set_exists(category, facet)
        }),
        Filter::Missing(field) => with_path(field, |category, facet| {
            filters.set_missing(category, facet)
        }),
        Filter::Compare { .. } => {
            log::warn!("Dropping range comparison: {filter}");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        log::warn!("Dropping filter {filter}: {e}");
    }
}

fn include(filters: &mut Filters, field: &str, values: &[Value]) -> Result<()> {
    with_path(field, |category, facet| {
        filters.add_terms(category, facet, values.iter().cloned())
    })
}

fn exclude(filters: &mut Filters, field: &str, values: &[Value]) -> Result<()> {
    with_path(field, |category, facet| {
        filters.exclude_terms(category, facet, values.iter().cloned())
    })
}

fn with_path(field: &str, f: impl FnOnce(&str, &str) -> Result<()>) -> Result<()> {
    match split_path(field) {
        Some((category, facet)) => f(category, facet),
        None => {
            log::warn!("Dropping filter on '{field}': not a category.facet path");
            Ok(())
        }
    }
}

/// Build the canonical statement for a query object.
///
/// Nodes are emitted as `select(*)`, `select(custom...)`, `facets(*)`,
/// filters, `sort`, `limit`.
pub fn to_statement(query: &QueryObject, config: &PqlConfig) -> Statement {
    let QueryParams {
        select_all,
        custom_selects,
        facets,
        sort,
        limit,
    } = &query.params;

    let mut nodes = Vec::new();
    if *select_all {
        nodes.push(Node::Select(vec!["*".to_string()]));
    }
    if !custom_selects.is_empty() {
        nodes.push(Node::Select(custom_selects.clone()));
    }
    if *facets {
        nodes.push(Node::Facets(vec!["*".to_string()]));
    }
    if let Some(filter) = filter_node(&query.filters, config) {
        nodes.push(Node::Filter(filter));
    }
    if !sort.is_empty() {
        nodes.push(Node::Sort(sort.clone()));
    }
    if let Some(limit) = limit {
        nodes.push(Node::Limit(*limit));
    }
    Statement::new(nodes)
}

/// Statement holding only the filters.
pub fn filter_statement(filters: &Filters, config: &PqlConfig) -> Statement {
    Statement::new(filter_node(filters, config).map(Node::Filter).into_iter().collect())
}

/// `count()` followed by the filters, or an empty statement without filters.
pub fn count_statement(filters: &Filters, config: &PqlConfig) -> Statement {
    match filter_node(filters, config) {
        Some(filter) => Statement::new(vec![Node::Count, Node::Filter(filter)]),
        None => Statement::default(),
    }
}

/// Combine all facet filters into one expression. Several facets are
/// joined with `and`.
pub fn filter_node(filters: &Filters, config: &PqlConfig) -> Option<Filter> {
    let mut ordered: Vec<&str> = Vec::new();
    let preferred = config.category_order.iter().map(String::as_str);
    for category in preferred.chain(filters.categories()) {
        if filters.facets(category).next().is_some() && !ordered.contains(&category) {
            ordered.push(category);
        }
    }

    let mut clauses: Vec<Filter> = ordered
        .into_iter()
        .flat_map(|category| {
            filters
                .facets(category)
                .map(move |(facet, filter)| facet_clause(&format!("{category}.{facet}"), filter))
        })
        .collect();

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(Filter::And(clauses)),
    }
}

fn facet_clause(field: &str, filter: &FacetFilter) -> Filter {
    let mut parts = Vec::new();
    match filter.terms() {
        Some(TermFilter::Include(terms)) => parts.push(Filter::eq_or_in(field, terms.clone())),
        Some(TermFilter::Exclude(terms)) => parts.push(Filter::Not(Box::new(Filter::eq_or_in(
            field,
            terms.clone(),
        )))),
        None => {}
    }
    if filter.has_exists() {
        parts.push(Filter::Exists(field.to_string()));
    }
    if filter.has_missing() {
        parts.push(Filter::Missing(field.to_string()));
    }

    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Filter::Or(parts)
    }
}
