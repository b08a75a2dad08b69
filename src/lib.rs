//! # portal-pql
//!
//! Portal Query Language (PQL) for a cancer genomics data portal.
//!
//! ## Features
//!
//! - Recursive-descent parser with position-accurate syntax errors
//! - Query objects mapping `category -> facet -> predicate`
//! - Deterministic PQL serialization
//! - Pure edit operations and a replayable builder
//! - Binding to a URL query-string parameter
//!
//! ```
//! use portal_pql::prelude::*;
//!
//! let service = PqlService::new();
//! let pql = service.add_term("", "donor", "gender", "male")?;
//! assert_eq!(pql, r#"eq(donor.gender,"male")"#);
//!
//! let query = service.convert_pql_to_query_object(&pql)?;
//! assert!(query.filters.facet("donor", "gender").is_some());
//! # Ok::<(), PqlError>(())
//! ```

pub mod ast;
pub mod builder;
pub mod config;
pub mod error;
pub mod location;
pub mod mutation;
pub mod parser;
pub mod query;
pub mod translation;

pub mod prelude {
    pub use crate::ast::{Direction, Filter, Limit, Node, SortField, Statement, Value};
    pub use crate::builder::{Action, PqlBuilder};
    pub use crate::config::PqlConfig;
    pub use crate::error::{PqlError, Result};
    pub use crate::location::{MemorySource, PqlSource, PqlUtil, QueryString};
    pub use crate::parser::{PqlParser, parse};
    pub use crate::query::{FacetFilter, Filters, QueryObject, QueryParams, TermFilter};
    pub use crate::translation::PqlService;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
