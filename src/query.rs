//! Query object model.

pub mod convert;
pub mod filters;
pub mod names;
pub mod object;

pub use filters::{FacetFilter, Filters, TermFilter};
pub use object::{QueryObject, QueryParams};
