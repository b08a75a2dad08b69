//! Validation of category, facet and field names.
//!
//! Names end up verbatim in PQL text, so they must lex back as a single
//! identifier. Categories are plain words; facets and sort fields may be
//! dotted paths.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{PqlError, Result};

lazy_static! {
    static ref CATEGORY_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref FIELD_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap();
}

/// Check a category name. `parameter` names the argument in the error.
pub fn check_category(parameter: &str, name: &str) -> Result<()> {
    check(parameter, name, &CATEGORY_NAME)
}

/// Check a facet or (dotted) field name.
pub fn check_field(parameter: &str, name: &str) -> Result<()> {
    check(parameter, name, &FIELD_NAME)
}

fn check(parameter: &str, name: &str, pattern: &Regex) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PqlError::precondition(parameter));
    }
    if !pattern.is_match(name) {
        return Err(PqlError::invalid_argument(format!(
            "{parameter} '{name}' is not a valid identifier"
        )));
    }
    Ok(())
}

/// Check a `category`/`facet` pair.
pub fn check_path(category: &str, facet: &str) -> Result<()> {
    check_category("category", category)?;
    check_field("facet", facet)
}

/// Split `category.facet` at the first dot. Both halves must be non-empty.
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    path.split_once('.')
        .filter(|(category, facet)| !category.is_empty() && !facet.is_empty())
}
