//! Request handlers.
//!
//! Handlers are synchronous functions over a borrowed [`Store`]; the route
//! layer owns locking and extraction.
//!
//! [`Store`]: shelf_engine::Store

mod resources;
mod search;

pub use resources::*;
pub use search::*;

use crate::error::{AppError, Result};

/// Query string as decoded pairs, preserving repeated keys.
pub type QueryPairs = Vec<(String, String)>;

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| AppError::BadRequest(format!("'{value}' is not a valid value for '{name}'")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(AppError::BadRequest(format!(
            "'{other}' is not a valid value for '{name}'"
        ))),
    }
}

/// All values of `name` in order.
fn values<'a>(pairs: &'a [(String, String)], name: &'a str) -> impl Iterator<Item = &'a str> {
    pairs
        .iter()
        .filter(move |(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// The last value of `name`, if any.
fn last<'a>(pairs: &'a [(String, String)], name: &'a str) -> Option<&'a str> {
    values(pairs, name).last()
}
