//! Shared column codecs for SQLite rows.

use crate::repo::glif_repo::{RepoError, RepoResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(table: &str, column: &str, value: i64) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {table}.{column}"
        ))),
    }
}

pub(crate) fn parse_uuid(table: &str, column: &str, value: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in {table}.{column}"))
    })
}

pub(crate) fn to_json<T: Serialize>(table: &str, column: &str, value: &T) -> RepoResult<String> {
    serde_json::to_string(value).map_err(|err| {
        RepoError::InvalidData(format!("cannot encode {table}.{column}: {err}"))
    })
}

pub(crate) fn from_json<T: DeserializeOwned>(
    table: &str,
    column: &str,
    text: &str,
) -> RepoResult<T> {
    serde_json::from_str(text).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in {table}.{column}: {err}"))
    })
}
