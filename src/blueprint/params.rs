//! Parameter checks shared by blueprint `setup` implementations.
//!
//! Every helper fails with [`RankError::InvalidConfiguration`] naming the
//! feature being set up.

use crate::env::{FieldInfo, FieldKind, IndexEnvironment};
use crate::errors::{RankError, Result};

/// Require exactly `n` parameters.
pub fn expect_count(feature: &str, params: &[String], n: usize) -> Result<()> {
    if params.len() != n {
        return Err(RankError::invalid_config(
            feature,
            format!("expected {} parameter(s), got {}", n, params.len()),
        ));
    }
    Ok(())
}

/// Require at least `n` parameters.
pub fn expect_at_least(feature: &str, params: &[String], n: usize) -> Result<()> {
    if params.len() < n {
        return Err(RankError::invalid_config(
            feature,
            format!("expected at least {} parameter(s), got {}", n, params.len()),
        ));
    }
    Ok(())
}

/// Parse parameter `idx` as a finite number.
pub fn number(feature: &str, params: &[String], idx: usize) -> Result<f64> {
    let raw = param(feature, params, idx)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RankError::invalid_config(
            feature,
            format!("parameter {} ('{}') is not a finite number", idx, raw),
        )),
    }
}

/// Parse parameter `idx` as a non-negative integer.
pub fn count(feature: &str, params: &[String], idx: usize) -> Result<u32> {
    let raw = param(feature, params, idx)?;
    raw.parse::<u32>().map_err(|_| {
        RankError::invalid_config(
            feature,
            format!("parameter {} ('{}') is not a non-negative integer", idx, raw),
        )
    })
}

fn param<'p>(feature: &str, params: &'p [String], idx: usize) -> Result<&'p str> {
    params
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| RankError::invalid_config(feature, format!("missing parameter {}", idx)))
}

/// Look up field `name`, which must exist in the schema.
pub fn field<'e>(feature: &str, env: &'e dyn IndexEnvironment, name: &str) -> Result<&'e FieldInfo> {
    env.field_by_name(name)
        .ok_or_else(|| RankError::invalid_config(feature, format!("unknown field '{}'", name)))
}

/// Look up field `name`, which must exist and have the given kind.
pub fn field_of_kind<'e>(
    feature: &str,
    env: &'e dyn IndexEnvironment,
    name: &str,
    kind: FieldKind,
) -> Result<&'e FieldInfo> {
    let info = field(feature, env, name)?;
    if info.kind != kind {
        return Err(RankError::invalid_config(
            feature,
            format!("field '{}' is not an {} field", name, kind_str(kind)),
        ));
    }
    Ok(info)
}

fn kind_str(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Index => "index",
        FieldKind::Attribute => "attribute",
    }
}
