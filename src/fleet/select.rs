//! Target selection: resolve `-n`/`-c`/`-s` flags into an ordered list of
//! endpoints to operate on.

use crate::error::ConfigError;

use super::order::sort_endpoints;
use super::{EndpointId, Fleet};

/// Apply a 1-based `start:stop:step` slice expression to a list.
///
/// The expression follows familiar slice rules: a bare index selects one
/// item, either bound may be omitted, and a negative step walks backwards.
/// `stop` is inclusive in the 1-based view (`2:7` selects items 2 through 7).
/// An empty expression returns the input unchanged.
pub fn apply_slice<T: Copy>(items: &[T], expr: &str) -> Result<Vec<T>, ConfigError> {
    if expr.is_empty() {
        return Ok(items.to_vec());
    }

    let parts: Vec<Option<i64>> = expr
        .split(':')
        .map(|part| {
            if part.is_empty() {
                Ok(None)
            } else {
                part.parse::<i64>().map(Some).map_err(|_| {
                    ConfigError::Invalid(format!("invalid slice expression `{expr}`"))
                })
            }
        })
        .collect::<Result<_, _>>()?;

    if parts.len() > 3 {
        return Err(ConfigError::Invalid(format!(
            "invalid slice expression `{expr}` (at most start:stop:step)"
        )));
    }

    // Shift the 1-based start down; the 1-based inclusive stop already
    // coincides with a 0-based exclusive stop.
    let start = parts[0].map(|v| v - 1);

    if parts.len() == 1 {
        let index = start.expect("bare index is non-empty");
        let length = items.len() as i64;
        let resolved = if index < 0 { index + length } else { index };
        if resolved < 0 || resolved >= length {
            return Err(ConfigError::Invalid(format!(
                "slice index `{expr}` is out of range (1..{length})"
            )));
        }
        return Ok(vec![items[resolved as usize]]);
    }

    let stop = parts[1];
    let step = parts.get(2).copied().flatten();
    Ok(slice_by(items, start, stop, step))
}

/// Extended-slice extraction with optional bounds and step.
fn slice_by<T: Copy>(items: &[T], start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Vec<T> {
    let length = items.len() as i64;
    let step = step.unwrap_or(1);
    if step == 0 {
        return Vec::new();
    }

    let (lower, upper) = if step > 0 { (0, length) } else { (-1, length - 1) };

    let clamp = |bound: Option<i64>, default: i64| -> i64 {
        match bound {
            None => default,
            Some(v) if v < 0 => (v + length).max(lower),
            Some(v) => v.min(upper),
        }
    };

    let start = clamp(start, if step > 0 { lower } else { upper });
    let stop = clamp(stop, if step > 0 { upper } else { lower });

    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(items[i as usize]);
            i += step;
        }
    } else {
        while i > stop {
            out.push(items[i as usize]);
            i += step;
        }
    }
    out
}

/// Resolve node/cluster selections plus a slice expression into a
/// deterministically ordered target list.
///
/// With no explicit nodes or clusters, all configured endpoints are targeted
/// (sliced). Cluster selections are sliced per cluster; explicitly named
/// nodes are always included unsliced. Unknown names are fatal and list the
/// available choices.
pub fn select_targets(
    fleet: &Fleet,
    node_names: &[String],
    cluster_names: &[String],
    slice_expr: &str,
) -> Result<Vec<EndpointId>, ConfigError> {
    let unknown_clusters: Vec<&str> = cluster_names
        .iter()
        .filter(|name| fleet.find_group(name).is_none())
        .map(String::as_str)
        .collect();
    if !unknown_clusters.is_empty() {
        return Err(ConfigError::UnknownTarget(format!(
            "Unknown clusters: {}\nAvailable: {}",
            unknown_clusters.join(", "),
            fleet.group_names().join(", ")
        )));
    }

    let unknown_nodes: Vec<&str> = node_names
        .iter()
        .filter(|name| fleet.find_endpoint(name).is_none())
        .map(String::as_str)
        .collect();
    if !unknown_nodes.is_empty() {
        return Err(ConfigError::UnknownTarget(format!(
            "Unknown nodes: {}\nAvailable: {}",
            unknown_nodes.join(", "),
            fleet.endpoint_names().join(", ")
        )));
    }

    let mut targets: Vec<EndpointId> = Vec::new();
    if node_names.is_empty() && cluster_names.is_empty() {
        let all: Vec<EndpointId> = fleet.all_endpoints().collect();
        targets = apply_slice(&all, slice_expr)?;
    } else {
        for name in cluster_names {
            let group = fleet.group(fleet.find_group(name).expect("validated above"));
            targets.extend(apply_slice(&group.members, slice_expr)?);
        }
    }
    for name in node_names {
        targets.push(fleet.find_endpoint(name).expect("validated above"));
    }

    // A node named explicitly and reached through its cluster must still
    // appear exactly once in the result set.
    let mut seen = std::collections::HashSet::new();
    targets.retain(|id| seen.insert(*id));

    sort_endpoints(fleet, &mut targets);
    Ok(targets)
}
