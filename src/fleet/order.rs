//! Deterministic presentation ordering for endpoints.
//!
//! Whenever an ordered view of a dispatch result is needed, the key is
//! `(group name, endpoint name)` under natural (human-numeric) comparison, so
//! `mx2` sorts before `mx10` and output is stable across runs.

use std::cmp::Ordering;

use super::{EndpointId, Fleet};

/// Natural string comparison: digit runs compare by numeric value, other
/// characters compare byte-wise. Longer digit runs with equal value (leading
/// zeroes) fall back to length so the ordering stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ia = a.as_bytes().iter().peekable();
    let mut ib = b.as_bytes().iter().peekable();

    loop {
        match (ia.peek().copied(), ib.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&ca), Some(&cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let (va, la) = take_digits(&mut ia);
                    let (vb, lb) = take_digits(&mut ib);
                    match va.cmp(&vb).then(la.cmp(&lb)) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                match ca.cmp(&cb) {
                    Ordering::Equal => {
                        ia.next();
                        ib.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_digits<'a, I>(iter: &mut std::iter::Peekable<I>) -> (u128, usize)
where
    I: Iterator<Item = &'a u8>,
{
    let mut value: u128 = 0;
    let mut len = 0;
    while let Some(&&c) = iter.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add(u128::from(c - b'0'));
        len += 1;
        iter.next();
    }
    (value, len)
}

/// Compare two endpoints by `(group name, endpoint name)` naturally.
pub fn endpoint_cmp(fleet: &Fleet, a: EndpointId, b: EndpointId) -> Ordering {
    let ea = fleet.endpoint(a);
    let eb = fleet.endpoint(b);
    let ga = &fleet.group(ea.group).name;
    let gb = &fleet.group(eb.group).name;
    natural_cmp(ga, gb).then_with(|| natural_cmp(&ea.name, &eb.name))
}

/// Sort endpoint ids into Deterministic Order, in place.
pub fn sort_endpoints(fleet: &Fleet, ids: &mut [EndpointId]) {
    ids.sort_by(|&a, &b| endpoint_cmp(fleet, a, b));
}
