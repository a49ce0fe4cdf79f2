// src/version.rs

//! Package version ordering
//!
//! Versions look like `1.2.3_4`: an upstream version followed by an
//! optional `_<revision>`. Upstream parts are compared segment by segment,
//! numeric runs numerically and alphabetic runs lexically, then revisions
//! numerically. Anything that is neither an ASCII digit nor alphabetic
//! separates segments.

use std::cmp::Ordering;

/// Compare two version strings
pub fn compare(left: &str, right: &str) -> Ordering {
    let (left_ver, left_rev) = split_revision(left);
    let (right_ver, right_rev) = split_revision(right);

    match vercmp(left_ver, right_ver) {
        Ordering::Equal => left_rev.cmp(&right_rev),
        ord => ord,
    }
}

/// Split `1.0_3` into (`1.0`, 3). Missing or non-numeric revisions count as 0.
fn split_revision(version: &str) -> (&str, u64) {
    match version.rsplit_once('_') {
        Some((upstream, rev)) if !rev.is_empty() && rev.chars().all(|c| c.is_ascii_digit()) => {
            (upstream, rev.parse().unwrap_or(u64::MAX))
        }
        _ => (version, 0),
    }
}

/// Alphanumeric segment comparison
fn vercmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        // Only characters a segment branch below can consume survive this
        while a_chars.peek().is_some_and(|&c| !is_segment_char(c)) {
            a_chars.next();
        }
        while b_chars.peek().is_some_and(|&c| !is_segment_char(c)) {
            b_chars.next();
        }

        let (ac, bc) = match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ac), Some(bc)) => (ac, bc),
        };

        match (ac.is_ascii_digit(), bc.is_ascii_digit()) {
            (true, true) => {
                let a_num = take_while(&mut a_chars, |c| c.is_ascii_digit());
                let b_num = take_while(&mut b_chars, |c| c.is_ascii_digit());
                let a_num = a_num.trim_start_matches('0');
                let b_num = b_num.trim_start_matches('0');

                // Longer numeric run is greater, equal lengths compare lexically
                match a_num.len().cmp(&b_num.len()).then_with(|| a_num.cmp(b_num)) {
                    Ordering::Equal => continue,
                    ord => return ord,
                }
            }
            (false, false) => {
                let a_alpha = take_while(&mut a_chars, |c| c.is_alphabetic());
                let b_alpha = take_while(&mut b_chars, |c| c.is_alphabetic());

                match a_alpha.cmp(&b_alpha) {
                    Ordering::Equal => continue,
                    ord => return ord,
                }
            }
            // Numbers sort above letters
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
        }
    }
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_digit() || c.is_alphabetic()
}

/// Whether `version` meets a constraint such as `>=1.2`
///
/// Returns `None` when the constraint cannot be interpreted.
pub fn satisfies(version: &str, constraint: &str) -> Option<bool> {
    let constraint = constraint.trim();
    let (op, wanted) = [">=", "<=", "==", ">", "<", "="]
        .iter()
        .find_map(|op| constraint.strip_prefix(op).map(|rest| (*op, rest.trim())))?;
    if wanted.is_empty() || wanted.starts_with(['<', '>', '=']) {
        return None;
    }

    let ord = compare(version, wanted);
    Some(match op {
        ">=" => ord != Ordering::Less,
        "<=" => ord != Ordering::Greater,
        ">" => ord == Ordering::Greater,
        "<" => ord == Ordering::Less,
        _ => ord == Ordering::Equal,
    })
}

fn take_while<I, P>(chars: &mut std::iter::Peekable<I>, pred: P) -> String
where
    I: Iterator<Item = char>,
    P: Fn(char) -> bool,
{
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !pred(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}
