// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Numeric-aware string collation used by `OrderBy`.

use alloc::string::String;
use core::cmp::Ordering;
use core::iter::Peekable;
use core::str::Chars;

/// Compare two strings so that digit runs order by numeric value.
///
/// `"item2" < "item10"`. Text runs compare case-insensitively first; case
/// only breaks ties once the whole strings are otherwise equal.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    compare_runs(a, b, fold_case).then_with(|| compare_runs(a, b, |c| c))
}

fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn compare_runs(a: &str, b: &str, fold: fn(char) -> char) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let ord = compare_numbers(&mut a, &mut b);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = fold(x).cmp(&fold(y));
                if ord != Ordering::Equal {
                    return ord;
                }
                a.next();
                b.next();
            }
        }
    }
}

/// Consume one digit run from each side and compare their values.
fn compare_numbers(a: &mut Peekable<Chars<'_>>, b: &mut Peekable<Chars<'_>>) -> Ordering {
    let a_digits = digit_run(a);
    let b_digits = digit_run(b);
    let a_sig = a_digits.trim_start_matches('0');
    let b_sig = b_digits.trim_start_matches('0');
    a_sig
        .len()
        .cmp(&b_sig.len())
        .then_with(|| a_sig.cmp(b_sig))
        .then_with(|| a_digits.len().cmp(&b_digits.len()))
}

fn digit_run(it: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = it.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn digit_runs_compare_numerically() {
        assert_eq!(natural_cmp("item2", "item10"), Ordering::Less);
        assert_eq!(natural_cmp("item10", "item9"), Ordering::Greater);
        assert_eq!(natural_cmp("2", "10"), Ordering::Less);
        assert_eq!(natural_cmp("a1b2", "a1b10"), Ordering::Less);
    }

    #[test]
    fn leading_zeros_only_break_ties() {
        assert_eq!(natural_cmp("007", "7"), Ordering::Greater);
        assert_eq!(natural_cmp("007", "8"), Ordering::Less);
    }

    #[test]
    fn case_is_secondary() {
        assert_eq!(natural_cmp("apple", "Banana"), Ordering::Less);
        assert_ne!(natural_cmp("a", "A"), Ordering::Equal);
        assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
    }

    #[test]
    fn sorts_labels() {
        let mut v: Vec<&str> = vec!["item10", "item2", "item1"];
        v.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(v, vec!["item1", "item2", "item10"]);
    }
}
