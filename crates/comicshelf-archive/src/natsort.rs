//! Natural ordering for archive entry names.
//!
//! Splits names into alternating text and digit runs so `2.jpg` sorts
//! before `10.jpg`. Text runs compare case-insensitively; digit runs
//! compare numerically.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Num(u128),
    Text(String),
}

fn keys(s: &str) -> Vec<Key> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_digits = false;

    for c in s.chars() {
        if c.is_ascii_digit() != in_digits && !buf.is_empty() {
            out.push(flush(&mut buf, in_digits));
        }
        in_digits = c.is_ascii_digit();
        buf.push(c);
    }
    if !buf.is_empty() {
        out.push(flush(&mut buf, in_digits));
    }
    out
}

fn flush(buf: &mut String, in_digits: bool) -> Key {
    let run = std::mem::take(buf);
    if in_digits {
        // Absurdly long digit runs fall back to text comparison.
        run.parse::<u128>().map_or_else(|_| Key::Text(run), Key::Num)
    } else {
        Key::Text(run.to_lowercase())
    }
}

/// Compare two entry names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    keys(a).cmp(&keys(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_compare_numerically() {
        assert_eq!(natural_cmp("2.jpg", "10.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("002.jpg", "010.jpg"), Ordering::Less);
    }

    #[test]
    fn sort_order() {
        let mut names = vec!["2.jpg", "10.jpg", "1.jpg"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["1.jpg", "2.jpg", "10.jpg"]);
    }

    #[test]
    fn mixed_text_and_digits() {
        let mut names = vec!["page10.png", "page2.png", "cover.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["cover.png", "page2.png", "page10.png"]);
    }

    #[test]
    fn case_insensitive_text() {
        assert_eq!(natural_cmp("Page1.jpg", "page1.jpg"), Ordering::Equal);
    }
}
