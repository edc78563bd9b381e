//! Line-oriented stages. Every function preserves the terminators of the
//! lines it keeps.

/// One line with its terminator (`"\n"`, `"\r\n"` or `""` for an
/// unterminated final line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Line<'a> {
    pub text: &'a str,
    pub eol: &'a str,
}

impl Line<'_> {
    fn push_to(self, out: &mut String) {
        out.push_str(self.text);
        out.push_str(self.eol);
    }
}

/// Split `input` into lines. The zero-length remainder after a final
/// terminator is not a line.
pub(super) fn split_lines(input: &str) -> Vec<Line<'_>> {
    input
        .split_inclusive('\n')
        .map(|piece| {
            if let Some(text) = piece.strip_suffix("\r\n") {
                Line { text, eol: "\r\n" }
            } else if let Some(text) = piece.strip_suffix('\n') {
                Line { text, eol: "\n" }
            } else {
                Line { text: piece, eol: "" }
            }
        })
        .collect()
}

fn join<'a>(lines: impl IntoIterator<Item = Line<'a>>) -> String {
    let mut out = String::new();
    for line in lines {
        line.push_to(&mut out);
    }
    out
}

/// First `limit` lines after skipping `skip`; `None` keeps everything.
pub(super) fn head(input: &str, limit: Option<usize>, skip: usize) -> String {
    let lines = split_lines(input).into_iter().skip(skip);
    match limit {
        Some(n) => join(lines.take(n)),
        None => join(lines),
    }
}

/// First `limit` characters after skipping `skip`; `None` keeps everything.
pub(super) fn head_chars(input: &str, limit: Option<usize>, skip: usize) -> String {
    let chars = input.chars().skip(skip);
    match limit {
        Some(n) => chars.take(n).collect(),
        None => chars.collect(),
    }
}

/// Last `limit` lines after dropping `skip` lines from the end.
pub(super) fn tail(input: &str, limit: Option<usize>, skip: usize) -> String {
    let lines = split_lines(input);
    let end = lines.len().saturating_sub(skip);
    let start = limit.map_or(0, |n| end.saturating_sub(n));
    join(lines.into_iter().take(end).skip(start))
}

pub(super) fn prefix_lines(input: &str, prefix: &str, prefix_trailing: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for line in split_lines(input) {
        out.push_str(prefix);
        line.push_to(&mut out);
    }
    if prefix_trailing && (input.is_empty() || input.ends_with('\n')) {
        out.push_str(prefix);
    }
    out
}

pub(super) fn strip_line_comments(input: &str, prefixes: &[String]) -> String {
    join(split_lines(input).into_iter().filter(|line| {
        let text = line.text.trim_start();
        !prefixes.iter().any(|p| text.starts_with(p.as_str()))
    }))
}

pub(super) fn ignore_blank(input: &str) -> String {
    join(
        split_lines(input)
            .into_iter()
            .filter(|line| !line.text.trim().is_empty()),
    )
}

pub(super) fn trim(input: &str) -> String {
    join(split_lines(input).into_iter().map(|line| Line {
        text: line.text.trim(),
        eol: line.eol,
    }))
}

/// Keep lines containing every needle (or, negated, lines missing one).
pub(super) fn line_contains(input: &str, needles: &[String], negate: bool) -> String {
    join(split_lines(input).into_iter().filter(|line| {
        let all = needles.iter().all(|n| line.text.contains(n.as_str()));
        all != negate
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_terminators() {
        assert_eq!(
            split_lines("a\r\nb\nc"),
            [
                Line { text: "a", eol: "\r\n" },
                Line { text: "b", eol: "\n" },
                Line { text: "c", eol: "" },
            ]
        );
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("\n").len(), 1);
    }

    #[test]
    fn head_takes_first_lines() {
        assert_eq!(head("1\n2\n3\n4\n5\n", Some(2), 0), "1\n2\n");
        assert_eq!(head("1\n2\n3\n", Some(2), 1), "2\n3\n");
        assert_eq!(head("1\n2\n", None, 0), "1\n2\n");
        assert_eq!(head("1\n2\n", Some(0), 0), "");
    }

    #[test]
    fn head_chars_counts_characters() {
        assert_eq!(head_chars("héllo\nworld", Some(3), 0), "hél");
        assert_eq!(head_chars("hello", Some(2), 1), "el");
        assert_eq!(head_chars("hello", None, 0), "hello");
    }

    #[test]
    fn tail_takes_last_lines() {
        assert_eq!(tail("1\n2\n3\n4\n", Some(2), 0), "3\n4\n");
        assert_eq!(tail("1\n2\n3\n4\n", Some(2), 1), "2\n3\n");
        assert_eq!(tail("1\n2\n", Some(5), 0), "1\n2\n");
        assert_eq!(tail("1\n2\n", None, 3), "");
    }

    #[test]
    fn prefix_respects_trailing_policy() {
        assert_eq!(prefix_lines("a\nb\n", "Foo", false), "Fooa\nFoob\n");
        assert_eq!(prefix_lines("a\nb\n", "Foo", true), "Fooa\nFoob\nFoo");
        assert_eq!(prefix_lines("a\nb", "Foo", true), "Fooa\nFoob");
        assert_eq!(prefix_lines("a\r\n", "> ", false), "> a\r\n");
    }

    #[test]
    fn comment_and_blank_stripping() {
        assert_eq!(
            strip_line_comments("keep\n  # drop\n// drop\nkeep2", &["#".into(), "//".into()]),
            "keep\nkeep2"
        );
        assert_eq!(ignore_blank("a\n\n  \nb\n"), "a\nb\n");
    }

    #[test]
    fn trim_keeps_terminator() {
        assert_eq!(trim("  a  \n\tb\r\n"), "a\nb\r\n");
    }

    #[test]
    fn line_contains_requires_all_needles() {
        let needles = ["foo".to_string(), "bar".to_string()];
        assert_eq!(line_contains("foo bar\nfoo\nbar\n", &needles, false), "foo bar\n");
        assert_eq!(line_contains("foo bar\nfoo\nbar\n", &needles, true), "foo\nbar\n");
    }
}
