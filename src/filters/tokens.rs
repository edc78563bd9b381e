//! Delimited token substitution.

use indexmap::IndexMap;

/// Replace every `begin key end` whose key is in `table`.
///
/// Tokens never span lines. An unknown key is copied through and scanning
/// resumes at its end delimiter, so `@a@b@` with only `b` known becomes
/// `@a` followed by b's value.
pub(super) fn replace_tokens(
    input: &str,
    table: &IndexMap<String, String>,
    begin: &str,
    end: &str,
) -> String {
    if table.is_empty() || begin.is_empty() || end.is_empty() {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find(begin) {
        let (before, token) = rest.split_at(start);
        out.push_str(before);
        let after = token.get(begin.len()..).unwrap_or_default();

        match after.find(end) {
            Some(len) if !after.get(..len).unwrap_or_default().contains('\n') => {
                let (key, from_end) = after.split_at(len);
                if let Some(value) = table.get(key) {
                    out.push_str(value);
                    rest = from_end.get(end.len()..).unwrap_or_default();
                } else {
                    out.push_str(begin);
                    out.push_str(key);
                    rest = from_end;
                }
            }
            _ => {
                out.push_str(begin);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
