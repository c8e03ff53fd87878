/// Upper bound on the number of options shown to the player.
pub const MAX_OPTIONS: usize = 3;

/// Extract up to [`MAX_OPTIONS`] option strings from raw completion text.
///
/// The model is asked for a numbered list, but the output is free-form, so
/// parsing is deliberately forgiving:
///
/// 1. Lines are trimmed; blank lines are discarded.
/// 2. A line counts as an option when it starts with an ASCII digit or a
///    dash.
/// 3. The leading run of numbering/bullet characters (digits, `)`, `.`,
///    `-`, spaces) is stripped, keeping the option text itself.
/// 4. When no line matches at all, the first non-blank lines are taken
///    verbatim as a best-effort recovery. The model may simply have
///    omitted the numbering.
///
/// Returns an empty vec only when the input has no non-blank lines; the
/// caller decides how to surface that. Pure function, safe to call twice.
pub fn parse_options(text: &str) -> Vec<String> {
    let mut options = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let numbered = line.chars().next().is_some_and(|c| c.is_ascii_digit());
        if numbered || line.starts_with('-') {
            let stripped = strip_marker(line);
            if !stripped.is_empty() {
                options.push(stripped.to_string());
                if options.len() == MAX_OPTIONS {
                    break;
                }
            }
        }
    }

    if !options.is_empty() {
        return options;
    }

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(MAX_OPTIONS)
        .map(str::to_string)
        .collect()
}

/// Strip "1." / "2)" / "- " style markers from the start of a line.
fn strip_marker(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c.is_ascii_digit() || c == ')' || c == '.' || c == '-' || c == ' '
    })
    .trim()
}
