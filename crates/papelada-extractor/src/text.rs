//! Text preprocessing for converted documents
//!
//! Applied by callers before a [`DocumentText`](papelada_domain::DocumentText)
//! is built; the extraction core never rewrites document text.

/// Normalize converted text while keeping its line structure
///
/// - Line endings become `\n`
/// - Each line is trimmed and its internal whitespace collapsed
/// - Spaces before closing punctuation are removed
/// - Empty lines are dropped
pub fn clean(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_line(line: &str) -> String {
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        if matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | ')' | '}' | ']') && out.ends_with(' ') {
            out.pop();
        }
        out.push(c);
    }
    out
}

/// Collapse line breaks (and the space around them) into single spaces
pub fn flatten(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
