//! Source normalization applied before lexing
//!
//! - strips a leading UTF-8 BOM
//! - maps CRLF and lone CR to LF
//! - expands tabs to 4-column tab stops
//! - trims trailing whitespace on every line
//! - guarantees a final newline for non-empty input

use crate::util::constants::TAB_WIDTH;

const BOM: char = '\u{feff}';

/// Normalize raw source text. Pure and idempotent.
pub fn normalize(source: &str) -> String {
    let source = source.strip_prefix(BOM).unwrap_or(source);
    let unified = source.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len() + 1);
    for (i, line) in unified.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(expand_tabs(line).trim_end());
    }

    let trimmed_len = out.trim_end_matches('\n').len();
    out.truncate(trimmed_len);
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + TAB_WIDTH);
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_WIDTH - column % TAB_WIDTH;
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out
}
