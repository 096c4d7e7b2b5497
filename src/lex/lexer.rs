//! Indentation-aware line lexer
//!
//! Every non-blank, non-comment line becomes exactly one DIRECTIVE or TEXT
//! token, preceded by the INDENT/DEDENT tokens its width implies. The
//! width stack starts at `[0]`; a dedent must land exactly on an open width.
//!
//! Between ``` fences nothing is interpreted: each line, blank or not, is a
//! raw TEXT token with the fence's indentation removed.

use crate::error::{FlowcError, Result};
use crate::util::constants::{FENCE, SIGIL};

use super::token::{DirectiveKind, Token, TokenKind, TokenStream};

/// Tokenize normalized source text
pub fn tokenize(source: &str) -> Result<TokenStream> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'a> {
    source: &'a str,
    widths: Vec<usize>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            widths: vec![0],
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<TokenStream> {
        let mut last_line = 0;
        // (line, column) of the open code fence
        let mut fence: Option<(usize, usize)> = None;

        for (index, raw) in self.source.lines().enumerate() {
            let line = index + 1;
            let content = raw.trim_start();

            if let Some((_, column)) = fence {
                last_line = line;
                if content.trim_end() == FENCE {
                    self.push_line(TokenKind::Fence, FENCE, line, column);
                    fence = None;
                } else {
                    let leading = raw.len() - raw.trim_start_matches(' ').len();
                    self.push_line(TokenKind::Text, &raw[leading.min(column)..], line, column);
                }
                continue;
            }

            if content.trim_end().is_empty() || content.starts_with('#') {
                continue;
            }
            last_line = line;

            let column = raw.len() - content.len();
            self.indent_to(column, line)?;

            if content.starts_with(FENCE) {
                self.push_line(TokenKind::Fence, content.trim_end(), line, column);
                fence = Some((line, column));
                continue;
            }

            let kind = classify(content, line)?;
            self.tokens.push(Token {
                kind,
                text: content.trim_end().to_string(),
                line,
                depth: self.depth(),
                column,
            });
        }

        if let Some((line, _)) = fence {
            return Err(FlowcError::UnterminatedCodeBlock { line });
        }

        // Close every block still open at end of input
        while self.widths.len() > 1 {
            self.widths.pop();
            self.push_marker(TokenKind::Dedent, last_line);
        }

        tracing::trace!(tokens = self.tokens.len(), "tokenized source");
        Ok(TokenStream::new(self.tokens))
    }

    fn depth(&self) -> usize {
        self.widths.len() - 1
    }

    fn indent_to(&mut self, column: usize, line: usize) -> Result<()> {
        let top = self.widths.last().copied().unwrap_or(0);
        if column > top {
            self.widths.push(column);
            self.push_marker(TokenKind::Indent, line);
            return Ok(());
        }

        while self.widths.last().is_some_and(|&w| w > column) {
            self.widths.pop();
            self.push_marker(TokenKind::Dedent, line);
        }

        if self.widths.last().copied() != Some(column) {
            return Err(FlowcError::InconsistentIndentation {
                line,
                width: column,
                open: self
                    .widths
                    .iter()
                    .map(|w| w.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(())
    }

    fn push_line(&mut self, kind: TokenKind, text: &str, line: usize, column: usize) {
        self.tokens.push(Token {
            kind,
            text: text.to_string(),
            line,
            depth: self.depth(),
            column,
        });
    }

    fn push_marker(&mut self, kind: TokenKind, line: usize) {
        let column = self.widths.last().copied().unwrap_or(0);
        self.tokens.push(Token {
            kind,
            text: String::new(),
            line,
            depth: self.depth(),
            column,
        });
    }
}

/// `@` followed by an identifier start is a directive; anything else is text
fn classify(content: &str, line: usize) -> Result<TokenKind> {
    let Some(rest) = content.strip_prefix(SIGIL) else {
        return Ok(TokenKind::Text);
    };
    if !rest.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return Ok(TokenKind::Text);
    }

    let keyword: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    DirectiveKind::from_keyword(&keyword)
        .map(TokenKind::Directive)
        .ok_or(FlowcError::UnknownDirective { keyword, line })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_flat_directives() {
        use DirectiveKind::*;
        assert_eq!(
            kinds("@var x = 1\n@task a\n"),
            vec![TokenKind::Directive(Var), TokenKind::Directive(Task)]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        let source = "@task a\n    hello\n@task b\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Directive(DirectiveKind::Task),
                TokenKind::Indent,
                TokenKind::Text,
                TokenKind::Dedent,
                TokenKind::Directive(DirectiveKind::Task),
            ]
        );
    }

    #[test]
    fn test_multi_level_dedent_emits_one_per_level() {
        let source = "@task a\n    @if x\n        deep\n@task b\n";
        let tokens = kinds(source);
        let dedents = tokens.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 2);
    }

    #[test]
    fn test_end_of_input_closes_blocks() {
        let tokens = kinds("@task a\n    @if x\n        deep\n");
        assert_eq!(&tokens[tokens.len() - 2..], &[TokenKind::Dedent, TokenKind::Dedent]);
    }

    #[test]
    fn test_comments_and_blank_lines_discarded() {
        let source = "# heading\n\n@task a\n\n    # note\n    body\n";
        let stream = tokenize(source).unwrap();
        let texts: Vec<_> = stream
            .iter()
            .filter(|t| t.kind == TokenKind::Text)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(texts, vec!["body"]);
    }

    #[test]
    fn test_interpolation_stays_in_text() {
        let stream = tokenize("@task a\n    Hello {{name}}, welcome\n").unwrap();
        let text = stream.iter().find(|t| t.kind == TokenKind::Text).unwrap();
        assert_eq!(text.text, "Hello {{name}}, welcome");
    }

    #[test]
    fn test_sigil_without_identifier_is_text() {
        let stream = tokenize("@task a\n    @ home\n    @{ref}\n").unwrap();
        let texts = stream.iter().filter(|t| t.kind == TokenKind::Text).count();
        assert_eq!(texts, 2);
    }

    #[test]
    fn test_unknown_directive_reports_line() {
        let err = tokenize("@task a\n    @loop forever\n").unwrap_err();
        match err {
            FlowcError::UnknownDirective { keyword, line } => {
                assert_eq!(keyword, "loop");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mismatched_dedent_reports_line() {
        let err = tokenize("@task a\n    one\n  two\n").unwrap_err();
        assert!(matches!(
            err,
            FlowcError::InconsistentIndentation { line: 3, width: 2, .. }
        ));
    }

    #[test]
    fn test_token_carries_line_depth_and_column() {
        let stream = tokenize("@task a\n\n    body\n").unwrap();
        let body = stream.iter().find(|t| t.kind == TokenKind::Text).unwrap();
        assert_eq!(body.line, 3);
        assert_eq!(body.depth, 1);
        assert_eq!(body.column, 4);
    }

    #[test]
    fn test_code_fence_lines_are_raw_text() {
        let source = "@task a\n    Example:\n    ```python\n    @dataclass\n    # heading kept\n    class A:\n        x: int\n\n    ```\n    @next END\n";
        let stream = tokenize(source).unwrap();
        let kinds: Vec<_> = stream.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Directive(DirectiveKind::Task),
                TokenKind::Indent,
                TokenKind::Text,
                TokenKind::Fence,
                TokenKind::Text,
                TokenKind::Text,
                TokenKind::Text,
                TokenKind::Text,
                TokenKind::Text,
                TokenKind::Fence,
                TokenKind::Directive(DirectiveKind::Next),
                TokenKind::Dedent,
            ]
        );

        let texts: Vec<_> = stream.iter().skip(4).take(5).map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["@dataclass", "# heading kept", "class A:", "    x: int", ""]);
        assert_eq!(stream.as_slice()[3].fence_lang(), Some("python"));
    }

    #[test]
    fn test_fence_without_language() {
        let stream = tokenize("@task a\n    ```\n    @loop forever\n    ```\n").unwrap();
        let open = stream.iter().find(|t| t.kind == TokenKind::Fence).unwrap();
        assert_eq!(open.fence_lang(), None);
    }

    #[test]
    fn test_unterminated_fence_reports_opening_line() {
        let err = tokenize("@task a\n    ```sh\n    echo hi\n").unwrap_err();
        assert!(matches!(err, FlowcError::UnterminatedCodeBlock { line: 2 }));
        assert_eq!(err.code(), "FLOWC-003");
    }

    #[test]
    fn test_stream_is_restartable() {
        let stream = tokenize("@task a\n    body\n").unwrap();
        let first: Vec<_> = stream.iter().collect();
        let second: Vec<_> = stream.iter().collect();
        assert_eq!(first, second);
    }
}
