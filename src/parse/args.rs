//! Directive argument parsing
//!
//! Each function takes the text after `@keyword` and the source line, and
//! returns a structural error naming the directive when the form is wrong.

use crate::ast::{AgentCall, AgentParam, Jump, ToolCall, VariableDecl};
use crate::error::{FlowcError, Result};
use crate::lex::DirectiveKind;

fn malformed(kind: DirectiveKind, line: usize, reason: impl Into<String>) -> FlowcError {
    FlowcError::MalformedArguments {
        directive: kind.keyword().to_string(),
        line,
        reason: reason.into(),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Split off the first whitespace-delimited word
fn split_word(args: &str) -> (&str, &str) {
    match args.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (args, ""),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// `@var name = value`
pub(crate) fn variable(args: &str, line: usize) -> Result<VariableDecl> {
    let (name, value) = args
        .split_once('=')
        .ok_or_else(|| malformed(DirectiveKind::Var, line, "expected 'name = value'"))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(malformed(
            DirectiveKind::Var,
            line,
            format!("'{}' is not a valid variable name", name),
        ));
    }
    Ok(VariableDecl::new(name, value.trim(), line))
}

/// `@task id [title]` -> (id, optional title)
pub(crate) fn task_header(args: &str, line: usize) -> Result<(String, Option<String>)> {
    let (id, title) = split_word(args);
    if id.is_empty() {
        return Err(malformed(DirectiveKind::Task, line, "missing task id"));
    }
    if !is_identifier(id) {
        return Err(malformed(
            DirectiveKind::Task,
            line,
            format!("'{}' is not a valid task id", id),
        ));
    }
    Ok((id.to_string(), non_empty(title)))
}

/// `@tool name [description]`
pub(crate) fn tool(args: &str, line: usize) -> Result<ToolCall> {
    let (name, description) = split_word(args);
    if name.is_empty() {
        return Err(malformed(DirectiveKind::Tool, line, "missing tool name"));
    }
    Ok(ToolCall {
        name: name.to_string(),
        description: non_empty(description),
        line,
    })
}

/// `@next target`
pub(crate) fn jump(args: &str, line: usize) -> Result<Jump> {
    let (target, rest) = split_word(args);
    if target.is_empty() {
        return Err(malformed(DirectiveKind::Next, line, "missing jump target"));
    }
    if !rest.is_empty() {
        return Err(malformed(
            DirectiveKind::Next,
            line,
            format!("unexpected text after target: '{}'", rest),
        ));
    }
    Ok(Jump::new(target, line))
}

/// `@lang tag`
pub(crate) fn lang(args: &str, line: usize) -> Result<String> {
    let (tag, rest) = split_word(args);
    if tag.is_empty() || !rest.is_empty() {
        return Err(malformed(DirectiveKind::Lang, line, "expected a single language tag"));
    }
    Ok(tag.to_string())
}

/// `@if condition`
pub(crate) fn condition(args: &str, line: usize) -> Result<String> {
    if args.is_empty() {
        return Err(malformed(DirectiveKind::If, line, "missing condition"));
    }
    Ok(args.to_string())
}

/// `@else` takes nothing
pub(crate) fn bare_else(args: &str, line: usize) -> Result<()> {
    if !args.is_empty() {
        return Err(malformed(
            DirectiveKind::Else,
            line,
            "@else takes no condition (there is no else-if)",
        ));
    }
    Ok(())
}

/// `@agent Name(key=value, ...) [description]`
///
/// Values stay raw. Quoted values may hold commas and parentheses; nested
/// brackets are kept intact.
pub(crate) fn agent(args: &str, line: usize) -> Result<AgentCall> {
    let name_len = args
        .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')))
        .unwrap_or(args.len());
    let name = &args[..name_len];
    if name.is_empty() {
        return Err(malformed(DirectiveKind::Agent, line, "missing agent name"));
    }

    let rest = args[name_len..].trim_start();
    let (params, description) = match rest.strip_prefix('(') {
        Some(inner) => {
            let close = matching_paren(inner)
                .ok_or_else(|| malformed(DirectiveKind::Agent, line, "unbalanced parentheses"))?;
            let params = param_list(&inner[..close], line)?;
            (params, inner[close + 1..].trim())
        }
        None => (Vec::new(), rest),
    };

    Ok(AgentCall {
        name: name.to_string(),
        params,
        description: non_empty(description),
        line,
    })
}

/// Index of the `)` closing an already-opened parenthesis
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => {
                depth -= 1;
                if depth == 0 {
                    return (c == ')').then_some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn param_list(inner: &str, line: usize) -> Result<Vec<AgentParam>> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                pieces.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(malformed(DirectiveKind::Agent, line, "unterminated quote"));
    }
    pieces.push(&inner[start..]);

    pieces
        .into_iter()
        .map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() {
                return Err(malformed(DirectiveKind::Agent, line, "empty parameter"));
            }
            let (key, value) = piece.split_once('=').ok_or_else(|| {
                malformed(
                    DirectiveKind::Agent,
                    line,
                    format!("expected key=value, got '{}'", piece),
                )
            })?;
            let key = key.trim();
            if !is_identifier(key) {
                return Err(malformed(
                    DirectiveKind::Agent,
                    line,
                    format!("'{}' is not a valid parameter name", key),
                ));
            }
            Ok(AgentParam {
                key: key.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}
