//! Recursive-descent parser
//!
//! ```text
//! program  := (var | task | lang | entry | text)*
//! task     := @task header [INDENT block DEDENT]
//! block    := item*
//! item     := text | code | @tool | @agent | @next | @var | cond | INDENT block DEDENT
//! code     := FENCE text* FENCE
//! cond     := @if expr [INDENT block DEDENT] [@else [INDENT block DEDENT]]
//! ```
//!
//! An INDENT that follows no block-opening directive continues the
//! current block; its text keeps the extra indentation.

use crate::ast::{
    BodyItem, Branch, CodeBlock, Conditional, EntryOverride, LangTag, Program, TaskDecl,
    TextLine,
};
use crate::error::{FlowcError, Result};
use crate::lex::{normalize, tokenize, DirectiveKind, Token, TokenKind, TokenStream};

use super::args;

/// Parse a token stream into a program
pub fn parse(tokens: &TokenStream) -> Result<Program> {
    Parser::new(tokens.as_slice()).parse()
}

/// Normalize, tokenize and parse raw source text
pub fn parse_source(source: &str) -> Result<Program> {
    let normalized = normalize(source);
    let tokens = tokenize(&normalized)?;
    parse(&tokens)
}

/// Where a block sits: `@next` means a different item in each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockContext {
    Task,
    Branch,
}

pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    program: Program,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            program: Program::default(),
        }
    }

    pub fn parse(mut self) -> Result<Program> {
        while let Some(token) = self.advance() {
            match token.kind {
                TokenKind::Directive(kind) => self.top_level_directive(kind, token)?,
                TokenKind::Text => self.program.preamble.push(TextLine {
                    content: token.text.clone(),
                    line: token.line,
                }),
                // Top-level code is kept with the preamble prose
                TokenKind::Fence => {
                    let code = self.code_block(token)?;
                    self.program.preamble.push(TextLine {
                        content: code.fenced(),
                        line: code.line,
                    });
                }
                TokenKind::Indent => return Err(FlowcError::UnexpectedIndent { line: token.line }),
                // Task bodies consume their own DEDENTs
                TokenKind::Dedent => {}
            }
        }

        tracing::debug!(
            tasks = self.program.tasks.len(),
            variables = self.program.variables.len(),
            "parsed program"
        );
        Ok(self.program)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn top_level_directive(&mut self, kind: DirectiveKind, token: &'t Token) -> Result<()> {
        let line = token.line;
        match kind {
            DirectiveKind::Var => {
                let var = args::variable(token.args(), line)?;
                self.program.variables.push(var);
            }
            DirectiveKind::Task => {
                let task = self.task(token)?;
                self.program.tasks.push(task);
            }
            DirectiveKind::Lang => {
                if let Some(first) = &self.program.lang {
                    return Err(FlowcError::DuplicateLang {
                        line,
                        first_line: first.line,
                    });
                }
                let tag = args::lang(token.args(), line)?;
                self.program.lang = Some(LangTag { tag, line });
            }
            DirectiveKind::Next => {
                if let Some(first) = &self.program.entry {
                    return Err(FlowcError::DuplicateEntryOverride {
                        line,
                        first_line: first.line,
                    });
                }
                if !self.program.tasks.is_empty() {
                    return Err(FlowcError::MisplacedEntryOverride { line });
                }
                let jump = args::jump(token.args(), line)?;
                self.program.entry = Some(EntryOverride {
                    task: jump.target,
                    line,
                });
            }
            DirectiveKind::Else => return Err(FlowcError::OrphanElse { line }),
            DirectiveKind::Tool | DirectiveKind::Agent | DirectiveKind::If => {
                return Err(FlowcError::DirectiveOutsideTask {
                    directive: kind.keyword().to_string(),
                    line,
                });
            }
        }
        Ok(())
    }

    fn task(&mut self, header: &'t Token) -> Result<TaskDecl> {
        let (id, title) = args::task_header(header.args(), header.line)?;
        let mut task = TaskDecl::new(id, header.line);
        if let Some(title) = title {
            task.title = title;
        }

        task.body = self.optional_block(BlockContext::Task)?;

        // A final top-level @next is the task's default exit
        if let Some(BodyItem::Next(_)) = task.body.last() {
            if let Some(BodyItem::Next(jump)) = task.body.pop() {
                task.next = Some(jump);
            }
        }
        Ok(task)
    }

    /// Parse an indented block if one follows, else an empty body
    fn optional_block(&mut self, ctx: BlockContext) -> Result<Vec<BodyItem>> {
        if self.peek_kind() != Some(TokenKind::Indent) {
            return Ok(Vec::new());
        }
        self.pos += 1;
        let base = self.peek().map_or(0, |t| t.column);
        let mut items = Vec::new();
        self.block(ctx, base, &mut items)?;
        Ok(items)
    }

    /// Items until the closing DEDENT (consumed) or end of input
    fn block(&mut self, ctx: BlockContext, base: usize, items: &mut Vec<BodyItem>) -> Result<()> {
        while let Some(token) = self.advance() {
            match token.kind {
                TokenKind::Dedent => return Ok(()),
                TokenKind::Indent => self.block(ctx, base, items)?,
                TokenKind::Text => {
                    let extra = token.column.saturating_sub(base);
                    items.push(BodyItem::Text(TextLine {
                        content: format!("{}{}", " ".repeat(extra), token.text),
                        line: token.line,
                    }));
                }
                TokenKind::Fence => items.push(BodyItem::Code(self.code_block(token)?)),
                TokenKind::Directive(kind) => self.body_directive(kind, token, ctx, items)?,
            }
        }
        Ok(())
    }

    /// Raw lines up to the closing fence
    fn code_block(&mut self, open: &'t Token) -> Result<CodeBlock> {
        let mut lines = Vec::new();
        loop {
            match self.advance() {
                Some(token) if token.kind == TokenKind::Text => lines.push(token.text.as_str()),
                Some(token) if token.kind == TokenKind::Fence => break,
                _ => return Err(FlowcError::UnterminatedCodeBlock { line: open.line }),
            }
        }
        Ok(CodeBlock {
            lang: open.fence_lang().map(str::to_string),
            content: lines.join("\n"),
            line: open.line,
        })
    }

    fn body_directive(
        &mut self,
        kind: DirectiveKind,
        token: &'t Token,
        ctx: BlockContext,
        items: &mut Vec<BodyItem>,
    ) -> Result<()> {
        let line = token.line;
        match kind {
            DirectiveKind::Var => {
                // Variables are global wherever they are written
                let var = args::variable(token.args(), line)?;
                self.program.variables.push(var);
            }
            DirectiveKind::Tool => items.push(BodyItem::ToolCall(args::tool(token.args(), line)?)),
            DirectiveKind::Agent => {
                items.push(BodyItem::AgentCall(args::agent(token.args(), line)?))
            }
            DirectiveKind::Next => {
                let jump = args::jump(token.args(), line)?;
                items.push(match ctx {
                    BlockContext::Task => BodyItem::Next(jump),
                    BlockContext::Branch => BodyItem::Jump(jump),
                });
            }
            DirectiveKind::If => {
                let condition = args::condition(token.args(), line)?;
                let body = self.optional_block(BlockContext::Branch)?;
                items.push(BodyItem::Conditional(Conditional {
                    branches: vec![Branch {
                        condition: Some(condition),
                        body,
                        line,
                    }],
                    line,
                }));
            }
            DirectiveKind::Else => {
                args::bare_else(token.args(), line)?;
                let Some(BodyItem::Conditional(cond)) = items.last() else {
                    return Err(FlowcError::OrphanElse { line });
                };
                if cond.has_else() {
                    return Err(FlowcError::DuplicateElse {
                        line,
                        if_line: cond.line,
                    });
                }
                let body = self.optional_block(BlockContext::Branch)?;
                if let Some(BodyItem::Conditional(cond)) = items.last_mut() {
                    cond.branches.push(Branch {
                        condition: None,
                        body,
                        line,
                    });
                }
            }
            DirectiveKind::Task | DirectiveKind::Lang => {
                return Err(FlowcError::TopLevelOnly {
                    directive: kind.keyword().to_string(),
                    line,
                });
            }
        }
        Ok(())
    }
}
