//! Natural-language augmentation
//!
//! Optional step between semantic analysis and validation. Prose that
//! carries no structure (a task body made only of text, or top-level text)
//! is sent to an [`Augmenter`], which may answer with a DSL fragment. The
//! fragment is parsed with the normal front end and merged back, and the
//! merged program must pass semantic analysis again.
//!
//! ```text
//! collect_requests ─► Augmenter::rewrite ─► extract_fragment ─► merge ─► analyze
//!                      (timeout, cancel)
//! ```
//!
//! Failures are recoverable: the request is skipped and an
//! `AugmentationDegraded` warning recorded, unless augmentation is
//! mandatory.

mod http;
mod mock;
mod retry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::ast::{BodyItem, Program};
use crate::error::{FlowcError, Result};
use crate::findings::{Finding, FindingKind};
use crate::parse::parse_source;
use crate::sema::{analyze, Analysis};
use crate::util::constants::AUGMENT_TIMEOUT;

pub use http::HttpAugmenter;
pub use mock::{MockAugmenter, NoopAugmenter};
pub use retry::{RetryConfig, RetryPolicy};

/// Reply meaning "leave this text alone"
pub const NO_CHANGE: &str = "NO_CHANGE";

/// What an augmentation request rewrites
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AugmentKey {
    /// Body of a prose-only task
    Task(String),
    /// Top-level text before the first task
    Preamble,
}

impl fmt::Display for AugmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AugmentKey::Task(id) => write!(f, "task '{}'", id),
            AugmentKey::Preamble => write!(f, "preamble"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentRequest {
    pub key: AugmentKey,
    pub text: String,
    /// `@lang` tag, else detected from the text
    pub lang: String,
    /// Declared variable names the fragment may reference
    pub variables: Vec<String>,
}

impl AugmentRequest {
    /// Instruction text sent to a language model
    pub fn prompt(&self) -> String {
        let target = match &self.key {
            AugmentKey::Task(id) => format!(
                "the body of task `{}` (emit body lines only, no @task header)",
                id
            ),
            AugmentKey::Preamble => "a set of tasks (each starting with @task <id> <title>)".to_string(),
        };
        let variables = if self.variables.is_empty() {
            "none".to_string()
        } else {
            self.variables.join(", ")
        };

        format!(
            "Convert the description below into workflow DSL for {target}.\n\
             \n\
             Directives:\n\
             @var name = value\n\
             @task id Title\n\
             @tool name description\n\
             @agent name(key=value) description\n\
             @if condition / @else (indented branch bodies, no else-if)\n\
             @next target_task (END finishes the workflow)\n\
             Blocks are indented by four spaces. Reference variables as {{{{name}}}}.\n\
             Declared variables: {variables}\n\
             Write descriptions in language `{lang}`; keep directive keywords in English.\n\
             Answer with DSL only inside one ``` fence, or exactly {no_change} if the text needs no structure.\n\
             \n\
             Description:\n{text}\n",
            target = target,
            variables = variables,
            lang = self.lang,
            no_change = NO_CHANGE,
            text = self.text,
        )
    }
}

/// Rewrites prose into a DSL fragment
#[async_trait]
pub trait Augmenter: Send + Sync {
    fn name(&self) -> &str;

    /// Total time one `rewrite` may take when each attempt gets `per_attempt`
    fn time_budget(&self, per_attempt: Duration) -> Duration {
        per_attempt
    }

    /// `Ok(None)` leaves the text unchanged
    async fn rewrite(&self, request: &AugmentRequest) -> Result<Option<String>>;
}

/// Requests for every prose-only task plus the preamble, in source order
pub fn collect_requests(program: &Program) -> Vec<AugmentRequest> {
    let mut variables: Vec<String> = Vec::new();
    for var in &program.variables {
        if !variables.contains(&var.name) {
            variables.push(var.name.clone());
        }
    }
    let lang_for = |text: &str| match &program.lang {
        Some(tag) => tag.tag.clone(),
        None => detect_language(text).to_string(),
    };

    let mut requests = Vec::new();
    if !program.preamble.is_empty() {
        let text = join_lines(program.preamble.iter().map(|t| t.content.as_str()));
        requests.push(AugmentRequest {
            key: AugmentKey::Preamble,
            lang: lang_for(&text),
            text,
            variables: variables.clone(),
        });
    }
    for task in program.tasks.iter().filter(|t| t.is_prose_only()) {
        let text = join_lines(task.body.iter().filter_map(|item| match item {
            BodyItem::Text(t) => Some(t.content.as_str()),
            _ => None,
        }));
        requests.push(AugmentRequest {
            key: AugmentKey::Task(task.id.clone()),
            lang: lang_for(&text),
            text,
            variables: variables.clone(),
        });
    }
    requests
}

fn join_lines<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    lines.collect::<Vec<_>>().join("\n")
}

/// `zh` when the text has a noticeable share of CJK characters, else `en`
pub fn detect_language(text: &str) -> &'static str {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    let cjk = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    if total > 0 && cjk * 10 > total {
        "zh"
    } else {
        "en"
    }
}

/// Pull the DSL out of a reply: the fenced block if any, else the lines from
/// the first directive on. `None` for [`NO_CHANGE`] or an empty reply.
pub fn extract_fragment(reply: &str) -> Option<String> {
    let reply = reply.trim();
    if reply.is_empty() || reply == NO_CHANGE {
        return None;
    }

    let mut in_fence = false;
    let mut fenced = Vec::new();
    for line in reply.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            fenced.push(line);
        }
    }
    if fenced.iter().any(|l| !l.trim().is_empty()) {
        return Some(fenced.join("\n"));
    }

    let start = reply.lines().position(|l| l.trim_start().starts_with('@'))?;
    Some(reply.lines().skip(start).collect::<Vec<_>>().join("\n"))
}

/// Merge a fragment into a copy of the program
pub fn merge(program: &Program, key: &AugmentKey, fragment: &str) -> Result<Program> {
    let source = match key {
        AugmentKey::Task(id) if !declares_task(fragment) => wrap_body(id, fragment),
        _ => fragment.to_string(),
    };
    let incoming = parse_source(&source).map_err(|e| FlowcError::AugmentationMalformed {
        reason: e.to_string(),
    })?;

    let mut merged = program.clone();
    let mut tasks = incoming.tasks;
    match key {
        AugmentKey::Task(id) => {
            if tasks.is_empty() {
                return Err(FlowcError::AugmentationMalformed {
                    reason: format!("fragment for task '{}' has no body", id),
                });
            }
            let replacement = tasks.remove(tasks.iter().position(|t| t.id == *id).unwrap_or(0));
            let target = merged
                .task_mut(id)
                .ok_or_else(|| FlowcError::AugmentationMalformed {
                    reason: format!("task '{}' no longer exists", id),
                })?;
            target.body = replacement.body;
            target.next = replacement.next;
        }
        AugmentKey::Preamble => {
            if tasks.is_empty() && incoming.variables.is_empty() {
                return Err(FlowcError::AugmentationMalformed {
                    reason: "fragment declares no tasks or variables".to_string(),
                });
            }
            merged.preamble.clear();
        }
    }

    // Fragments often echo declarations they were shown
    for var in incoming.variables {
        if !merged.variables.iter().any(|kept| kept.is_identical(&var)) {
            merged.variables.push(var);
        }
    }
    merged.tasks.extend(tasks);
    if merged.lang.is_none() {
        merged.lang = incoming.lang;
    }
    Ok(merged)
}

fn declares_task(fragment: &str) -> bool {
    fragment
        .lines()
        .any(|l| l.split_whitespace().next() == Some("@task"))
}

fn wrap_body(id: &str, fragment: &str) -> String {
    let mut source = format!("@task {}\n", id);
    for line in fragment.lines() {
        if !line.trim().is_empty() {
            source.push_str("    ");
            source.push_str(line);
        }
        source.push('\n');
    }
    source
}

// ═══════════════════════════════════════════════════════════════
// STAGE
// ═══════════════════════════════════════════════════════════════

/// Result of the augmentation step
#[derive(Debug, Clone)]
pub struct Augmented {
    pub program: Program,
    /// Degraded requests
    pub warnings: Vec<Finding>,
    /// Semantic warnings of the merged program; `None` when nothing merged
    pub semantic: Option<Vec<Finding>>,
    /// Requests whose fragment was merged
    pub applied: usize,
}

/// Drives an [`Augmenter`] over a program
pub struct Augmentation {
    augmenter: Arc<dyn Augmenter>,
    timeout: Duration,
    mandatory: bool,
    cancel: CancellationToken,
}

impl Augmentation {
    pub fn new(augmenter: Arc<dyn Augmenter>) -> Self {
        Self {
            augmenter,
            timeout: AUGMENT_TIMEOUT,
            mandatory: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts outstanding requests
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, program: Program) -> Result<Augmented> {
        let requests = collect_requests(&program);
        let mut current = program;
        let mut warnings = Vec::new();
        let mut semantic = None;
        let mut applied = 0;

        tracing::debug!(
            augmenter = self.augmenter.name(),
            requests = requests.len(),
            "augmentation started"
        );

        for request in &requests {
            match self.apply(&current, request).await {
                Ok(Some(analysis)) => {
                    current = analysis.program;
                    semantic = Some(analysis.warnings);
                    applied += 1;
                }
                Ok(None) => {}
                Err(e) if self.mandatory => return Err(e),
                Err(e) => {
                    tracing::warn!(key = %request.key, error = %e, "augmentation degraded");
                    let mut finding = Finding::warning(FindingKind::AugmentationDegraded {
                        reason: e.to_string(),
                    });
                    if let AugmentKey::Task(id) = &request.key {
                        finding = finding.with_task(id);
                    }
                    warnings.push(finding);
                    if matches!(e, FlowcError::AugmentationCancelled) {
                        break;
                    }
                }
            }
        }

        Ok(Augmented {
            program: current,
            warnings,
            semantic,
            applied,
        })
    }

    async fn apply(&self, program: &Program, request: &AugmentRequest) -> Result<Option<Analysis>> {
        let Some(reply) = self.call(request).await? else {
            return Ok(None);
        };
        let Some(fragment) = extract_fragment(&reply) else {
            return Ok(None);
        };

        let merged = merge(program, &request.key, &fragment)?;
        analyze(merged)
            .map(Some)
            .map_err(|e| FlowcError::AugmentationMalformed {
                reason: e.to_string(),
            })
    }

    async fn call(&self, request: &AugmentRequest) -> Result<Option<String>> {
        let budget = self.augmenter.time_budget(self.timeout);
        let rewrite = tokio::time::timeout(budget, self.augmenter.rewrite(request));
        tokio::select! {
            _ = self.cancel.cancelled() => Err(FlowcError::AugmentationCancelled),
            result = rewrite => match result {
                Ok(reply) => reply,
                Err(_) => Err(FlowcError::AugmentationTimeout {
                    timeout_ms: budget.as_millis() as u64,
                }),
            },
        }
    }
}
