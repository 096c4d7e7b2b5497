//! Compilation pipeline
//!
//! Drives one compilation unit through every stage:
//!
//! ```text
//! normalize → tokenize → parse → analyze → [augment] → validate → optimize
//! ```
//!
//! The front half is synchronous. Augmentation is the only suspension point,
//! so `compile_str` skips it and `compile_source` runs it when an augmenter
//! is configured. Units share nothing; `compile_many` spawns one task each.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::ast::Program;
use crate::augment::{Augmentation, Augmenter, HttpAugmenter};
use crate::config::FlowcConfig;
use crate::dag::Validator;
use crate::emit::{self, EmitOptions, SourceInfo};
use crate::error::{FlowcError, Result};
use crate::findings::Finding;
use crate::lex::{normalize, tokenize};
use crate::optimize::optimize;
use crate::parse::parse;
use crate::sema::analyze;

/// Result of a successful compilation
#[derive(Debug, Clone)]
pub struct Compilation {
    /// The optimized program
    pub program: Program,
    /// Semantic, augmentation and validation warnings, in stage order
    pub warnings: Vec<Finding>,
    pub source: SourceInfo,
}

impl Compilation {
    pub fn render(&self, options: &EmitOptions) -> Result<String> {
        emit::emit(&self.program, &self.warnings, &self.source, options)
    }
}

/// Front half output: analyzed but not yet validated
struct Analyzed {
    program: Program,
    warnings: Vec<Finding>,
    source: SourceInfo,
}

pub struct Compiler {
    config: FlowcConfig,
    augmenter: Option<Arc<dyn Augmenter>>,
    /// Aborts outstanding augmentation requests of every unit
    cancel: CancellationToken,
}

impl Compiler {
    /// Compiler without augmentation
    pub fn new(config: FlowcConfig) -> Self {
        Self {
            config,
            augmenter: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Compiler wired from config: an HTTP augmenter when `augment.enabled`
    pub fn from_config(config: FlowcConfig) -> Result<Self> {
        let augmenter: Option<Arc<dyn Augmenter>> = if config.augment.enabled {
            Some(Arc::new(HttpAugmenter::from_config(&config.augment)?))
        } else {
            None
        };
        Ok(Self {
            config,
            augmenter,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_augmenter(mut self, augmenter: Arc<dyn Augmenter>) -> Self {
        self.augmenter = Some(augmenter);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancelling this token degrades any augmentation still in flight
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &FlowcConfig {
        &self.config
    }

    /// Compile in-memory source without augmentation
    pub fn compile_str(&self, name: &str, source: &str) -> Result<Compilation> {
        let analyzed = self.front(name, source)?;
        self.back(analyzed)
    }

    /// Compile in-memory source, augmenting when an augmenter is set
    pub async fn compile_source(&self, name: &str, source: &str) -> Result<Compilation> {
        let mut analyzed = self.front(name, source)?;

        if let Some(augmenter) = &self.augmenter {
            let augmentation = Augmentation::new(Arc::clone(augmenter))
                .with_timeout(Duration::from_secs(self.config.augment.timeout_secs))
                .mandatory(self.config.augment.mandatory)
                .with_cancellation(self.cancel.clone());
            let augmented = augmentation.run(analyzed.program).await?;
            tracing::debug!(
                unit = name,
                applied = augmented.applied,
                degraded = augmented.warnings.len(),
                "augmentation finished"
            );
            // Merged fragments were re-analyzed; their findings supersede the originals
            if let Some(semantic) = augmented.semantic {
                analyzed.warnings = semantic;
                analyzed.source.recount(&augmented.program);
            }
            analyzed.program = augmented.program;
            analyzed.warnings.extend(augmented.warnings);
        }

        self.back(analyzed)
    }

    /// Read and compile one file
    pub async fn compile_file(&self, path: &Path) -> Result<Compilation> {
        let source = self.read_source(path).await?;
        let name = path.display().to_string();
        self.compile_source(&name, &source).await
    }

    /// Compile independent files in parallel; results keep input order
    pub async fn compile_many(
        self: Arc<Self>,
        paths: Vec<PathBuf>,
    ) -> Vec<(PathBuf, Result<Compilation>)> {
        let mut set = JoinSet::new();
        for (index, path) in paths.iter().cloned().enumerate() {
            let compiler = Arc::clone(&self);
            set.spawn(async move {
                let result = compiler.compile_file(&path).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<Compilation>>> = paths.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "compilation task failed to join"),
            }
        }

        paths
            .into_iter()
            .zip(slots)
            .map(|(path, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(FlowcError::Io {
                        path: path.display().to_string(),
                        reason: "compilation task aborted".to_string(),
                    })
                });
                (path, result)
            })
            .collect()
    }

    async fn read_source(&self, path: &Path) -> Result<String> {
        let display = path.display().to_string();
        let io_error = |e: std::io::Error| FlowcError::Io {
            path: display.clone(),
            reason: e.to_string(),
        };

        let size = tokio::fs::metadata(path).await.map_err(io_error)?.len();
        let limit = self.config.compile.max_file_size;
        if size > limit {
            return Err(FlowcError::FileTooLarge {
                path: display,
                size,
                limit,
            });
        }

        let bytes = tokio::fs::read(path).await.map_err(io_error)?;
        String::from_utf8(bytes).map_err(|_| FlowcError::InvalidEncoding { path: display })
    }

    fn front(&self, name: &str, source: &str) -> Result<Analyzed> {
        let normalized = normalize(source);
        let tokens = tokenize(&normalized)?;
        tracing::debug!(unit = name, tokens = tokens.len(), "tokenized");

        let program = parse(&tokens)?;
        tracing::debug!(
            unit = name,
            tasks = program.tasks.len(),
            variables = program.variables.len(),
            "parsed"
        );

        let analysis = analyze(program)?;
        tracing::debug!(
            unit = name,
            variables = analysis.symbols.variable_count(),
            warnings = analysis.warnings.len(),
            "analyzed"
        );

        Ok(Analyzed {
            program: analysis.program,
            warnings: analysis.warnings,
            source: SourceInfo::new(name, &normalized, tokens.directive_counts()),
        })
    }

    fn back(&self, analyzed: Analyzed) -> Result<Compilation> {
        let Analyzed {
            program,
            mut warnings,
            source,
        } = analyzed;

        let report = Validator::new(self.config.compile.strict).validate(&program);
        tracing::debug!(
            unit = %source.name,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "validated"
        );
        if !report.is_valid() {
            return Err(FlowcError::Validation { report });
        }
        warnings.extend(report.warnings);

        let optimized = optimize(&program)?;
        tracing::info!(
            unit = %source.name,
            tasks = optimized.tasks.len(),
            removed = program.tasks.len().saturating_sub(optimized.tasks.len()),
            warnings = warnings.len(),
            "compiled"
        );

        Ok(Compilation {
            program: optimized,
            warnings,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::{AugmentKey, MockAugmenter};
    use crate::error::ErrorCategory;
    use crate::lex::DirectiveKind;
    use pretty_assertions::assert_eq;

    fn compiler() -> Compiler {
        Compiler::new(FlowcConfig::default())
    }

    // ═══════════════════════════════════════════════════════════════
    // STAGES
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_compile_str_runs_every_stage() {
        let c = compiler()
            .compile_str("a.flow", "@var x = 5\n@task a\n    @if x == 5\n        @next END\n    @else\n        @next b\n@task b\n    unused\n")
            .unwrap();
        assert_eq!(c.program.tasks.len(), 1);
        assert_eq!(c.source.name, "a.flow");
    }

    #[test]
    fn test_lexical_error_stops_pipeline() {
        let err = compiler().compile_str("a.flow", "@bogus\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Lexical);
    }

    #[test]
    fn test_validation_errors_abort() {
        let err = compiler()
            .compile_str("a.flow", "@task a\n    @next nowhere\n")
            .unwrap_err();
        match err {
            FlowcError::Validation { report } => {
                assert_eq!(report.errors[0].kind.name(), "unknown_jump_target");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_lenient_mode_keeps_unreachable_as_warning() {
        let mut config = FlowcConfig::default();
        config.compile.strict = false;
        let c = Compiler::new(config)
            .compile_str("a.flow", "@task a\n    @next END\n@task b\n    @next END\n")
            .unwrap();
        assert!(c.warnings.iter().any(|w| w.kind.name() == "unreachable_task"));
    }

    // ═══════════════════════════════════════════════════════════════
    // AUGMENTATION
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_compile_source_applies_augmenter() {
        let mock = MockAugmenter::new().with_reply(
            AugmentKey::Task("a".to_string()),
            "```\n@tool lookup\n@next END\n```",
        );
        let c = compiler()
            .with_augmenter(Arc::new(mock.clone()))
            .compile_source("a.flow", "@task a\n    look up the order\n")
            .await
            .unwrap();
        assert_eq!(mock.request_count(), 1);
        assert_eq!(c.program.declarations[0].name, "lookup");
    }

    #[tokio::test]
    async fn test_merged_fragment_findings_reach_result() {
        let mock = MockAugmenter::new().with_reply(
            AugmentKey::Task("b".to_string()),
            "@tool search local files\n@next END",
        );
        let source = "@task a\n    @tool search the web\n    @next b\n@task b\n    find it locally\n";
        let c = compiler()
            .with_augmenter(Arc::new(mock))
            .compile_source("a.flow", source)
            .await
            .unwrap();

        let names: Vec<_> = c.warnings.iter().map(|w| w.kind.name()).collect();
        assert_eq!(names, vec!["conflicting_declaration"]);
        assert_eq!(c.source.directive_counts[&DirectiveKind::Tool], 2);
        assert_eq!(c.source.directive_counts[&DirectiveKind::Next], 2);
    }

    #[tokio::test]
    async fn test_cancelled_compiler_skips_augmentation() {
        let mock = MockAugmenter::new().with_delay(Duration::from_millis(200));
        let compiler = compiler().with_augmenter(Arc::new(mock));
        compiler.cancellation_token().cancel();

        let c = compiler
            .compile_source("a.flow", "@task a\n    look up the order\n")
            .await
            .unwrap();
        let names: Vec<_> = c.warnings.iter().map(|w| w.kind.name()).collect();
        assert_eq!(names, vec!["augmentation_degraded"]);
        assert!(c.warnings[0].to_string().contains("cancel"));
    }

    #[tokio::test]
    async fn test_failing_augmenter_degrades() {
        let c = compiler()
            .with_augmenter(Arc::new(MockAugmenter::failing("offline")))
            .compile_source("a.flow", "@task a\n    look up the order\n")
            .await
            .unwrap();
        assert!(c.warnings.iter().any(|w| w.kind.name() == "augmentation_degraded"));
    }

    // ═══════════════════════════════════════════════════════════════
    // FILES
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_file_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.flow");
        std::fs::write(&path, "@task a\n    @next END\n").unwrap();

        let mut config = FlowcConfig::default();
        config.compile.max_file_size = 4;
        let err = Compiler::new(config).compile_file(&path).await.unwrap_err();
        assert_eq!(err.code(), "FLOWC-113");
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.flow");
        std::fs::write(&path, [0x40, 0xff, 0xfe, 0x0a]).unwrap();
        let err = compiler().compile_file(&path).await.unwrap_err();
        assert_eq!(err.code(), "FLOWC-112");
    }

    #[tokio::test]
    async fn test_compile_many_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.flow");
        let bad = dir.path().join("bad.flow");
        std::fs::write(&good, "@task a\n    @next END\n").unwrap();
        std::fs::write(&bad, "@task a\n    @next nowhere\n").unwrap();
        let missing = dir.path().join("missing.flow");

        let results = Arc::new(compiler())
            .compile_many(vec![bad.clone(), good.clone(), missing.clone()])
            .await;

        assert_eq!(results[0].0, bad);
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
        assert_eq!(results[2].1.as_ref().unwrap_err().code(), "FLOWC-111");
    }
}
