//! Conversion pipeline
//!
//! Drives one document through
//! `Validating -> Sanitizing -> Chunking -> (Optimizing) -> Synthesizing[i]
//! -> Assembling -> CleaningUp -> Done | Failed`.
//!
//! Every temporary segment is tracked from the moment it is created and is
//! removed before the outcome is returned, whichever way the run ends.

pub mod artifacts;
pub mod progress;

pub use artifacts::RunArtifacts;
pub use progress::{
    bands, ChannelProgress, LogProgress, NoProgress, ProgressEvent, ProgressReporter,
    ProgressTracker, StderrProgress, Stage,
};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;

use crate::audio::{AssemblyError, AudioAssembler};
use crate::optimize::Optimizer;
use crate::text::{self, Chunk, SymbolSet, TextError};
use crate::tts::{Language, SpeechProvider, TtsError};

/// Source name used when the document was pasted rather than read from a file.
pub const PASTED_SOURCE_NAME: &str = "markdown_text.md";

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Text(#[from] TextError),

    #[error("Speech synthesis failed for chunk {index}: {source}")]
    Synthesis {
        index: usize,
        #[source]
        source: TtsError,
    },

    #[error("Audio assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credential for an optimization pass.
#[derive(Clone)]
pub struct OptimizeRequest {
    pub credential: String,
}

impl fmt::Debug for OptimizeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizeRequest")
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Raw Markdown
    pub document_text: String,
    /// File name of the document, or [`PASTED_SOURCE_NAME`]
    pub source_name: String,
    /// Language code or name, e.g. `en` or `zh-cn`
    pub language: String,
    pub chunk_size: usize,
    pub excluded_symbols: SymbolSet,
    /// Run the optimizer with this credential
    pub optimize: Option<OptimizeRequest>,
    /// Optimized text from an earlier run; used as-is instead of optimizing again
    pub optimized_text: Option<String>,
}

impl PipelineRequest {
    pub fn new(document_text: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            document_text: document_text.into(),
            source_name: source_name.into(),
            language: Language::default().code().to_string(),
            chunk_size: 1000,
            excluded_symbols: SymbolSet::new(),
            optimize: None,
            optimized_text: None,
        }
    }

    /// Stem of the output file name.
    fn output_stem(&self) -> String {
        Path::new(&self.source_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "speech".to_string())
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    Done {
        output_path: PathBuf,
        warnings: Vec<String>,
        /// Optimized text, when optimization ran or was supplied
        optimized_text: Option<String>,
    },
    Failed {
        stage: Stage,
        error: PipelineError,
        warnings: Vec<String>,
        optimized_text: Option<String>,
    },
}

impl PipelineOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, PipelineOutcome::Done { .. })
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            PipelineOutcome::Done { warnings, .. } | PipelineOutcome::Failed { warnings, .. } => {
                warnings
            }
        }
    }

    /// Optimized text worth passing back in on a retry.
    pub fn optimized_text(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Done { optimized_text, .. }
            | PipelineOutcome::Failed { optimized_text, .. } => optimized_text.as_deref(),
        }
    }
}

type StageResult<T> = std::result::Result<T, (Stage, PipelineError)>;

/// Mutable state threaded through one run.
struct RunState<'a> {
    tracker: ProgressTracker<'a>,
    artifacts: RunArtifacts,
    warnings: Vec<String>,
    optimized_text: Option<String>,
}

/// Orchestrates the conversion stages.
pub struct Pipeline {
    synthesizer: Arc<dyn SpeechProvider>,
    assembler: AudioAssembler,
    optimizer: Option<Optimizer>,
    work_dir: PathBuf,
    output_dir: PathBuf,
}

impl Pipeline {
    /// Segments are written next to the output unless a work dir is set.
    pub fn new(
        synthesizer: Arc<dyn SpeechProvider>,
        assembler: AudioAssembler,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            synthesizer,
            assembler,
            optimizer: None,
            work_dir: output_dir.clone(),
            output_dir,
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    /// Run the pipeline to completion. Never panics on stage failures; the
    /// outcome says which stage failed and why.
    pub async fn run(
        &self,
        request: PipelineRequest,
        reporter: &dyn ProgressReporter,
    ) -> PipelineOutcome {
        let run_id = uuid::Uuid::new_v4();
        let mut state = RunState {
            tracker: ProgressTracker::new(reporter),
            artifacts: RunArtifacts::new(),
            warnings: Vec::new(),
            optimized_text: None,
        };

        tracing::info!(
            run_id = %run_id,
            source = %request.source_name,
            provider = self.synthesizer.name(),
            "Conversion started"
        );

        let result = self.execute(&request, run_id, &mut state).await;

        state
            .tracker
            .emit(Stage::CleaningUp, bands::CLEANING_UP, "Removing temporary files");
        let cleanup_warnings = state.artifacts.cleanup().await;
        state.warnings.extend(cleanup_warnings);

        match result {
            Ok(output_path) => {
                state.tracker.emit(
                    Stage::Done,
                    bands::DONE,
                    format!("Audio written to {}", output_path.display()),
                );
                tracing::info!(
                    run_id = %run_id,
                    output = %output_path.display(),
                    warnings = state.warnings.len(),
                    "Conversion finished"
                );
                PipelineOutcome::Done {
                    output_path,
                    warnings: state.warnings,
                    optimized_text: state.optimized_text,
                }
            }
            Err((stage, error)) => {
                let percent = state.tracker.current();
                state
                    .tracker
                    .emit(Stage::Failed, percent, format!("Failed while {}: {}", stage, error));
                tracing::error!(run_id = %run_id, stage = %stage, error = %error, "Conversion failed");
                PipelineOutcome::Failed {
                    stage,
                    error,
                    warnings: state.warnings,
                    optimized_text: state.optimized_text,
                }
            }
        }
    }

    async fn execute(
        &self,
        request: &PipelineRequest,
        run_id: uuid::Uuid,
        state: &mut RunState<'_>,
    ) -> StageResult<PathBuf> {
        // Validating
        state
            .tracker
            .emit(Stage::Validating, bands::VALIDATING, "Validating request");
        let language = validate(request).map_err(|e| (Stage::Validating, e))?;

        // Sanitizing
        state
            .tracker
            .emit(Stage::Sanitizing, bands::SANITIZING_START, "Extracting text");
        let extracted = text::markdown_to_text(&request.document_text);
        let sanitized = text::sanitize(&extracted, &request.excluded_symbols);
        if sanitized.trim().is_empty() {
            return Err((
                Stage::Sanitizing,
                PipelineError::Validation("Document has no speakable text".to_string()),
            ));
        }
        state.tracker.emit(
            Stage::Sanitizing,
            bands::SANITIZING_END,
            format!("Sanitized {} characters", sanitized.chars().count()),
        );

        // Chunking
        let mut chunks = text::split(&sanitized, request.chunk_size)
            .map_err(|e| (Stage::Chunking, PipelineError::from(e)))?;
        state.tracker.emit(
            Stage::Chunking,
            bands::CHUNKING,
            format!("Split into {} chunk(s)", chunks.len()),
        );

        // Optimizing
        if let Some(optimized) = self.resolve_optimized_text(request, &sanitized, state).await {
            chunks = text::split(&optimized, request.chunk_size)
                .map_err(|e| (Stage::Chunking, PipelineError::from(e)))?;
            state.optimized_text = Some(optimized);
        }

        // Synthesizing
        let segments = self
            .synthesize_all(&chunks, language, &request.output_stem(), run_id, state)
            .await?;

        // Assembling
        state
            .tracker
            .emit(Stage::Assembling, bands::ASSEMBLING, "Combining audio segments");
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| (Stage::Assembling, PipelineError::from(e)))?;
        let output = self.output_dir.join(format!("{}.mp3", request.output_stem()));
        self.assembler
            .assemble(&segments, &output)
            .await
            .map_err(|e| (Stage::Assembling, PipelineError::from(e)))
    }

    /// Optimized text for this run, if any. Failures degrade to `None` with a
    /// warning.
    async fn resolve_optimized_text(
        &self,
        request: &PipelineRequest,
        sanitized: &str,
        state: &mut RunState<'_>,
    ) -> Option<String> {
        if let Some(previous) = request
            .optimized_text
            .as_ref()
            .filter(|t| !t.trim().is_empty())
        {
            let percent = self
                .optimizer
                .as_ref()
                .map(|o| o.progress_bounds().1)
                .unwrap_or(bands::CHUNKING);
            state
                .tracker
                .emit(Stage::Optimizing, percent, "Using previously optimized text");
            return Some(previous.clone());
        }

        let optimize = request.optimize.as_ref()?;

        let Some(optimizer) = &self.optimizer else {
            let warning = "Optimization requested but no optimizer is configured; using original text";
            tracing::warn!("{}", warning);
            state.warnings.push(warning.to_string());
            return None;
        };

        let tracker = &state.tracker;
        let report = |percent: u8| tracker.emit(Stage::Optimizing, percent, "Optimizing text for speech");

        match optimizer
            .optimize(sanitized, &optimize.credential, &report)
            .await
        {
            Ok(optimized) => Some(optimized),
            Err(e) => {
                tracing::warn!(error = %e, "Text optimization failed, continuing with original text");
                state
                    .warnings
                    .push(format!("Text optimization failed, used original text: {}", e));
                None
            }
        }
    }

    async fn synthesize_all(
        &self,
        chunks: &[Chunk],
        language: Language,
        stem: &str,
        run_id: uuid::Uuid,
        state: &mut RunState<'_>,
    ) -> StageResult<Vec<PathBuf>> {
        let total = chunks.len();
        let first_stage = Stage::Synthesizing { index: 0, total };

        fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| (first_stage, PipelineError::from(e)))?;

        let mut segments = Vec::with_capacity(total);
        for chunk in chunks {
            let stage = Stage::Synthesizing {
                index: chunk.index,
                total,
            };
            state.tracker.emit(
                stage,
                bands::synthesizing(chunk.index, total),
                format!("Synthesizing chunk {} of {}", chunk.index + 1, total),
            );

            if chunk.text.trim().is_empty() {
                tracing::debug!(chunk = chunk.index, "Skipping blank chunk");
                continue;
            }

            let audio = self
                .synthesizer
                .synthesize(&chunk.text, language)
                .await
                .map_err(|source| {
                    (
                        stage,
                        PipelineError::Synthesis {
                            index: chunk.index,
                            source,
                        },
                    )
                })?;

            let path = self
                .work_dir
                .join(format!("{}.{}.part{}.mp3", stem, run_id, segments.len()));
            state.artifacts.track(&path);
            fs::write(&path, &audio)
                .await
                .map_err(|e| (stage, PipelineError::from(e)))?;

            tracing::debug!(chunk = chunk.index, bytes = audio.len(), "Segment written");
            segments.push(path);
        }

        state.tracker.emit(
            Stage::Synthesizing {
                index: total.saturating_sub(1),
                total,
            },
            bands::SYNTHESIZING_END,
            format!("Synthesized {} chunk(s)", total),
        );
        Ok(segments)
    }
}

fn validate(request: &PipelineRequest) -> Result<Language, PipelineError> {
    if request.chunk_size == 0 {
        return Err(TextError::InvalidChunkSize.into());
    }
    if request.document_text.trim().is_empty() {
        return Err(PipelineError::Validation("Document is empty".to_string()));
    }
    request
        .language
        .parse::<Language>()
        .map_err(|e| PipelineError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use crate::text::Symbol;

    /// Returns the chunk text as "audio" and records what it was asked.
    #[derive(Default)]
    struct EchoSynth {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechProvider for EchoSynth {
        async fn synthesize(&self, text: &str, _language: Language) -> crate::tts::Result<Vec<u8>> {
            self.calls.lock().unwrap().push(text.to_string());
            Ok(text.as_bytes().to_vec())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn pipeline(synth: Arc<EchoSynth>, dir: &Path) -> Pipeline {
        Pipeline::new(synth, AudioAssembler::new("/nonexistent/ffmpeg"), dir)
    }

    #[tokio::test]
    async fn test_validation_rejects_zero_chunk_size() {
        let dir = TempDir::new().unwrap();
        let synth = Arc::new(EchoSynth::default());
        let mut request = PipelineRequest::new("hello", "doc.md");
        request.chunk_size = 0;

        let outcome = pipeline(synth.clone(), dir.path()).run(request, &NoProgress).await;

        match outcome {
            PipelineOutcome::Failed { stage, error, .. } => {
                assert_eq!(stage, Stage::Validating);
                assert!(matches!(error, PipelineError::Text(TextError::InvalidChunkSize)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(synth.calls.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_validation_rejects_unknown_language() {
        let dir = TempDir::new().unwrap();
        let mut request = PipelineRequest::new("hello", "doc.md");
        request.language = "tlh".to_string();

        let outcome = pipeline(Arc::new(EchoSynth::default()), dir.path())
            .run(request, &NoProgress)
            .await;

        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                stage: Stage::Validating,
                error: PipelineError::Validation(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_symbols_only_document_fails_in_sanitizing() {
        let dir = TempDir::new().unwrap();
        let mut request = PipelineRequest::new("***\n\n| | |", "doc.md");
        request.excluded_symbols = SymbolSet::all();

        let outcome = pipeline(Arc::new(EchoSynth::default()), dir.path())
            .run(request, &NoProgress)
            .await;

        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                stage: Stage::Sanitizing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_supplied_optimized_text_is_used() {
        let dir = TempDir::new().unwrap();
        let synth = Arc::new(EchoSynth::default());
        let mut request = PipelineRequest::new("# Original", "notes.md");
        request.optimized_text = Some("Already optimized".to_string());

        let outcome = pipeline(synth.clone(), dir.path()).run(request, &NoProgress).await;

        assert!(outcome.is_done());
        assert_eq!(outcome.optimized_text(), Some("Already optimized"));
        assert_eq!(*synth.calls.lock().unwrap(), vec!["Already optimized"]);
    }

    #[tokio::test]
    async fn test_optimize_without_optimizer_warns() {
        let dir = TempDir::new().unwrap();
        let mut request = PipelineRequest::new("Hello", "doc.md");
        request.optimize = Some(OptimizeRequest {
            credential: "sk-test".to_string(),
        });

        let outcome = pipeline(Arc::new(EchoSynth::default()), dir.path())
            .run(request, &NoProgress)
            .await;

        assert!(outcome.is_done());
        assert_eq!(outcome.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_chunks_are_skipped() {
        let dir = TempDir::new().unwrap();
        let synth = Arc::new(EchoSynth::default());
        let mut request = PipelineRequest::new("abcd====", "rule.md");
        request.excluded_symbols = [Symbol::Equals].into_iter().collect();
        request.chunk_size = 4;

        let outcome = pipeline(synth.clone(), dir.path()).run(request, &NoProgress).await;

        assert!(outcome.is_done(), "{outcome:?}");
        assert_eq!(*synth.calls.lock().unwrap(), vec!["abcd"]);
        assert_eq!(std::fs::read(dir.path().join("rule.mp3")).unwrap(), b"abcd");
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(PipelineRequest::new("x", "docs/guide.md").output_stem(), "guide");
        assert_eq!(PipelineRequest::new("x", PASTED_SOURCE_NAME).output_stem(), "markdown_text");
        assert_eq!(PipelineRequest::new("x", "").output_stem(), "speech");
    }

    #[test]
    fn test_credential_redacted_in_debug() {
        let request = OptimizeRequest {
            credential: "sk-secret".to_string(),
        };
        assert!(!format!("{:?}", request).contains("sk-secret"));
    }
}
