//! The pipeline orchestrator.
//!
//! [`CodePipeline`] sequences condense, retrieve, budget, synthesize, parse
//! and critique, then assembles a [`PipelineResult`]. The blocking
//! [`CodePipeline::run`] and the async [`CodePipeline::run_async`] share one
//! per-invocation `Invocation` that owns validation, state transitions,
//! budgeting and assembly; the two paths differ only in how they wait on the
//! language model and the fetcher.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use coderag_config::{AppConfig, PipelineConfig};

use crate::chat::{HistoryFormatter, formatter_for};
use crate::llm::create_provider;
use crate::model::{LanguageModel, ProviderModel};
use crate::prompt::PromptSet;
use crate::store::{Document, DocumentStore};

use super::budget::ContextBudgeter;
use super::condense::{CondensedQuery, QueryCondenser};
use super::critic::{SafetyCritic, SafetyVerdict};
use super::error::{BuildError, PipelineError, Stage};
use super::fetch::{DocumentFetcher, StoreFetcher};
use super::parse::{OutputParser, ParsedOutput};
use super::result::{PipelineRequest, PipelineResult};
use super::synthesize::AnswerSynthesizer;

/// Per-pipeline behavior switches.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Token ceiling for retrieved context; `None` disables trimming.
    pub max_context_tokens: Option<usize>,
    pub include_source_documents: bool,
    pub include_generated_question: bool,
    pub include_safety_verdict: bool,
    /// Removed from the condensed query before it is shown as the generated
    /// question.
    pub leak_terms: Vec<String>,
    /// Language tag expected after the opening code fence.
    pub code_language: String,
    pub document_separator: String,
    pub history_formatter: HistoryFormatter,
    /// Fail with [`PipelineError::NoContext`] rather than synthesize from an
    /// empty context.
    pub require_context: bool,
}

impl PipelineOptions {
    pub fn with_history_formatter(mut self, formatter: HistoryFormatter) -> Self {
        self.history_formatter = formatter;
        self
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_context_tokens: config.max_context_tokens,
            include_source_documents: config.include_source_documents,
            include_generated_question: config.include_generated_question,
            include_safety_verdict: config.include_safety_verdict,
            leak_terms: config.leak_terms.clone(),
            code_language: config.code_language.clone(),
            document_separator: config.document_separator.clone(),
            history_formatter: formatter_for(config.history_format),
            require_context: config.require_context,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("max_context_tokens", &self.max_context_tokens)
            .field("include_source_documents", &self.include_source_documents)
            .field("include_generated_question", &self.include_generated_question)
            .field("include_safety_verdict", &self.include_safety_verdict)
            .field("leak_terms", &self.leak_terms)
            .field("code_language", &self.code_language)
            .field("document_separator", &self.document_separator)
            .field("require_context", &self.require_context)
            .finish_non_exhaustive()
    }
}

/// Where an invocation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Condensing,
    Retrieving,
    Budgeting,
    Synthesizing,
    Parsing,
    Critiquing,
    Assembled,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Received => "received",
            PipelineState::Condensing => "condensing",
            PipelineState::Retrieving => "retrieving",
            PipelineState::Budgeting => "budgeting",
            PipelineState::Synthesizing => "synthesizing",
            PipelineState::Parsing => "parsing",
            PipelineState::Critiquing => "critiquing",
            PipelineState::Assembled => "assembled",
        };
        f.write_str(name)
    }
}

/// Conversational retrieval-augmented code generation with a safety gate.
///
/// Stateless across invocations: all per-call data lives in the request and
/// the returned result, so one pipeline can serve concurrent callers.
pub struct CodePipeline {
    answer_model: Arc<dyn LanguageModel>,
    condense_model: Arc<dyn LanguageModel>,
    critic_model: Arc<dyn LanguageModel>,
    fetcher: Arc<dyn DocumentFetcher>,
    condenser: QueryCondenser,
    budgeter: ContextBudgeter,
    synthesizer: AnswerSynthesizer,
    parser: OutputParser,
    critic: SafetyCritic,
    options: PipelineOptions,
}

impl CodePipeline {
    pub fn builder() -> CodePipelineBuilder {
        CodePipelineBuilder::default()
    }

    /// Assemble a pipeline from configuration: provider-backed models (with
    /// the per-stage overrides), prompt templates and options.
    pub async fn from_config(
        config: &AppConfig,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Result<Self, BuildError> {
        let provider = create_provider(&config.llm);
        let answer: Arc<dyn LanguageModel> =
            Arc::new(ProviderModel::from_config(provider.clone(), &config.llm, None));

        let mut builder = Self::builder()
            .answer_model(answer)
            .fetcher(fetcher)
            .prompts(PromptSet::load(&config.prompts).await?)
            .options(PipelineOptions::from(&config.pipeline));

        if let Some(model) = &config.llm.condense_model {
            builder = builder.condense_model(Arc::new(ProviderModel::from_config(
                provider.clone(),
                &config.llm,
                Some(model.as_str()),
            )));
        }
        if let Some(model) = &config.llm.critic_model {
            builder = builder.critic_model(Arc::new(ProviderModel::from_config(
                provider,
                &config.llm,
                Some(model.as_str()),
            )));
        }

        builder.build()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run one invocation, blocking the calling thread on every service call.
    pub fn run(&self, request: &PipelineRequest) -> Result<PipelineResult, PipelineError> {
        let mut inv = Invocation::start(self, request, "blocking")?;

        inv.enter(PipelineState::Condensing);
        let query = self
            .condenser
            .condense(
                self.condense_model.as_ref(),
                &request.question,
                &request.chat_history,
            )
            .map_err(PipelineError::at(Stage::Condense))?;

        inv.enter(PipelineState::Retrieving);
        let documents = self
            .fetcher
            .fetch(&query)
            .map_err(PipelineError::at(Stage::Retrieve))?;

        let documents = inv.budget(documents)?;

        inv.enter(PipelineState::Synthesizing);
        let raw = self
            .synthesizer
            .synthesize(
                self.answer_model.as_ref(),
                &query,
                &documents,
                &inv.chat_history,
            )
            .map_err(PipelineError::at(Stage::Synthesize))?;

        let parsed = inv.parse(&raw);
        let verdict = match parsed.code.as_deref() {
            Some(code) => {
                inv.enter(PipelineState::Critiquing);
                self.critic
                    .critique(self.critic_model.as_ref(), code)
                    .map_err(PipelineError::at(Stage::Critique))?
            }
            None => inv.skip_critique(),
        };

        Ok(inv.assemble(&query, documents, parsed, verdict))
    }

    /// Run one invocation on the async runtime.
    ///
    /// Dropping the returned future cancels the invocation; nothing is
    /// observable from a cancelled run.
    pub async fn run_async(
        &self,
        request: &PipelineRequest,
    ) -> Result<PipelineResult, PipelineError> {
        let mut inv = Invocation::start(self, request, "async")?;

        inv.enter(PipelineState::Condensing);
        let query = self
            .condenser
            .condense_async(
                self.condense_model.as_ref(),
                &request.question,
                &request.chat_history,
            )
            .await
            .map_err(PipelineError::at(Stage::Condense))?;

        inv.enter(PipelineState::Retrieving);
        let documents = self
            .fetcher
            .fetch_async(&query)
            .await
            .map_err(PipelineError::at(Stage::Retrieve))?;

        let documents = inv.budget(documents)?;

        inv.enter(PipelineState::Synthesizing);
        let raw = self
            .synthesizer
            .synthesize_async(
                self.answer_model.as_ref(),
                &query,
                &documents,
                &inv.chat_history,
            )
            .await
            .map_err(PipelineError::at(Stage::Synthesize))?;

        let parsed = inv.parse(&raw);
        let verdict = match parsed.code.as_deref() {
            Some(code) => {
                inv.enter(PipelineState::Critiquing);
                self.critic
                    .critique_async(self.critic_model.as_ref(), code)
                    .await
                    .map_err(PipelineError::at(Stage::Critique))?
            }
            None => inv.skip_critique(),
        };

        Ok(inv.assemble(&query, documents, parsed, verdict))
    }
}

/// State of one invocation, shared by both entry points.
struct Invocation<'p> {
    pipeline: &'p CodePipeline,
    state: PipelineState,
    chat_history: String,
    started: Instant,
}

impl<'p> Invocation<'p> {
    fn start(
        pipeline: &'p CodePipeline,
        request: &PipelineRequest,
        mode: &'static str,
    ) -> Result<Self, PipelineError> {
        if request.question.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "question must not be empty".to_string(),
            ));
        }

        info!(
            mode,
            history_turns = request.chat_history.len(),
            "pipeline invocation started"
        );

        Ok(Self {
            pipeline,
            state: PipelineState::Received,
            chat_history: (pipeline.options.history_formatter)(&request.chat_history),
            started: Instant::now(),
        })
    }

    fn enter(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "pipeline state transition");
        self.state = next;
    }

    fn budget(&mut self, documents: Vec<Document>) -> Result<Vec<Document>, PipelineError> {
        self.enter(PipelineState::Budgeting);
        let retrieved = documents.len();
        let documents = self
            .pipeline
            .budgeter
            .reduce(documents, self.pipeline.answer_model.as_ref());

        if documents.is_empty() {
            if self.pipeline.options.require_context {
                return Err(PipelineError::NoContext { retrieved });
            }
            warn!(retrieved, "synthesizing without any retrieved context");
        }
        Ok(documents)
    }

    fn parse(&mut self, raw: &str) -> ParsedOutput {
        self.enter(PipelineState::Parsing);
        let parsed = self.pipeline.parser.parse(raw);
        if !parsed.has_code() {
            debug!(
                language = %self.pipeline.options.code_language,
                "no usable code block in the answer"
            );
        }
        parsed
    }

    fn skip_critique(&self) -> SafetyVerdict {
        debug!("no code to review, skipping the critic");
        SafetyVerdict::Unsafe
    }

    fn assemble(
        mut self,
        query: &CondensedQuery,
        documents: Vec<Document>,
        parsed: ParsedOutput,
        verdict: SafetyVerdict,
    ) -> PipelineResult {
        self.enter(PipelineState::Assembled);
        let options = &self.pipeline.options;

        let has_code = parsed.has_code();
        let mut result = PipelineResult::new(parsed.code, parsed.explanation, verdict);
        if options.include_source_documents {
            result = result.with_source_documents(documents);
        }
        if options.include_generated_question {
            result = result.with_generated_question(query.sanitized(&options.leak_terms));
        }
        if options.include_safety_verdict {
            result = result.with_safety_verdict(verdict);
        }

        info!(
            has_code,
            %verdict,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "pipeline invocation finished"
        );
        result
    }
}

/// Builder for [`CodePipeline`].
#[derive(Default)]
pub struct CodePipelineBuilder {
    answer_model: Option<Arc<dyn LanguageModel>>,
    condense_model: Option<Arc<dyn LanguageModel>>,
    critic_model: Option<Arc<dyn LanguageModel>>,
    fetcher: Option<Arc<dyn DocumentFetcher>>,
    prompts: PromptSet,
    options: PipelineOptions,
}

impl CodePipelineBuilder {
    /// Model used for synthesis, token counting and any stage without its
    /// own model.
    pub fn answer_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.answer_model = Some(model);
        self
    }

    pub fn condense_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.condense_model = Some(model);
        self
    }

    pub fn critic_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.critic_model = Some(model);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Retrieve straight from `store`.
    pub fn store(self, store: Arc<dyn DocumentStore>) -> Self {
        self.fetcher(Arc::new(StoreFetcher::new(store)))
    }

    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<CodePipeline, BuildError> {
        let answer_model = self
            .answer_model
            .ok_or_else(|| BuildError::Config("an answer model is required".to_string()))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| BuildError::Config("a document fetcher is required".to_string()))?;

        if self.options.max_context_tokens == Some(0) {
            return Err(BuildError::Config(
                "max_context_tokens must be greater than 0".to_string(),
            ));
        }
        self.prompts.validate()?;
        let parser = OutputParser::new(&self.options.code_language).map_err(|e| {
            BuildError::Config(format!(
                "invalid code language '{}': {e}",
                self.options.code_language
            ))
        })?;

        let condense_model = self.condense_model.unwrap_or_else(|| answer_model.clone());
        let critic_model = self.critic_model.unwrap_or_else(|| answer_model.clone());
        debug!(
            answer = answer_model.name(),
            condense = condense_model.name(),
            critic = critic_model.name(),
            "pipeline assembled"
        );

        let PromptSet {
            condense,
            answer,
            critique,
        } = self.prompts;

        Ok(CodePipeline {
            condenser: QueryCondenser::new(condense, self.options.history_formatter.clone()),
            budgeter: ContextBudgeter::new(self.options.max_context_tokens),
            synthesizer: AnswerSynthesizer::new(answer, self.options.document_separator.clone()),
            parser,
            critic: SafetyCritic::new(critique),
            answer_model,
            condense_model,
            critic_model,
            fetcher,
            options: self.options,
        })
    }
}
