//! End-to-end runs: subject → discovery → fetch → oracle → synthesis → normalize.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument};
use url::Url;

use topicdoc_crawler::{FetchOptions, FetchResult, Fetcher, HttpFetcher, PageFetcher};
use topicdoc_discovery::{Discovery, DuckDuckGoSearch, SearchProvider, general_query};
use topicdoc_markdown::normalize;
use topicdoc_shared::{
    AppConfig, Artifact, Result, RunId, SourceSet, TopicContext, TopicDocError, TopicOutline,
};

use crate::llm::{Generator, OpenRouterClient};
use crate::oracle::CurrencyOracle;
use crate::outline::generate_outline;
use crate::refine::{Grounding, RefineRequest, Refinement, Refiner};
use crate::synthesizer::{Aggregate, LessonPlan, SynthesisConfig, SynthesisOutcome, Synthesizer};

// ---------------------------------------------------------------------------
// Services and config
// ---------------------------------------------------------------------------

/// External collaborators, built once and shared by every run.
#[derive(Clone)]
pub struct Services {
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub generator: Arc<dyn Generator>,
}

impl Services {
    /// DuckDuckGo search, HTTP fetcher, OpenRouter client.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            search: Arc::new(DuckDuckGoSearch::new(&config.search)?),
            fetcher: Arc::new(HttpFetcher::new(&config.fetch)?),
            generator: Arc::new(OpenRouterClient::from_config(config)?),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub fetch: FetchOptions,
    pub synthesis: SynthesisConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            fetch: FetchOptions::from(config),
            synthesis: SynthesisConfig::from(config),
        }
    }
}

/// What a full `generate` run hands back.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    pub run_id: RunId,
    pub artifact: Artifact,
    pub outcome: SynthesisOutcome,
    /// Unique URLs found by discovery, supplementary search included.
    pub sources_discovered: usize,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after discovery with the number of candidate URLs.
    fn sources_found(&self, count: usize);
    /// Called after a fetch batch.
    fn pages_fetched(&self, succeeded: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn sources_found(&self, _count: usize) {}
    fn pages_fetched(&self, _succeeded: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Cheap to clone; holds only shared handles and settings.
#[derive(Clone)]
pub struct Pipeline {
    discovery: Discovery,
    fetcher: Fetcher,
    oracle: CurrencyOracle,
    synthesizer: Synthesizer,
    generator: Arc<dyn Generator>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(services: &Services, config: PipelineConfig) -> Self {
        Self {
            discovery: Discovery::new(services.search.clone()),
            fetcher: Fetcher::new(services.fetcher.clone(), config.fetch.clone()),
            oracle: CurrencyOracle::new(services.generator.clone()),
            synthesizer: Synthesizer::new(services.generator.clone(), config.synthesis.clone()),
            generator: services.generator.clone(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn discover_sources(&self, ctx: &TopicContext, n: usize) -> SourceSet {
        self.discovery.discover_sources(ctx, n).await
    }

    pub async fn fetch_all(&self, urls: &[Url]) -> FetchResult {
        self.fetcher.fetch_all(urls).await
    }

    pub async fn has_current_knowledge(&self, ctx: &TopicContext) -> bool {
        self.oracle.has_current_knowledge(ctx).await
    }

    pub async fn synthesize(
        &self,
        ctx: &TopicContext,
        content: &FetchResult,
    ) -> Result<SynthesisOutcome> {
        Ok(self.synthesizer.synthesize(ctx, content).await?)
    }

    /// Full run for one subject.
    ///
    /// 1. Discovery (always)
    /// 2. Fetch
    /// 3. Currency oracle
    /// 4. Supplementary general search when the model is not current or the
    ///    content is thin
    /// 5. Synthesis and normalization
    #[instrument(skip_all, fields(subject = %ctx.subject(), parent = ?ctx.parent_subject(), n = n))]
    pub async fn generate(
        &self,
        ctx: &TopicContext,
        n: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<GeneratedDocument> {
        let start = Instant::now();
        let run_id = RunId::new();
        info!(%run_id, "starting generate pipeline");

        progress.phase("Discovering sources");
        let sources = self.discovery.discover_sources(ctx, n).await;
        progress.sources_found(sources.len());

        progress.phase("Fetching pages");
        let mut content = self.fetch_batch(sources.as_slice(), progress).await;

        progress.phase("Checking model knowledge");
        let current = self.oracle.has_current_knowledge(ctx).await;

        let grounded = Aggregate::from_result(&content, self.config.synthesis.max_source_chars)
            .is_sufficient(self.config.synthesis.min_grounding_chars);

        let mut discovered = sources.len();
        if !current || !grounded {
            progress.phase("Searching for more sources");
            let already: SourceSet = content.urls().cloned().collect();
            let mut extra = SourceSet::new();
            for url in self.discovery.search(&general_query(ctx), n).await {
                if !already.contains(&url) {
                    extra.insert(url);
                }
            }
            info!(current, grounded, extra = extra.len(), "supplementary search");

            if !extra.is_empty() {
                discovered += extra.len();
                let more = self.fetch_batch(extra.as_slice(), progress).await;
                content.merge(more);
            }
        }

        progress.phase("Synthesizing document");
        let outcome = self
            .synthesizer
            .synthesize_with_currency(ctx, &content, current)
            .await?;

        progress.phase("Normalizing");
        let artifact = normalize(&outcome.document);

        info!(
            %run_id,
            sources = outcome.sources_used.len(),
            fallback = outcome.used_fallback_knowledge,
            elapsed_ms = start.elapsed().as_millis(),
            "generate pipeline complete"
        );
        Ok(GeneratedDocument {
            run_id,
            artifact,
            outcome,
            sources_discovered: discovered,
        })
    }

    /// Run for caller-chosen pages: fetch → synthesize → normalize.
    #[instrument(skip_all, fields(subject = %ctx.subject(), urls = urls.len()))]
    pub async fn generate_from_urls(
        &self,
        ctx: &TopicContext,
        urls: &[Url],
        progress: &dyn ProgressReporter,
    ) -> Result<GeneratedDocument> {
        if urls.is_empty() {
            return Err(TopicDocError::validation("no URLs provided"));
        }
        let run_id = RunId::new();
        info!(%run_id, "starting from-urls pipeline");

        let sources: SourceSet = urls.iter().cloned().collect();
        progress.sources_found(sources.len());

        progress.phase("Fetching pages");
        let content = self.fetch_batch(sources.as_slice(), progress).await;

        progress.phase("Synthesizing document");
        let outcome = self.synthesizer.synthesize(ctx, &content).await?;

        progress.phase("Normalizing");
        Ok(GeneratedDocument {
            run_id,
            artifact: normalize(&outcome.document),
            outcome,
            sources_discovered: sources.len(),
        })
    }

    /// Search every topic and subtopic name, fetch once, synthesize a lesson.
    #[instrument(skip_all, fields(topics = outline.len(), n = n))]
    pub async fn generate_lesson(
        &self,
        outline: &[TopicOutline],
        n: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<LessonPlan> {
        if outline.is_empty() {
            return Err(TopicDocError::validation("outline has no topics"));
        }

        progress.phase("Discovering sources");
        let mut sources = SourceSet::new();
        for entry in outline {
            for name in std::iter::once(&entry.topic).chain(&entry.subtopics) {
                sources.extend(self.discovery.search(name, n).await);
            }
        }
        progress.sources_found(sources.len());

        progress.phase("Fetching pages");
        let content = self.fetch_batch(sources.as_slice(), progress).await;

        progress.phase("Synthesizing lesson");
        Ok(self.synthesizer.synthesize_outline(outline, &content).await?)
    }

    pub async fn outline(&self, query: &str) -> Result<Vec<TopicOutline>> {
        generate_outline(self.generator.as_ref(), query).await
    }

    pub async fn refine(&self, request: &RefineRequest, grounding: &Grounding) -> Result<Refinement> {
        Refiner {
            discovery: &self.discovery,
            fetcher: &self.fetcher,
            generator: self.generator.as_ref(),
            max_source_chars: self.config.synthesis.max_source_chars,
        }
        .refine(request, grounding)
        .await
    }

    async fn fetch_batch(&self, urls: &[Url], progress: &dyn ProgressReporter) -> FetchResult {
        let result = self.fetcher.fetch_all(urls).await;
        progress.pages_fetched(result.success_count(), result.len());
        result
    }
}
