//! The research run: Plan → Search → Filter → Read → Synthesize.
//!
//! Stages run one after another. Concurrency lives inside a stage (parallel
//! general searches and deep reads) and in synthesis, where the provider call
//! and the delta consumer are driven together.

use crate::citations;
use crate::prompts::{filter_prompt, plan_prompt, synthesis_prompt};
use crate::schema::{FilterResponse, PlanResponse};
use crate::stages::StageTracker;
use parking_lot::{Mutex, RwLock};
use providers::router::provider_for;
use providers::{generate_json, ChatProvider};
use services::{
    ContentFetcher, GoogleCseClient, HistoryStore, JinaReader, ReadTarget, SearchDispatcher,
    SpecializedTask, TavilyClient,
};
use shared::agent_api::{ChatMessage, StreamChunk};
use shared::events::{PipelineEvent, Stage, StageRecord};
use shared::research::{ArticleSummary, HistoryEntry, Plan, RelevantSelection, SearchResult};
use shared::settings::{EndpointConfig, ResearchSettings};
use shared::ResearchError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The chat endpoint behind each model-backed stage.
#[derive(Clone)]
pub struct StageProviders {
    pub plan: Arc<dyn ChatProvider>,
    pub filter: Arc<dyn ChatProvider>,
    pub synthesize: Arc<dyn ChatProvider>,
}

/// Everything one successful run produced.
#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub run_id: Uuid,
    pub question: String,
    pub plan: Plan,
    /// Deduplicated search results; `[n]` in the answer points at `sources[n-1]`
    pub sources: Vec<SearchResult>,
    pub selection: RelevantSelection,
    pub articles: Vec<ArticleSummary>,
    pub answer: String,
    /// Cited numbers with no matching source
    pub unknown_citations: Vec<usize>,
    pub stages: Vec<StageRecord>,
}

pub struct ResearchPipeline {
    settings: ResearchSettings,
    providers: StageProviders,
    dispatcher: SearchDispatcher,
    fetcher: Option<ContentFetcher>,
    history: Arc<dyn HistoryStore>,
    events: Option<UnboundedSender<PipelineEvent>>,
    current: Mutex<Option<CancellationToken>>,
    latest: Mutex<Option<Arc<RwLock<Vec<StageRecord>>>>>,
}

impl ResearchPipeline {
    pub fn new(
        settings: ResearchSettings,
        providers: StageProviders,
        dispatcher: SearchDispatcher,
        fetcher: Option<ContentFetcher>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            settings,
            providers,
            dispatcher,
            fetcher,
            history,
            events: None,
            current: Mutex::new(None),
            latest: Mutex::new(None),
        }
    }

    /// Build the production pipeline: Tavily, Google Custom Search, Jina
    /// (when a reader key is set) and one chat provider per assigned stage.
    pub fn from_settings(
        settings: ResearchSettings,
        history: Arc<dyn HistoryStore>,
    ) -> Result<Self, ResearchError> {
        validate_settings(&settings)?;

        let providers = StageProviders {
            plan: provider_for(assigned(&settings, "plan", &settings.ai_assignments.plan)?)?,
            filter: provider_for(assigned(&settings, "filter", &settings.ai_assignments.filter)?)?,
            synthesize: provider_for(assigned(
                &settings,
                "synthesize",
                &settings.ai_assignments.synthesize,
            )?)?,
        };

        let dispatcher = SearchDispatcher::new(
            Arc::new(TavilyClient::new(
                settings.tavily_key.trim(),
                settings.tavily_max_results,
            )),
            Arc::new(GoogleCseClient::new()),
        )
        .with_spacing(Duration::from_millis(settings.cse_spacing_ms));

        let fetcher = settings
            .reader_key()
            .map(|key| ContentFetcher::new(Arc::new(JinaReader::new(key))));

        Ok(Self::new(settings, providers, dispatcher, fetcher, history))
    }

    /// Forward stage changes and answer deltas to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    /// Stage records of the most recent run (all pending before any run).
    pub fn stages(&self) -> Vec<StageRecord> {
        match self.latest.lock().as_ref() {
            Some(records) => records.read().clone(),
            None => Stage::all().iter().map(|s| StageRecord::pending(*s)).collect(),
        }
    }

    /// Cancel the run in flight, if any.
    pub fn cancel_current(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
    }

    /// Run the full pipeline for `question`.
    ///
    /// An invalid submission is rejected before anything else happens. A
    /// valid one supersedes the previous run, which stops with
    /// [`ResearchError::Cancelled`].
    pub async fn run(&self, question: &str) -> Result<ResearchReport, ResearchError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ResearchError::validation("question is empty"));
        }
        validate_settings(&self.settings)?;

        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            tracing::info!(%run_id, "superseding previous run");
            previous.cancel();
        }
        let tracker = StageTracker::new(run_id, self.events.clone());
        *self.latest.lock() = Some(tracker.shared());

        tracing::info!(%run_id, question, "research run started");
        match self.execute(run_id, question, &tracker, &token).await {
            Ok(report) => {
                tracing::info!(%run_id, sources = report.sources.len(), "research run finished");
                Ok(report)
            }
            Err(e) => {
                if let Some(stage) = tracker.fail(&e.to_string()) {
                    tracing::warn!(%run_id, ?stage, error = %e, "research run halted");
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run_id: Uuid,
        question: &str,
        tracker: &StageTracker,
        token: &CancellationToken,
    ) -> Result<ResearchReport, ResearchError> {
        // Plan
        checkpoint(token)?;
        let role = self.settings.ai_role.as_str();
        tracker.activate(Stage::Plan, "Planning research", format!("Persona: {}", role));
        let messages = vec![ChatMessage::user(plan_prompt(
            question,
            role,
            &self.settings.google_cse,
        ))];
        let plan = guarded(
            token,
            generate_json::<PlanResponse>(self.providers.plan.as_ref(), &messages, "search plan"),
        )
        .await?
        .into_plan();
        tracker.complete(Stage::Plan, "Research plan ready", self.plan_detail(&plan));

        // Search
        checkpoint(token)?;
        let general_queries = plan.general_queries.all();
        let tasks = self.specialized_tasks(&plan);
        tracker.activate(
            Stage::Search,
            "Searching",
            format!(
                "{} general queries, {} custom engine queries",
                general_queries.len(),
                tasks.len()
            ),
        );
        let sources = guarded(token, async {
            Ok(self.dispatcher.dispatch(&general_queries, &tasks).await)
        })
        .await?;
        tracker.complete(
            Stage::Search,
            "Search complete",
            format!("Found {} unique results", sources.len()),
        );

        // Filter
        checkpoint(token)?;
        let selection = if sources.is_empty() {
            tracker.complete(Stage::Filter, "Nothing to filter", "Search returned no results");
            RelevantSelection::default()
        } else {
            tracker.activate(
                Stage::Filter,
                "Selecting sources",
                format!("Evaluating {} results", sources.len()),
            );
            let messages = vec![ChatMessage::user(filter_prompt(question, &sources))];
            let response = guarded(
                token,
                generate_json::<FilterResponse>(
                    self.providers.filter.as_ref(),
                    &messages,
                    "source selection",
                ),
            )
            .await?;
            let (selection, rejected) =
                RelevantSelection::validate(&response.relevant_indices, sources.len());
            if !rejected.is_empty() {
                tracing::warn!(%run_id, ?rejected, "ignoring invalid source indices");
            }
            tracker.complete(
                Stage::Filter,
                "Sources selected",
                selection_detail(&selection, &sources),
            );
            selection
        };

        // Read
        checkpoint(token)?;
        let articles = match &self.fetcher {
            Some(fetcher) if !selection.is_empty() => {
                let targets: Vec<ReadTarget> = selection
                    .indices()
                    .iter()
                    .map(|&i| ReadTarget {
                        original_index: i,
                        url: sources[i].url.clone(),
                    })
                    .collect();
                tracker.activate(
                    Stage::Read,
                    "Reading sources",
                    format!("Fetching full text of {} sources", targets.len()),
                );
                let articles = guarded(token, async { Ok(fetcher.read_all(&targets).await) }).await?;
                tracker.complete(
                    Stage::Read,
                    "Deep read complete",
                    format!("Read {} sources", articles.len()),
                );
                articles
            }
            Some(_) => {
                tracker.complete(Stage::Read, "Deep read skipped", "No relevant sources selected");
                Vec::new()
            }
            None => {
                tracker.complete(
                    Stage::Read,
                    "Deep read skipped",
                    "No content reader key configured",
                );
                Vec::new()
            }
        };

        // Synthesize
        checkpoint(token)?;
        tracker.activate(
            Stage::Synthesize,
            "Writing report",
            format!("Answering in {}", self.settings.answer_language),
        );
        let prompt = synthesis_prompt(question, &sources, &articles, &self.settings.answer_language);
        let answer = guarded(token, self.synthesize(run_id, prompt, token)).await?;

        let unknown_citations = citations::out_of_range(&answer, sources.len());
        if !unknown_citations.is_empty() {
            tracing::warn!(%run_id, ?unknown_citations, "answer cites sources that do not exist");
        }
        tracker.complete(
            Stage::Synthesize,
            "Report ready",
            format!(
                "{} sources cited",
                citations::cited_sources(&answer).len() - unknown_citations.len()
            ),
        );

        if let Err(e) = self
            .history
            .record(HistoryEntry::new(question, answer.clone(), sources.clone()))
        {
            tracing::warn!(%run_id, error = %e, "failed to save history");
        }

        Ok(ResearchReport {
            run_id,
            question: question.to_string(),
            plan,
            sources,
            selection,
            articles,
            answer,
            unknown_citations,
            stages: tracker.snapshot(),
        })
    }

    /// Stream the answer, forwarding each delta while the run is current.
    async fn synthesize(
        &self,
        run_id: Uuid,
        prompt: String,
        token: &CancellationToken,
    ) -> Result<String, ResearchError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let messages = vec![ChatMessage::user(prompt)];

        let produce = self.providers.synthesize.generate_stream(&messages, tx);
        let consume = async {
            let mut answer = String::new();
            while let Some(chunk) = rx.recv().await {
                match chunk {
                    StreamChunk::Text(text) => {
                        if token.is_cancelled() {
                            continue;
                        }
                        answer.push_str(&text);
                        if let Some(events) = &self.events {
                            let _ = events.send(PipelineEvent::Delta { run_id, text });
                        }
                    }
                    StreamChunk::Done => break,
                }
            }
            answer
        };

        let (result, answer) = tokio::join!(produce, consume);
        result?;
        checkpoint(token)?;
        Ok(answer)
    }

    fn specialized_tasks(&self, plan: &Plan) -> Vec<SpecializedTask> {
        plan.custom_search_tasks
            .iter()
            .filter_map(|task| match self.settings.google_cse.get(task.engine_index) {
                Some(engine) => Some(SpecializedTask {
                    engine: engine.clone(),
                    query: task.query.clone(),
                }),
                None => {
                    tracing::warn!(
                        index = task.engine_index,
                        configured = self.settings.google_cse.len(),
                        "dropping task for unknown custom search engine"
                    );
                    None
                }
            })
            .collect()
    }

    fn plan_detail(&self, plan: &Plan) -> String {
        let mut lines = vec![
            format!("Persona: {}", self.settings.ai_role),
            format!("Domain: {}", plan.domain),
            format!("Strategy: {}", plan.strategy),
            format!("General queries: {}", plan.general_queries.all().join("; ")),
        ];
        if !plan.custom_search_tasks.is_empty() {
            let tasks = plan
                .custom_search_tasks
                .iter()
                .map(|t| format!("[{}] {}", t.engine_index, t.query))
                .collect::<Vec<_>>()
                .join("; ");
            lines.push(format!("Custom search tasks: {}", tasks));
        }
        lines.join("\n")
    }
}

fn selection_detail(selection: &RelevantSelection, sources: &[SearchResult]) -> String {
    let picked = selection
        .indices()
        .iter()
        .map(|i| format!("[{}] {}", i + 1, sources[*i].title))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{}\nDiscarded {} of {} results",
        picked,
        sources.len() - selection.len(),
        sources.len()
    )
}

/// Check every precondition a run needs before any stage starts.
pub fn validate_settings(settings: &ResearchSettings) -> Result<(), ResearchError> {
    if settings.tavily_key.trim().is_empty() {
        return Err(ResearchError::validation("Tavily API key is not configured"));
    }
    let assignments = &settings.ai_assignments;
    for (stage, id) in [
        ("plan", &assignments.plan),
        ("filter", &assignments.filter),
        ("synthesize", &assignments.synthesize),
    ] {
        let endpoint = assigned(settings, stage, id)?;
        if endpoint.api_key.trim().is_empty() || endpoint.model.trim().is_empty() {
            return Err(ResearchError::validation(format!(
                "endpoint '{}' needs an API key and a model",
                endpoint.name
            )));
        }
    }
    Ok(())
}

fn assigned<'a>(
    settings: &'a ResearchSettings,
    stage: &str,
    id: &Option<String>,
) -> Result<&'a EndpointConfig, ResearchError> {
    let id = id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ResearchError::validation(format!("no endpoint assigned to {}", stage)))?;
    settings.endpoint(Some(id)).ok_or_else(|| {
        ResearchError::validation(format!("{} is assigned to unknown endpoint '{}'", stage, id))
    })
}

fn checkpoint(token: &CancellationToken) -> Result<(), ResearchError> {
    if token.is_cancelled() {
        Err(ResearchError::Cancelled)
    } else {
        Ok(())
    }
}

/// Drive `work` unless the run is cancelled first.
async fn guarded<T>(
    token: &CancellationToken,
    work: impl Future<Output = Result<T, ResearchError>>,
) -> Result<T, ResearchError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ResearchError::Cancelled),
        out = work => out,
    }
}
