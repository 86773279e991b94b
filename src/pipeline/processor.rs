//! Checkpointed trivia processor.
//!
//! Pipeline flow:
//! Hero profiles → prompt → generation service (bounded retries) → output store → checkpoint
//!
//! Records are processed strictly in order, one at a time. The first record
//! that cannot be completed stops the run (fail-stop): the checkpoint keeps
//! pointing at the last success so the next run resumes exactly there.

use crate::checkpoint::CheckpointManager;
use crate::client::GenerationService;
use crate::models::{
    Config, HeroProfile, Result, RunStats, TriviaError, TriviaQuestion, Upsert, parse_questions,
};
use crate::pipeline::{PromptBuilder, RetryPolicy, Sleeper, TokioSleeper};
use crate::store::OutputStore;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Sequential processor that resumes from a persisted checkpoint.
pub struct Processor {
    service: Arc<dyn GenerationService>,
    store: Box<dyn OutputStore>,
    checkpoint: CheckpointManager,
    prompt: PromptBuilder,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    strict_items: bool,
    show_progress: bool,
}

impl Processor {
    /// Create a processor with real sleeps, strict item checks and no progress bar.
    pub fn new(
        service: Arc<dyn GenerationService>,
        store: Box<dyn OutputStore>,
        checkpoint: CheckpointManager,
        prompt: PromptBuilder,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            service,
            store,
            checkpoint,
            prompt,
            policy,
            sleeper: Arc::new(TokioSleeper),
            strict_items: true,
            show_progress: false,
        }
    }

    /// Create a processor from configuration.
    pub fn from_config(
        config: &Config,
        service: Arc<dyn GenerationService>,
        store: Box<dyn OutputStore>,
        checkpoint: CheckpointManager,
    ) -> Result<Self> {
        let prompt = PromptBuilder::new(&config.generation)?;
        let policy = RetryPolicy::from(&config.retry);
        Ok(Self::new(service, store, checkpoint, prompt, policy)
            .with_strict_items(config.generation.strict_items))
    }

    /// Replace the delay used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Toggle per-question option/answer checks.
    pub fn with_strict_items(mut self, strict: bool) -> Self {
        self.strict_items = strict;
        self
    }

    /// Toggle the terminal progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Current checkpoint.
    pub fn checkpoint(&self) -> &CheckpointManager {
        &self.checkpoint
    }

    /// Output store the processor writes through.
    pub fn store(&self) -> &dyn OutputStore {
        self.store.as_ref()
    }

    /// Process every record after the persisted checkpoint.
    pub async fn run_from_checkpoint(&mut self, records: &[HeroProfile]) -> Result<RunStats> {
        let start_index = self.checkpoint.resume_index();
        self.run(records, start_index).await
    }

    /// Process `records[start_index..]` in order.
    ///
    /// Returns on the first fatal error, with everything before the failing
    /// record already merged and checkpointed.
    pub async fn run(&mut self, records: &[HeroProfile], start_index: usize) -> Result<RunStats> {
        let started = Instant::now();
        let total = records.len();
        let mut stats = RunStats {
            total_records: total,
            start_index,
            last_processed_index: self.checkpoint.state().last_processed_index,
            ..Default::default()
        };

        if start_index >= total {
            info!(
                total_records = total,
                start_index, "All heroes already processed, nothing to do"
            );
            return Ok(stats);
        }

        info!(
            total_records = total,
            start_index,
            pending = total - start_index,
            model = self.service.model(),
            max_attempts = self.policy.max_attempts,
            "Starting trivia generation"
        );

        let pb = self.progress_bar(total, start_index);

        for (index, hero) in records.iter().enumerate().skip(start_index) {
            info!(hero = %hero.name, index, "Processing hero");
            pb.set_message(hero.name.clone());

            match self.process_one(index, hero, &mut stats).await {
                Ok(outcome) => {
                    stats.processed += 1;
                    match outcome {
                        Upsert::Inserted => stats.inserted += 1,
                        Upsert::Replaced => stats.replaced += 1,
                    }
                    pb.inc(1);
                    info!(hero = %hero.name, index, ?outcome, "Saved questions for hero");
                }
                Err(e) => {
                    pb.abandon_with_message(format!("stopped at {}", hero.name));
                    error!(
                        hero = %hero.name,
                        index,
                        kind = e.kind(),
                        error = %e,
                        "Error processing hero"
                    );
                    error!(
                        last_processed_index = self.checkpoint.state().last_processed_index,
                        "Stopping processing. Rerun to resume from the last successful hero."
                    );
                    return Err(e);
                }
            }
        }

        pb.finish_with_message("done");

        stats.last_processed_index = self.checkpoint.state().last_processed_index;
        stats.runtime_secs = started.elapsed().as_secs_f64();
        stats.finalize();

        info!(
            processed = stats.processed,
            inserted = stats.inserted,
            replaced = stats.replaced,
            attempts = stats.attempts,
            failed_attempts = stats.failed_attempts,
            throughput = format!("{:.0}/hr", stats.throughput_per_hour),
            "Trivia generation complete"
        );

        Ok(stats)
    }

    /// Generate, merge and checkpoint a single record.
    async fn process_one(
        &mut self,
        index: usize,
        hero: &HeroProfile,
        stats: &mut RunStats,
    ) -> Result<Upsert> {
        let questions = self.generate_with_retry(hero, stats).await?;
        let outcome = self.store.merge(&hero.name, questions)?;

        // Reprocessing an older index must not pull the marker backwards.
        if index >= self.checkpoint.resume_index() {
            self.checkpoint.mark_processed(index)?;
        } else {
            debug!(
                index,
                last_processed_index = self.checkpoint.state().last_processed_index,
                "Checkpoint already past this hero"
            );
        }
        Ok(outcome)
    }

    /// Call the service until it yields a valid question set or the
    /// attempt budget runs out.
    async fn generate_with_retry(
        &self,
        hero: &HeroProfile,
        stats: &mut RunStats,
    ) -> Result<Vec<TriviaQuestion>> {
        let prompt = self.prompt.build(hero);
        let expected = self.prompt.question_count();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            stats.attempts += 1;

            let outcome = match self.service.generate(&prompt).await {
                Ok(generation) => {
                    debug!(
                        hero = %hero.name,
                        attempt,
                        model = %generation.model,
                        output_tokens = generation.output_tokens,
                        "Generation received"
                    );
                    let parsed = parse_questions(&generation.text, expected, self.strict_items);
                    if let Err(TriviaError::Parse(_)) = &parsed {
                        debug!(hero = %hero.name, raw = %generation.text, "Unparseable response");
                    }
                    parsed
                }
                Err(e) => Err(e),
            };

            let err = match outcome {
                Ok(questions) => return Ok(questions),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            stats.failed_attempts += 1;
            warn!(
                hero = %hero.name,
                attempt,
                max_attempts = self.policy.max_attempts,
                kind = err.kind(),
                error = %err,
                "Generation attempt failed"
            );

            let Some(delay) = self.policy.delay_after(attempt) else {
                return Err(TriviaError::RetriesExhausted {
                    hero: hero.name.clone(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            };

            let delay = self.honor_retry_after(delay, err.retry_after());
            info!(
                hero = %hero.name,
                delay_secs = delay.as_secs_f64(),
                "Retrying after delay"
            );
            self.sleeper.sleep(delay).await;
        }
    }

    /// Stretch `delay` to a server-provided hint, within the policy's cap.
    fn honor_retry_after(&self, delay: Duration, hint_secs: Option<f64>) -> Duration {
        let cap = self.policy.max_delay;
        match hint_secs.filter(|s| s.is_finite() && *s > 0.0) {
            Some(secs) => {
                let hint = Duration::try_from_secs_f64(secs.min(cap.as_secs_f64())).unwrap_or(cap);
                delay.max(hint.min(cap))
            }
            None => delay,
        }
    }

    fn progress_bar(&self, total: usize, start_index: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
            .map(|s| s.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_position(start_index as u64);
        pb
    }
}
