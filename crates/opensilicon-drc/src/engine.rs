//! The DRC engine: owns the rules, answers constraint queries and runs the
//! registered test providers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use opensilicon_core::{Board, BoardItem, LayerId};

use crate::condition::EvalContext;
use crate::error::DrcError;
use crate::implicit::implicit_rules;
use crate::parallel::WorkerPool;
use crate::progress::{CancellationToken, ProgressReporter};
use crate::provider::{ProviderRegistry, TestProvider};
use crate::report::{DrcReport, RunStatus};
use crate::rule::{Constraint, ConstraintType, Rule};
use crate::rule_parser::RuleParser;
use crate::rule_set::{compile_rule_sets, RuleSet, RuleSetEntry};
use crate::settings::DrcSettings;
use crate::violation::{DrcItem, ErrorCode, Severity};

/// Callback receiving every reported violation. May be called from worker threads.
pub type MarkerHandler = Box<dyn Fn(&DrcItem) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DrcEngine {
    board: Arc<Board>,
    settings: DrcSettings,
    rules: Vec<Arc<Rule>>,
    rule_sets: HashMap<ConstraintType, RuleSet>,
    compiled: bool,
    providers: Vec<Box<dyn TestProvider>>,
    pool: OnceLock<Arc<WorkerPool>>,
    progress: Option<Arc<dyn ProgressReporter>>,
    cancel: CancellationToken,
    /// Latches any cancellation seen during the current run; workers watch it.
    run_cancel: CancellationToken,
    marker_handler: Option<MarkerHandler>,

    // ── Per-run state ────────────────────────────────────────────────
    report: Mutex<Vec<DrcItem>>,
    error_counts: HashMap<ErrorCode, AtomicUsize>,
    tests_not_run: Mutex<Vec<String>>,
    stage: AtomicUsize,
    eval_count: AtomicUsize,
}

impl DrcEngine {
    /// Create an engine for `board` with the process-wide provider set and
    /// only the implicit rules loaded.
    pub fn new(board: Arc<Board>, settings: DrcSettings) -> Self {
        let rules = implicit_rules(&board, &settings)
            .into_iter()
            .map(Arc::new)
            .collect();
        Self {
            board,
            settings,
            rules,
            rule_sets: HashMap::new(),
            compiled: false,
            providers: ProviderRegistry::global().instantiate(),
            pool: OnceLock::new(),
            progress: None,
            cancel: CancellationToken::new(),
            run_cancel: CancellationToken::new(),
            marker_handler: None,
            report: Mutex::new(Vec::new()),
            error_counts: ErrorCode::ALL.into_iter().map(|c| (c, AtomicUsize::new(0))).collect(),
            tests_not_run: Mutex::new(Vec::new()),
            stage: AtomicUsize::new(0),
            eval_count: AtomicUsize::new(0),
        }
    }

    /// Replace the provider set. Rules must be compiled again.
    pub fn with_registry(mut self, registry: &ProviderRegistry) -> Self {
        self.providers = registry.instantiate();
        self.compiled = false;
        self
    }

    pub fn with_worker_pool(self, pool: Arc<WorkerPool>) -> Self {
        let _ = self.pool.set(pool);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn set_marker_handler(&mut self, handler: impl Fn(&DrcItem) + Send + Sync + 'static) {
        self.marker_handler = Some(Box::new(handler));
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn settings(&self) -> &DrcSettings {
        &self.settings
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.iter().find(|r| !r.implicit && r.name == name)
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    // ── Rules ────────────────────────────────────────────────────────

    /// Load a rule document from disk. On failure the current rules stay in place.
    pub fn load_rules(&mut self, path: &Path) -> Result<(), DrcError> {
        let text = std::fs::read_to_string(path)?;
        self.load_rules_from_str(&text, &path.display().to_string())
    }

    /// Parse `text` and replace the loaded rules with it plus the implicit
    /// rules. On failure the current rules stay in place.
    pub fn load_rules_from_str(&mut self, text: &str, source: &str) -> Result<(), DrcError> {
        let explicit = RuleParser::new(source, &self.board.layer_stack).parse(text)?;
        let implicit = implicit_rules(&self.board, &self.settings);
        log::info!(
            "Loaded {} rule(s) from {} ({} implicit)",
            explicit.len(),
            source,
            implicit.len()
        );
        self.rules = implicit.into_iter().chain(explicit).map(Arc::new).collect();
        self.compiled = false;
        Ok(())
    }

    /// Build the per-constraint-type rule sets. On failure the loaded rules
    /// and the previously compiled sets are kept.
    pub fn compile_rules(&mut self) -> Result<(), DrcError> {
        let mut owners = HashMap::new();
        for provider in &self.providers {
            for &constraint_type in provider.constraint_types() {
                owners.entry(constraint_type).or_insert(provider.name());
            }
        }
        self.rule_sets = compile_rule_sets(&self.rules, &owners)?;
        self.compiled = true;
        log::info!(
            "Compiled {} rule(s) into {} constraint set(s)",
            self.rules.len(),
            self.rule_sets.len()
        );
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    fn resolve(&self, constraint_type: ConstraintType, entry: &RuleSetEntry) -> Constraint {
        let severity = entry
            .rule
            .severity
            .unwrap_or_else(|| self.settings.severity(constraint_type.error_code()));
        Constraint::from_rule(&entry.rule, &entry.constraint, severity)
    }

    /// The constraint of the most specific rule matching `a` (and `b`) on
    /// `layer`. Pair conditions are tried in both item orders. With no
    /// matching rule the result has severity `Ignore`.
    pub fn eval_rules_for_items(
        &self,
        constraint_type: ConstraintType,
        a: &BoardItem,
        b: Option<&BoardItem>,
        layer: Option<LayerId>,
    ) -> Constraint {
        self.eval_count.fetch_add(1, Ordering::Relaxed);
        let Some(set) = self.rule_sets.get(&constraint_type) else {
            return Constraint::none(constraint_type);
        };
        let forward = EvalContext::new(&self.board, a, b, layer);
        let entry = match b {
            Some(b) => set.first_match(&[forward, EvalContext::new(&self.board, b, Some(a), layer)]),
            None => set.first_match(&[forward]),
        };
        match entry {
            Some(entry) => self.resolve(constraint_type, entry),
            None => Constraint::none(constraint_type),
        }
    }

    /// Every constraint of `constraint_type` any rule can produce, most specific first.
    pub fn query_constraints_by_id(&self, constraint_type: ConstraintType) -> Vec<Constraint> {
        self.rule_sets
            .get(&constraint_type)
            .map(|set| {
                set.entries()
                    .iter()
                    .map(|entry| self.resolve(constraint_type, entry))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_rules_for_constraint_type(&self, constraint_type: ConstraintType) -> bool {
        self.rule_sets
            .get(&constraint_type)
            .is_some_and(|set| !set.is_empty())
    }

    /// Number of constraint queries answered since the last run started.
    pub fn rule_eval_count(&self) -> usize {
        self.eval_count.load(Ordering::Relaxed)
    }

    // ── Reporting ────────────────────────────────────────────────────

    pub fn is_error_limit_exceeded(&self, code: ErrorCode) -> bool {
        match self.settings.max_errors_per_code {
            Some(max) => self.error_counts[&code].load(Ordering::Relaxed) >= max,
            None => false,
        }
    }

    /// Record a violation and forward it to the marker handler.
    ///
    /// Items with severity `Ignore`, or past the per-code error limit, are dropped.
    pub fn report_violation(&self, item: DrcItem) {
        if item.severity == Severity::Ignore {
            log::debug!("Dropping ignored violation {}", item.error_code);
            return;
        }
        let reported = self.error_counts[&item.error_code].fetch_add(1, Ordering::Relaxed);
        if self.settings.max_errors_per_code.is_some_and(|max| reported >= max) {
            return;
        }
        if let Some(handler) = &self.marker_handler {
            handler(&item);
        }
        lock(&self.report).push(item);
    }

    /// Record that `provider` skipped its check.
    pub fn report_test_not_run(&self, provider: &str) {
        log::debug!("Provider '{provider}' has nothing to check");
        lock(&self.tests_not_run).push(provider.to_string());
    }

    /// Announce a new phase of the running provider. Returns false if the run
    /// has been cancelled.
    pub fn report_stage(&self, name: &str) -> bool {
        if let Some(progress) = &self.progress {
            progress.report_stage(name, self.stage.load(Ordering::Relaxed), self.providers.len());
        }
        !self.is_cancelled()
    }

    /// Report `done` of `total` work items. Returns false if the run has been cancelled.
    pub fn report_progress(&self, done: usize, total: usize) -> bool {
        if let Some(progress) = &self.progress {
            let fraction = if total == 0 { 1.0 } else { done as f64 / total as f64 };
            progress.report_progress(fraction);
        }
        !self.is_cancelled()
    }

    pub fn report_aux(&self, message: &str) {
        match &self.progress {
            Some(progress) => progress.report_aux(message),
            None => log::info!("{message}"),
        }
    }

    /// True once the injected token or the progress reporter has asked the
    /// current run to stop.
    pub fn is_cancelled(&self) -> bool {
        if self.run_cancel.is_cancelled() {
            return true;
        }
        if self.cancel.is_cancelled() || self.progress.as_ref().is_some_and(|p| p.is_cancelled()) {
            self.run_cancel.cancel();
            return true;
        }
        false
    }

    // ── Parallel sweeps ──────────────────────────────────────────────

    /// The pool used for parallel sweeps: the injected one, a private pool
    /// when `worker_threads` is set, or the shared pool.
    pub fn worker_pool(&self) -> Result<Arc<WorkerPool>, DrcError> {
        if let Some(pool) = self.pool.get() {
            return Ok(Arc::clone(pool));
        }
        let pool = match self.settings.worker_threads {
            Some(threads) => Arc::new(WorkerPool::new(Some(threads))?),
            None => WorkerPool::shared()?,
        };
        Ok(Arc::clone(self.pool.get_or_init(|| pool)))
    }

    /// Run `work(i)` for `i` in `0..count` on the worker pool, reporting
    /// progress while waiting. Returns false if the run was cancelled.
    pub fn for_each_parallel<F>(&self, count: usize, work: F) -> bool
    where
        F: Fn(usize) + Sync,
    {
        match self.worker_pool() {
            Ok(pool) => {
                pool.for_each_index(
                    count,
                    &self.run_cancel,
                    self.settings.poll_interval(),
                    |done, total| self.report_progress(done, total),
                    work,
                );
            }
            Err(err) => {
                log::warn!("Worker pool unavailable ({err}); running sequentially");
                for i in 0..count {
                    if i % crate::provider::PROGRESS_DELTA == 0 && !self.report_progress(i, count) {
                        break;
                    }
                    work(i);
                }
            }
        }
        !self.is_cancelled()
    }

    // ── Running ──────────────────────────────────────────────────────

    /// Run every provider in registration order.
    ///
    /// Stops early when a provider returns false or the run is cancelled;
    /// the report then keeps what was found so far and is marked cancelled.
    /// A cancelled run does not carry over into the next one; an injected
    /// token stays cancelled until its owner resets it.
    pub fn run_tests(&mut self) -> Result<DrcReport, DrcError> {
        if !self.compiled {
            return Err(DrcError::RulesNotCompiled);
        }
        self.run_cancel = CancellationToken::new();
        self.report.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
        self.tests_not_run
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        for count in self.error_counts.values_mut() {
            *count.get_mut() = 0;
        }
        *self.eval_count.get_mut() = 0;

        let engine: &DrcEngine = self;
        let started = Instant::now();
        let mut status = RunStatus::Complete;
        let mut providers_run = Vec::new();
        log::info!(
            "Running DRC on '{}': {} provider(s), {} rule(s)",
            engine.board.name,
            engine.providers.len(),
            engine.rules.len()
        );

        for (index, provider) in engine.providers.iter().enumerate() {
            if engine.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }
            engine.stage.store(index, Ordering::Relaxed);
            let before = lock(&engine.report).len();
            let provider_start = Instant::now();
            log::debug!("Starting '{}': {}", provider.name(), provider.description());

            let keep_going = provider.run(engine);

            log::info!(
                "Provider '{}' finished in {:.1?}: {} violation(s)",
                provider.name(),
                provider_start.elapsed(),
                lock(&engine.report).len() - before
            );
            if !keep_going {
                log::warn!("DRC cancelled during '{}'", provider.name());
                status = RunStatus::Cancelled;
                break;
            }
            providers_run.push(provider.name().to_string());
        }

        let report = DrcReport {
            items: std::mem::take(&mut *lock(&engine.report)),
            status,
            providers_run,
            tests_not_run: std::mem::take(&mut *lock(&engine.tests_not_run)),
            duration: started.elapsed(),
        };
        log::info!("{}", report.summary());
        Ok(report)
    }
}
