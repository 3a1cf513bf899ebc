//! The run loop.
//!
//! A single coordinating thread owns all run state. It walks the graph in
//! topological order, decides for each ready target whether the cached value
//! is current, and hands stale targets to a rayon pool. Workers report back
//! over a channel; the coordinator records results, writes them to
//! single-writer backends, and releases downstream targets.
//!
//! Targets become ready only after every upstream target has finished, so a
//! command never observes a partially built input.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use kiln_cache::{BuildMeta, Cache, CacheEntry, WriteConcurrency};
use kiln_common::{Fingerprint, HashAlgorithm, Value};
use kiln_graph::{DependencyGraph, TargetId};
use kiln_plan::{BuildError, Command, ExpandedPlan, Inputs, Plan, Target};

use crate::error::RunError;
use crate::fingerprint::FingerprintEngine;
use crate::progress::{NoProgress, Progress};
use crate::report::{RunReport, TargetReport, TargetState};

/// Cooperative cancellation for a running [`Scheduler`].
///
/// Once aborted, no further targets are dispatched; commands already
/// running finish and are recorded.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// A fresh, unaborted handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the run to stop.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a target needs rebuilding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// An upstream target was (or will be) rebuilt.
    UpstreamRebuilt(String),
    /// No cache entry exists.
    NotCached,
    /// The cache entry could not be read.
    Unreadable(String),
    /// The stored fingerprint differs from the current one.
    FingerprintChanged,
    /// A declared output file is missing or was modified.
    OutputChanged(PathBuf),
    /// A declared input file cannot be read.
    InputUnreadable(PathBuf),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::UpstreamRebuilt(name) => write!(f, "upstream '{name}' changed"),
            StaleReason::NotCached => f.write_str("not cached"),
            StaleReason::Unreadable(reason) => write!(f, "cache entry unreadable: {reason}"),
            StaleReason::FingerprintChanged => f.write_str("fingerprint changed"),
            StaleReason::OutputChanged(path) => {
                write!(f, "output {} missing or modified", path.display())
            }
            StaleReason::InputUnreadable(path) => {
                write!(f, "input {} unreadable", path.display())
            }
        }
    }
}

/// A target that the next run would rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outdated {
    /// Target name.
    pub name: String,
    /// The first reason found.
    pub reason: StaleReason,
}

enum Freshness {
    UpToDate(Fingerprint),
    Stale(Fingerprint, StaleReason),
}

/// Executes plans against a cache.
pub struct Scheduler {
    cache: Cache,
    workers: usize,
    keep_going: bool,
    engine: FingerprintEngine,
    abort: AbortHandle,
    progress: Arc<dyn Progress>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("cache", &self.cache)
            .field("workers", &self.workers)
            .field("keep_going", &self.keep_going)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// A scheduler with default settings: one worker per available core,
    /// keep going after failures, xxh3 fingerprints, files resolved against
    /// the current directory.
    pub fn new(cache: Cache) -> Self {
        Self {
            cache,
            workers: 0,
            keep_going: true,
            engine: FingerprintEngine::new(HashAlgorithm::default(), "."),
            abort: AbortHandle::new(),
            progress: Arc::new(NoProgress),
        }
    }

    /// Maximum concurrent commands; `0` means the available parallelism.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Whether independent branches keep building after a failure.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Fingerprint algorithm.
    pub fn algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.engine = FingerprintEngine::new(algorithm, self.engine.root());
        self
    }

    /// Directory that declared file paths are relative to.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.engine = FingerprintEngine::new(self.engine.algorithm(), root);
        self
    }

    /// Observer notified of every state change.
    pub fn progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Uses an externally created abort handle.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// A handle that aborts this scheduler's runs.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// The cache results are read from and written to.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// The worker count actually used.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Expands `plan`, builds its graph and brings every target up to date.
    ///
    /// Returns `Err` only when the plan itself is invalid; target failures
    /// are reported in the [`RunReport`].
    pub fn run(&self, plan: &Plan) -> Result<RunReport, RunError> {
        let expanded = plan.expand()?;
        let graph = DependencyGraph::build_in(&expanded, self.engine.root())?;
        self.execute(&expanded, &graph)
    }

    /// Runs an already expanded plan over its graph.
    pub fn execute(
        &self,
        plan: &ExpandedPlan,
        graph: &DependencyGraph,
    ) -> Result<RunReport, RunError> {
        let start = Instant::now();
        let workers = self.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("kiln-worker-{i}"))
            .build()?;
        let single_writer = self.cache.write_concurrency() == WriteConcurrency::SingleWriter;
        tracing::info!(
            targets = graph.len(),
            workers,
            backend = %self.cache.kind(),
            "starting run"
        );

        let (tx, rx) = mpsc::channel::<Finished>();
        let mut run = RunState::new(plan, graph, self.progress.as_ref());
        let mut running = 0usize;
        let mut stopped = false;
        let mut aborted = false;

        loop {
            if !stopped && self.abort.is_aborted() {
                tracing::info!("run aborted, waiting for running commands");
                stopped = true;
                aborted = true;
            }

            while !stopped {
                let Some(Reverse(id)) = run.ready.pop() else {
                    break;
                };
                match self.freshness(&run, id) {
                    Ok(Freshness::UpToDate(fp)) => {
                        run.fingerprints[id.index()] = Some(fp);
                        run.set(id, TargetState::UpToDate);
                        run.release(id);
                    }
                    Ok(Freshness::Stale(fp, reason)) => {
                        tracing::debug!(name = graph.name(id), %reason, "stale");
                        run.fingerprints[id.index()] = Some(fp);
                        run.set(id, TargetState::Stale);
                        run.queued.push(Reverse(id));
                    }
                    Err(e) => {
                        run.fail(id, e.to_string());
                        stopped = !self.keep_going;
                    }
                }
            }

            while !stopped && running < workers {
                let Some(Reverse(id)) = run.queued.pop() else {
                    break;
                };
                match self.job(&mut run, id, single_writer) {
                    Ok(job) => {
                        run.set(id, TargetState::Running);
                        running += 1;
                        let tx = tx.clone();
                        pool.spawn(move || {
                            // The receiver only goes away if the coordinator
                            // itself panicked.
                            let _ = tx.send(job.execute());
                        });
                    }
                    Err(e) => {
                        run.fail(id, e.to_string());
                        stopped = !self.keep_going;
                    }
                }
            }

            if running == 0 {
                if !stopped && !run.ready.is_empty() {
                    continue;
                }
                break;
            }

            let Ok(finished) = rx.recv() else {
                break;
            };
            running -= 1;
            if !self.complete(&mut run, finished) && !self.keep_going {
                stopped = true;
            }
        }

        if stopped && !aborted {
            tracing::info!("stopped after first failure");
        }
        let report = run.finish(stopped, start.elapsed());
        tracing::info!(summary = %report, "run finished");
        self.progress.finished(&report);
        Ok(report)
    }

    /// Lists the targets the next [`run`](Self::run) would rebuild, in
    /// topological order, without executing anything.
    pub fn outdated(&self, plan: &Plan) -> Result<Vec<Outdated>, RunError> {
        let expanded = plan.expand()?;
        let graph = DependencyGraph::build_in(&expanded, self.engine.root())?;

        let mut fingerprints: Vec<Option<Fingerprint>> = vec![None; graph.len()];
        let mut stale = vec![false; graph.len()];
        let mut outdated = Vec::new();
        for &id in graph.topo_order() {
            let mut deps = Vec::new();
            let mut changed = None;
            for &up in graph.upstream(id) {
                if stale[up.index()] && changed.is_none() {
                    changed = Some(graph.name(up));
                }
                if let Some(fp) = fingerprints[up.index()] {
                    deps.push((graph.name(up), fp));
                }
            }
            let target = &expanded.targets()[id.index()];
            let node = graph.node(id);
            let reason = match self.assess(target, &node.file_inputs, &node.file_outputs, &deps, changed) {
                Ok(Freshness::UpToDate(fp)) => {
                    fingerprints[id.index()] = Some(fp);
                    continue;
                }
                Ok(Freshness::Stale(fp, reason)) => {
                    fingerprints[id.index()] = Some(fp);
                    reason
                }
                Err(BuildError::InputFile { path, .. }) => StaleReason::InputUnreadable(path),
                Err(e) => StaleReason::Unreadable(e.to_string()),
            };
            stale[id.index()] = true;
            outdated.push(Outdated {
                name: target.name().to_string(),
                reason,
            });
        }
        Ok(outdated)
    }

    fn freshness(&self, run: &RunState<'_>, id: TargetId) -> Result<Freshness, BuildError> {
        let mut deps = Vec::new();
        let mut changed = None;
        for &up in run.graph.upstream(id) {
            let name = run.graph.name(up);
            let fp = run.fingerprints[up.index()].ok_or_else(|| BuildError::Upstream {
                name: name.to_string(),
                reason: "fingerprint unresolved".to_string(),
            })?;
            deps.push((name, fp));
            if run.rebuilt[up.index()] && changed.is_none() {
                changed = Some(name);
            }
        }
        let node = run.graph.node(id);
        self.assess(
            &run.plan.targets()[id.index()],
            &node.file_inputs,
            &node.file_outputs,
            &deps,
            changed,
        )
    }

    /// Decides whether the cached entry for `target` is current.
    ///
    /// `changed` names an upstream target rebuilt in this run; its presence
    /// makes the target stale without consulting the cache.
    fn assess(
        &self,
        target: &Target,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        deps: &[(&str, Fingerprint)],
        changed: Option<&str>,
    ) -> Result<Freshness, BuildError> {
        let mut files = Vec::with_capacity(inputs.len());
        for path in inputs {
            let fp = self
                .engine
                .file(path)
                .map_err(|source| BuildError::InputFile {
                    path: path.clone(),
                    source,
                })?;
            files.push((path.clone(), fp));
        }
        let fp = self.engine.target(target, deps, &files);

        if let Some(upstream) = changed {
            return Ok(Freshness::Stale(
                fp,
                StaleReason::UpstreamRebuilt(upstream.to_string()),
            ));
        }
        let entry = match self.cache.entry(target.name()) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(Freshness::Stale(fp, StaleReason::NotCached)),
            Err(e) => {
                tracing::warn!(
                    name = target.name(),
                    error = %e,
                    "unreadable cache entry, rebuilding"
                );
                return Ok(Freshness::Stale(fp, StaleReason::Unreadable(e.to_string())));
            }
        };
        if entry.fingerprint != fp {
            return Ok(Freshness::Stale(fp, StaleReason::FingerprintChanged));
        }
        for path in outputs {
            let recorded = entry
                .meta
                .output_files
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, fp)| *fp);
            let current = self.engine.file(path).ok();
            if recorded.is_none() || recorded != current {
                return Ok(Freshness::Stale(fp, StaleReason::OutputChanged(path.clone())));
            }
        }
        Ok(Freshness::UpToDate(fp))
    }

    /// Gathers everything a worker needs to build `id`.
    fn job(&self, run: &mut RunState<'_>, id: TargetId, single_writer: bool) -> Result<Job, BuildError> {
        let (plan, graph) = (run.plan, run.graph);
        let target = &plan.targets()[id.index()];
        let meta = target.meta();
        let mut inputs = Inputs::new(target.name())
            .with_text(target.text())
            .with_params(meta.params.clone())
            .with_members(meta.members.clone());
        for &up in graph.upstream(id) {
            let value = run.value(up, &self.cache)?;
            inputs = inputs.with_value(graph.name(up), value);
        }
        let fingerprint = run.fingerprints[id.index()].ok_or_else(|| {
            BuildError::msg(format!("no fingerprint computed for '{}'", target.name()))
        })?;
        Ok(Job {
            id,
            name: target.name().to_string(),
            command: target.command().clone(),
            inputs,
            fingerprint,
            outputs: graph.node(id).file_outputs.clone(),
            engine: self.engine.clone(),
            cache: (!single_writer).then(|| self.cache.clone()),
        })
    }

    /// Records a finished command. Returns `false` if the target failed.
    fn complete(&self, run: &mut RunState<'_>, finished: Finished) -> bool {
        let id = finished.id;
        let graph = run.graph;
        let name = graph.name(id);
        run.elapsed[id.index()] = Some(finished.elapsed);
        let result = finished.result.and_then(|stored| {
            if !stored.written {
                self.cache
                    .put_entry(name, &stored.entry)
                    .map_err(|e| BuildError::Storage(e.to_string()))?;
            }
            Ok(stored.entry)
        });
        match result {
            Ok(entry) => {
                tracing::debug!(
                    name,
                    elapsed_ms = finished.elapsed.as_millis() as u64,
                    "built"
                );
                run.values.insert(id, Arc::new(entry.value));
                run.rebuilt[id.index()] = true;
                run.set(id, TargetState::Done);
                run.release(id);
                true
            }
            Err(e) => {
                tracing::warn!(name, error = %e, "build failed");
                run.fail(id, e.to_string());
                false
            }
        }
    }
}

/// Coordinator-side bookkeeping for one run.
struct RunState<'a> {
    plan: &'a ExpandedPlan,
    graph: &'a DependencyGraph,
    progress: &'a dyn Progress,
    states: Vec<TargetState>,
    fingerprints: Vec<Option<Fingerprint>>,
    rebuilt: Vec<bool>,
    /// Unfinished upstream targets per target.
    waiting: Vec<usize>,
    elapsed: Vec<Option<Duration>>,
    errors: Vec<Option<String>>,
    blocked_by: Vec<Option<String>>,
    /// Values built or loaded during this run.
    values: HashMap<TargetId, Arc<Value>>,
    /// Dependencies satisfied, freshness not yet checked.
    ready: BinaryHeap<Reverse<TargetId>>,
    /// Stale, waiting for a worker.
    queued: BinaryHeap<Reverse<TargetId>>,
}

impl<'a> RunState<'a> {
    fn new(plan: &'a ExpandedPlan, graph: &'a DependencyGraph, progress: &'a dyn Progress) -> Self {
        let n = graph.len();
        let waiting: Vec<usize> = graph
            .nodes()
            .iter()
            .map(|node| graph.upstream(node.id).len())
            .collect();
        let ready = graph.roots().into_iter().map(Reverse).collect();
        Self {
            plan,
            graph,
            progress,
            states: vec![TargetState::Pending; n],
            fingerprints: vec![None; n],
            rebuilt: vec![false; n],
            waiting,
            elapsed: vec![None; n],
            errors: vec![None; n],
            blocked_by: vec![None; n],
            values: HashMap::new(),
            ready,
            queued: BinaryHeap::new(),
        }
    }

    fn set(&mut self, id: TargetId, state: TargetState) {
        self.states[id.index()] = state;
        self.progress.state_changed(self.graph.name(id), state);
    }

    /// Marks `id` finished successfully and readies downstream targets whose
    /// last dependency it was.
    fn release(&mut self, id: TargetId) {
        for &down in self.graph.downstream(id) {
            let i = down.index();
            self.waiting[i] -= 1;
            if self.waiting[i] == 0 && self.states[i] == TargetState::Pending {
                self.ready.push(Reverse(down));
            }
        }
    }

    /// Marks `id` failed and every transitive dependent blocked.
    fn fail(&mut self, id: TargetId, error: String) {
        self.errors[id.index()] = Some(error);
        self.set(id, TargetState::Failed);
        let failed = self.graph.name(id).to_string();
        for down in self.graph.transitive_downstream(id) {
            if self.states[down.index()] == TargetState::Pending {
                self.blocked_by[down.index()] = Some(failed.clone());
                self.set(down, TargetState::Blocked);
            }
        }
    }

    /// An upstream value, loaded from the cache on first use.
    fn value(&mut self, up: TargetId, cache: &Cache) -> Result<Arc<Value>, BuildError> {
        if let Some(value) = self.values.get(&up) {
            return Ok(Arc::clone(value));
        }
        let graph = self.graph;
        let name = graph.name(up);
        let value = match cache.get(name) {
            Ok(Some(value)) => Arc::new(value),
            Ok(None) => {
                return Err(BuildError::Upstream {
                    name: name.to_string(),
                    reason: "missing from cache".to_string(),
                })
            }
            Err(e) => {
                return Err(BuildError::Upstream {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        };
        self.values.insert(up, Arc::clone(&value));
        Ok(value)
    }

    fn finish(mut self, stopped: bool, elapsed: Duration) -> RunReport {
        // Stale targets that never got a worker were not started.
        while let Some(Reverse(id)) = self.queued.pop() {
            self.set(id, TargetState::Pending);
        }
        let targets = self
            .graph
            .nodes()
            .iter()
            .map(|node| {
                let i = node.id.index();
                TargetReport {
                    name: node.name.clone(),
                    state: self.states[i],
                    elapsed: self.elapsed[i],
                    error: self.errors[i].take(),
                    blocked_by: self.blocked_by[i].take(),
                }
            })
            .collect();
        RunReport {
            targets,
            aborted: stopped,
            elapsed,
        }
    }
}

/// A stale target packaged for a worker thread.
struct Job {
    id: TargetId,
    name: String,
    command: Command,
    inputs: Inputs,
    fingerprint: Fingerprint,
    outputs: Vec<PathBuf>,
    engine: FingerprintEngine,
    /// Set when the backend accepts concurrent writers.
    cache: Option<Cache>,
}

struct Finished {
    id: TargetId,
    elapsed: Duration,
    result: Result<Stored, BuildError>,
}

struct Stored {
    entry: CacheEntry,
    written: bool,
}

impl Job {
    fn execute(self) -> Finished {
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.command.invoke(&self.inputs)));
        let elapsed = start.elapsed();
        let result = match outcome {
            Ok(Ok(value)) => self.store(value, elapsed),
            Ok(Err(e)) => Err(e),
            Err(payload) => Err(BuildError::Panicked(panic_message(payload.as_ref()))),
        };
        Finished {
            id: self.id,
            elapsed,
            result,
        }
    }

    fn store(&self, value: Value, elapsed: Duration) -> Result<Stored, BuildError> {
        let mut meta = BuildMeta::now(elapsed, self.engine.algorithm());
        for path in &self.outputs {
            let fp = self
                .engine
                .file(path)
                .map_err(|_| BuildError::MissingOutput(display_path(self.engine.root(), path)))?;
            meta.output_files.push((path.clone(), fp));
        }
        let entry = CacheEntry {
            value,
            fingerprint: self.fingerprint,
            meta,
        };
        let written = match &self.cache {
            Some(cache) => {
                cache
                    .put_entry(&self.name, &entry)
                    .map_err(|e| BuildError::Storage(e.to_string()))?;
                true
            }
            None => false,
        };
        Ok(Stored { entry, written })
    }
}

fn display_path(root: &Path, path: &Path) -> PathBuf {
    if root == Path::new(".") {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, TargetState)>>);

    impl Progress for Recorder {
        fn state_changed(&self, name: &str, state: TargetState) {
            self.0.lock().unwrap().push((name.to_string(), state));
        }
    }

    fn constant(name: &str, text: &str) -> Target {
        let out = text.to_string();
        Target::new(name, text, move |_| Ok(Value::text(out.clone())))
    }

    #[test]
    fn progress_sees_every_transition() {
        let recorder = Arc::new(Recorder::default());
        let plan = Plan::new()
            .with(constant("a", "one"))
            .with(constant("b", "two ${a}"));
        let scheduler = Scheduler::new(Cache::in_memory())
            .workers(1)
            .progress(recorder.clone());
        scheduler.run(&plan).unwrap();

        let events = recorder.0.lock().unwrap().clone();
        let a: Vec<_> = events
            .iter()
            .filter(|(n, _)| n == "a")
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(
            a,
            vec![TargetState::Stale, TargetState::Running, TargetState::Done]
        );
        let first_b = events.iter().position(|(n, _)| n == "b").unwrap();
        let a_done = events
            .iter()
            .position(|(n, s)| n == "a" && *s == TargetState::Done)
            .unwrap();
        assert!(a_done < first_b);
    }

    #[test]
    fn stale_reasons() {
        let cache = Cache::in_memory();
        let scheduler = Scheduler::new(cache.clone()).workers(1);
        let plan = Plan::new()
            .with(constant("a", "one"))
            .with(constant("b", "two ${a}"));

        let outdated = scheduler.outdated(&plan).unwrap();
        assert_eq!(
            outdated,
            vec![
                Outdated {
                    name: "a".to_string(),
                    reason: StaleReason::NotCached
                },
                Outdated {
                    name: "b".to_string(),
                    reason: StaleReason::UpstreamRebuilt("a".to_string())
                },
            ]
        );

        scheduler.run(&plan).unwrap();
        assert!(scheduler.outdated(&plan).unwrap().is_empty());

        let changed = Plan::new()
            .with(constant("a", "one!"))
            .with(constant("b", "two ${a}"));
        let outdated = scheduler.outdated(&changed).unwrap();
        assert_eq!(outdated[0].reason, StaleReason::FingerprintChanged);
        assert_eq!(outdated.len(), 2);
    }

    #[test]
    fn abort_handle_is_shared() {
        let handle = AbortHandle::new();
        let scheduler = Scheduler::new(Cache::in_memory()).with_abort_handle(handle.clone());
        assert!(!scheduler.abort_handle().is_aborted());
        handle.abort();
        assert!(scheduler.abort_handle().is_aborted());
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42u32), "non-string panic payload");
    }

    #[test]
    fn zero_workers_means_available_parallelism() {
        let scheduler = Scheduler::new(Cache::in_memory());
        assert!(scheduler.effective_workers() >= 1);
        assert_eq!(scheduler.workers(3).effective_workers(), 3);
    }
}
