//! Scripted project runs.
//!
//! [`ScriptedRunFactory`] hands out runs that either complete immediately or
//! hold until released, so tests control exactly when a slot frees up.

use crate::errors::run_failed;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracker_indexer_domain::{ProjectKey, ProjectRunSnapshot, RunKind, RunOutcome};
use tracker_indexer_ports::{BoxFuture, ProjectRun, ProjectRunFactoryPort};
use tracker_indexer_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};

/// How scripted runs behave once executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScript {
    /// Finish as soon as executed.
    Complete,
    /// Wait for [`ScriptedRunFactory::release`] or interruption.
    Hold,
}

#[derive(Debug)]
struct FactoryState {
    script: RunScript,
    created: Vec<(ProjectKey, RunKind)>,
    gates: BTreeMap<ProjectKey, Arc<Semaphore>>,
    failing_runs: BTreeSet<ProjectKey>,
    failing_creates: BTreeSet<ProjectKey>,
    running: usize,
    peak_running: usize,
    interrupted: Vec<ProjectKey>,
    issues_per_run: u64,
}

/// Factory of [`ScriptedRun`]s sharing one observable state.
#[derive(Debug, Clone)]
pub struct ScriptedRunFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl ScriptedRunFactory {
    /// Runs finish as soon as they execute.
    pub fn completing() -> Self {
        Self::with_script(RunScript::Complete)
    }

    /// Runs hold their slot until released or interrupted.
    pub fn holding() -> Self {
        Self::with_script(RunScript::Hold)
    }

    fn with_script(script: RunScript) -> Self {
        Self {
            state: Arc::new(Mutex::new(FactoryState {
                script,
                created: Vec::new(),
                gates: BTreeMap::new(),
                failing_runs: BTreeSet::new(),
                failing_creates: BTreeSet::new(),
                running: 0,
                peak_running: 0,
                interrupted: Vec::new(),
                issues_per_run: 1,
            })),
        }
    }

    /// Let one held run of `project_key` finish.
    pub fn release(&self, project_key: &ProjectKey) {
        let gate = self.gate(project_key);
        gate.add_permits(1);
    }

    /// Switch to completing mode and release every held run.
    pub fn release_all(&self) {
        let mut state = self.state.lock().unwrap();
        state.script = RunScript::Complete;
        for gate in state.gates.values() {
            gate.add_permits(1);
        }
    }

    /// Make runs of `project_key` fail after their gate opens.
    pub fn fail_project(&self, project_key: &ProjectKey) {
        self.state
            .lock()
            .unwrap()
            .failing_runs
            .insert(project_key.clone());
    }

    /// Make [`ProjectRunFactoryPort::create`] fail for `project_key`.
    pub fn fail_create_for(&self, project_key: &ProjectKey) {
        self.state
            .lock()
            .unwrap()
            .failing_creates
            .insert(project_key.clone());
    }

    /// Every created run, in creation order.
    pub fn created(&self) -> Vec<(ProjectKey, RunKind)> {
        self.state.lock().unwrap().created.clone()
    }

    /// Kinds of the runs created for `project_key`.
    pub fn created_for(&self, project_key: &ProjectKey) -> Vec<RunKind> {
        self.created()
            .into_iter()
            .filter(|(key, _)| key == project_key)
            .map(|(_, kind)| kind)
            .collect()
    }

    /// Runs executing right now.
    pub fn running(&self) -> usize {
        self.state.lock().unwrap().running
    }

    /// Highest number of simultaneously executing runs.
    pub fn peak_running(&self) -> usize {
        self.state.lock().unwrap().peak_running
    }

    /// Projects whose run observed an interruption.
    pub fn interrupted(&self) -> Vec<ProjectKey> {
        self.state.lock().unwrap().interrupted.clone()
    }

    fn gate(&self, project_key: &ProjectKey) -> Arc<Semaphore> {
        let mut state = self.state.lock().unwrap();
        Arc::clone(
            state
                .gates
                .entry(project_key.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(0))),
        )
    }
}

impl ProjectRunFactoryPort for ScriptedRunFactory {
    fn create(
        &self,
        project_key: ProjectKey,
        run_kind: RunKind,
        started_at: DateTime<Utc>,
    ) -> Result<Arc<dyn ProjectRun>> {
        {
            let mut state = self.state.lock().unwrap();
            if state.failing_creates.contains(&project_key) {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::new("indexer", "create_failed"),
                    "scripted create failure",
                )
                .with_metadata("project", project_key.as_str()));
            }
            state.created.push((project_key.clone(), run_kind));
        }
        let gate = self.gate(&project_key);
        Ok(Arc::new(ScriptedRun {
            factory: self.clone(),
            gate,
            snapshot: Mutex::new(ProjectRunSnapshot::started(
                project_key.clone(),
                run_kind,
                started_at,
            )),
            project_key,
            run_kind,
        }))
    }
}

/// One run created by [`ScriptedRunFactory`].
#[derive(Debug)]
pub struct ScriptedRun {
    factory: ScriptedRunFactory,
    gate: Arc<Semaphore>,
    project_key: ProjectKey,
    run_kind: RunKind,
    snapshot: Mutex<ProjectRunSnapshot>,
}

struct RunningGuard<'a>(&'a ScriptedRunFactory);

impl<'a> RunningGuard<'a> {
    fn enter(factory: &'a ScriptedRunFactory) -> Self {
        let mut state = factory.state.lock().unwrap();
        state.running += 1;
        state.peak_running = state.peak_running.max(state.running);
        drop(state);
        Self(factory)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().unwrap().running -= 1;
    }
}

impl ScriptedRun {
    async fn wait_for_release(&self, ctx: &RequestContext) -> Result<()> {
        if self.factory.state.lock().unwrap().script == RunScript::Complete {
            return Ok(());
        }
        tokio::select! {
            permit = self.gate.acquire() => {
                if let Ok(permit) = permit {
                    permit.forget();
                }
                Ok(())
            }
            () = ctx.cancelled() => {
                self.factory
                    .state
                    .lock()
                    .unwrap()
                    .interrupted
                    .push(self.project_key.clone());
                Err(ErrorEnvelope::cancelled("scripted run interrupted"))
            }
        }
    }
}

impl ProjectRun for ScriptedRun {
    fn project_key(&self) -> &ProjectKey {
        &self.project_key
    }

    fn run_kind(&self) -> RunKind {
        self.run_kind
    }

    fn execute(self: Arc<Self>, ctx: RequestContext) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let _running = RunningGuard::enter(&self.factory);
            self.wait_for_release(&ctx).await?;

            let (failing, issues) = {
                let state = self.factory.state.lock().unwrap();
                (
                    state.failing_runs.contains(&self.project_key),
                    state.issues_per_run,
                )
            };
            if failing {
                return Err(run_failed(&self.project_key));
            }

            let mut snapshot = self.snapshot.lock().unwrap();
            snapshot.progress.issues_updated += issues;
            let finished_at = snapshot.started_at;
            *snapshot = snapshot
                .clone()
                .finished(RunOutcome::Succeeded, finished_at, None);
            Ok(())
        })
    }

    fn snapshot(&self) -> ProjectRunSnapshot {
        self.snapshot.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(value: &str) -> ProjectKey {
        ProjectKey::parse(value).unwrap()
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    #[tokio::test]
    async fn completing_runs_finish_immediately() -> Result<()> {
        let factory = ScriptedRunFactory::completing();
        let run = factory.create(key("ORG"), RunKind::Full, epoch())?;
        Arc::clone(&run).execute(RequestContext::new_job()).await?;

        let snapshot = run.snapshot();
        assert_eq!(snapshot.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(snapshot.progress.issues_updated, 1);
        assert_eq!(factory.created(), vec![(key("ORG"), RunKind::Full)]);
        assert_eq!(factory.peak_running(), 1);
        assert_eq!(factory.running(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn held_runs_wait_for_release() -> Result<()> {
        let factory = ScriptedRunFactory::holding();
        let run = factory.create(key("AS7"), RunKind::Incremental, epoch())?;
        let task = tokio::spawn(Arc::clone(&run).execute(RequestContext::new_job()));

        tokio::task::yield_now().await;
        assert_eq!(factory.running(), 1);
        assert!(!task.is_finished());

        factory.release(&key("AS7"));
        task.await.unwrap()?;
        assert_eq!(factory.running(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn held_runs_stop_on_interrupt() -> Result<()> {
        let factory = ScriptedRunFactory::holding();
        let run = factory.create(key("JBESB"), RunKind::Full, epoch())?;
        let ctx = RequestContext::new_job();
        let task = tokio::spawn(Arc::clone(&run).execute(ctx.clone()));

        tokio::task::yield_now().await;
        ctx.cancel();
        let error = task.await.unwrap().unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(factory.interrupted(), vec![key("JBESB")]);
        assert!(!run.snapshot().is_finished());
        Ok(())
    }

    #[tokio::test]
    async fn failing_projects_report_errors() {
        let factory = ScriptedRunFactory::completing();
        factory.fail_project(&key("ORG"));
        factory.fail_create_for(&key("AS7"));

        let run = factory.create(key("ORG"), RunKind::Full, epoch()).unwrap();
        assert!(run.execute(RequestContext::new_job()).await.is_err());
        assert!(factory.create(key("AS7"), RunKind::Full, epoch()).is_err());
        assert_eq!(factory.created_for(&key("AS7")), Vec::new());
    }
}
