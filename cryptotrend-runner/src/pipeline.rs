//! Task graph orchestration for one pipeline run.
//!
//! Tasks run in topological layers; tasks within a layer run concurrently on
//! the rayon pool. A task whose dependency did not succeed is skipped, and a
//! failure never rolls back sibling branches that already finished.

use crate::config::PipelineConfig;
use crate::stages;
use chrono::{DateTime, Local};
use cryptotrend_core::data::MarketDataProvider;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// The five pipeline stages, by their stable task ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Ingest,
    Clean,
    Classify,
    Report,
    Publish,
}

impl StageId {
    pub const ALL: [StageId; 5] = [
        StageId::Ingest,
        StageId::Clean,
        StageId::Classify,
        StageId::Report,
        StageId::Publish,
    ];

    pub fn task_id(&self) -> &'static str {
        match self {
            StageId::Ingest => "ingest_api_data",
            StageId::Clean => "clean_historical_data",
            StageId::Classify => "classify_api_data",
            StageId::Report => "generate_data_quality_reports",
            StageId::Publish => "download_final_data",
        }
    }

    /// `{Ingest, Clean} → Classify → {Report, Publish}`.
    pub fn dependencies(&self) -> &'static [StageId] {
        match self {
            StageId::Ingest | StageId::Clean => &[],
            StageId::Classify => &[StageId::Ingest, StageId::Clean],
            StageId::Report | StageId::Publish => &[StageId::Classify],
        }
    }

    pub fn from_task_id(id: &str) -> Option<StageId> {
        Self::ALL.into_iter().find(|s| s.task_id() == id)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_id())
    }
}

impl FromStr for StageId {
    type Err = String;

    /// Accepts the task id or the short name (`ingest`, `clean`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(id) = Self::from_task_id(&s) {
            return Ok(id);
        }
        match s.as_str() {
            "ingest" => Ok(StageId::Ingest),
            "clean" => Ok(StageId::Clean),
            "classify" => Ok(StageId::Classify),
            "report" => Ok(StageId::Report),
            "publish" => Ok(StageId::Publish),
            _ => Err(format!("unknown stage: {s}")),
        }
    }
}

/// What happened to one task in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded { detail: String },
    Failed { error: String },
    /// Not run because these dependencies did not succeed.
    Skipped { blocked_by: Vec<String> },
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("task registered twice: {0}")]
    DuplicateTask(String),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("dependency cycle among tasks: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

type TaskFn<'a> = Box<dyn Fn() -> Result<String, String> + Send + Sync + 'a>;

struct Task<'a> {
    id: String,
    dependencies: Vec<String>,
    run: TaskFn<'a>,
}

/// Directed acyclic graph of named tasks.
#[derive(Default)]
pub struct TaskGraph<'a> {
    tasks: Vec<Task<'a>>,
}

impl<'a> TaskGraph<'a> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn add_task<F>(
        &mut self,
        id: impl Into<String>,
        dependencies: &[&str],
        run: F,
    ) -> Result<(), GraphError>
    where
        F: Fn() -> Result<String, String> + Send + Sync + 'a,
    {
        let id = id.into();
        if self.tasks.iter().any(|t| t.id == id) {
            return Err(GraphError::DuplicateTask(id));
        }
        self.tasks.push(Task {
            id,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            run: Box::new(run),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Topological layers (Kahn's algorithm). Within a layer, tasks keep
    /// registration order.
    pub fn layers(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let known: HashSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        for task in &self.tasks {
            for dep in &task.dependencies {
                if !known.contains(dep.as_str()) {
                    return Err(GraphError::UnknownDependency {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut remaining: HashMap<&str, usize> = self
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t.dependencies.len()))
            .collect();
        let mut layers = Vec::new();

        while !remaining.is_empty() {
            let ready: Vec<String> = self
                .tasks
                .iter()
                .filter(|t| remaining.get(t.id.as_str()) == Some(&0))
                .map(|t| t.id.clone())
                .collect();

            if ready.is_empty() {
                let mut stuck: Vec<String> = remaining.keys().map(|k| k.to_string()).collect();
                stuck.sort();
                return Err(GraphError::Cycle(stuck));
            }

            for id in &ready {
                remaining.remove(id.as_str());
            }
            for task in &self.tasks {
                if let Some(n) = remaining.get_mut(task.id.as_str()) {
                    *n -= task.dependencies.iter().filter(|d| ready.contains(*d)).count();
                }
            }
            layers.push(ready);
        }
        Ok(layers)
    }

    /// Run every task once, respecting dependencies.
    pub fn execute(&self) -> Result<BTreeMap<String, StageOutcome>, GraphError> {
        let layers = self.layers()?;
        let by_id: HashMap<&str, &Task<'a>> =
            self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut outcomes: BTreeMap<String, StageOutcome> = BTreeMap::new();

        for layer in layers {
            let results: Vec<(String, StageOutcome)> = layer
                .par_iter()
                .filter_map(|id| by_id.get(id.as_str()).map(|t| (id, *t)))
                .map(|(id, task)| {
                    let blocked_by: Vec<String> = task
                        .dependencies
                        .iter()
                        .filter(|d| !outcomes.get(*d).is_some_and(StageOutcome::is_success))
                        .cloned()
                        .collect();
                    if !blocked_by.is_empty() {
                        warn!(task = %id, blocked_by = ?blocked_by, "task skipped");
                        return (id.clone(), StageOutcome::Skipped { blocked_by });
                    }
                    (id.clone(), run_task(task))
                })
                .collect();
            outcomes.extend(results);
        }
        Ok(outcomes)
    }
}

fn run_task(task: &Task<'_>) -> StageOutcome {
    info!(task = %task.id, "task started");
    let start = Instant::now();
    match (task.run)() {
        Ok(detail) => {
            info!(task = %task.id, elapsed_ms = start.elapsed().as_millis() as u64, %detail, "task succeeded");
            StageOutcome::Succeeded { detail }
        }
        Err(error) => {
            error!(task = %task.id, elapsed_ms = start.elapsed().as_millis() as u64, %error, "task failed");
            StageOutcome::Failed { error }
        }
    }
}

/// Result of one full graph run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// `YYYYMMDD_HHMMSS` stamp used for published file names.
    pub run_timestamp: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub outcomes: BTreeMap<String, StageOutcome>,
}

impl RunReport {
    pub fn outcome(&self, stage: StageId) -> Option<&StageOutcome> {
        self.outcomes.get(stage.task_id())
    }

    pub fn succeeded(&self) -> bool {
        self.outcomes.values().all(StageOutcome::is_success)
    }

    /// Task ids that failed or were skipped.
    pub fn failed_stages(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Config and provider bound to the stage graph.
pub struct Pipeline {
    config: PipelineConfig,
    provider: Box<dyn MarketDataProvider>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, provider: Box<dyn MarketDataProvider>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one stage's entry point on its own, ignoring the graph.
    pub fn run_stage(&self, stage: StageId, run_time: DateTime<Local>) -> Result<String, String> {
        let config = &self.config;
        match stage {
            StageId::Ingest => stages::ingest_api_data(self.provider.as_ref(), config)
                .map(|s| s.to_string())
                .map_err(|e| e.to_string()),
            StageId::Clean => stages::clean_historical_data(config)
                .map(|s| s.to_string())
                .map_err(|e| e.to_string()),
            StageId::Classify => stages::classify_api_data(config)
                .map(|s| s.to_string())
                .map_err(|e| e.to_string()),
            StageId::Report => Ok(stages::generate_data_quality_reports(config).to_string()),
            StageId::Publish => stages::download_final_data(config, run_time)
                .map(|s| s.to_string())
                .map_err(|e| e.to_string()),
        }
    }

    /// The five stages wired with their dependencies for `run_time`.
    pub fn graph(&self, run_time: DateTime<Local>) -> Result<TaskGraph<'_>, GraphError> {
        let mut graph = TaskGraph::new();
        for stage in StageId::ALL {
            let deps: Vec<&str> = stage.dependencies().iter().map(|d| d.task_id()).collect();
            graph.add_task(stage.task_id(), &deps, move || self.run_stage(stage, run_time))?;
        }
        Ok(graph)
    }

    pub fn run(&self) -> Result<RunReport, GraphError> {
        self.run_at(Local::now())
    }

    /// Run the whole graph once, stamping published files with `run_time`.
    pub fn run_at(&self, run_time: DateTime<Local>) -> Result<RunReport, GraphError> {
        let run_timestamp = stages::publish::run_timestamp(&run_time);
        info!(provider = self.provider.name(), run = %run_timestamp, "pipeline run started");

        let started_at = Local::now();
        let outcomes = self.graph(run_time)?.execute()?;
        let report = RunReport {
            run_timestamp,
            started_at,
            finished_at: Local::now(),
            outcomes,
        };

        if report.succeeded() {
            info!(run = %report.run_timestamp, "pipeline run succeeded");
        } else {
            error!(
                run = %report.run_timestamp,
                failed = ?report.failed_stages(),
                "pipeline run did not complete"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn stage_ids_round_trip() {
        for stage in StageId::ALL {
            assert_eq!(StageId::from_task_id(stage.task_id()), Some(stage));
            assert_eq!(stage.task_id().parse::<StageId>(), Ok(stage));
        }
        assert_eq!("publish".parse::<StageId>(), Ok(StageId::Publish));
        assert!("nope".parse::<StageId>().is_err());
    }

    #[test]
    fn stage_layers_follow_dependency_order() {
        let mut graph = TaskGraph::new();
        for stage in StageId::ALL {
            let deps: Vec<&str> = stage.dependencies().iter().map(|d| d.task_id()).collect();
            graph
                .add_task(stage.task_id(), &deps, || Ok(String::new()))
                .unwrap();
        }
        assert_eq!(
            graph.layers().unwrap(),
            vec![
                vec!["ingest_api_data", "clean_historical_data"],
                vec!["classify_api_data"],
                vec!["generate_data_quality_reports", "download_final_data"],
            ]
        );
    }

    #[test]
    fn graph_validation() {
        let mut graph = TaskGraph::new();
        graph.add_task("a", &[], || Ok(String::new())).unwrap();
        assert_eq!(
            graph.add_task("a", &[], || Ok(String::new())),
            Err(GraphError::DuplicateTask("a".into()))
        );

        graph.add_task("b", &["zzz"], || Ok(String::new())).unwrap();
        assert!(matches!(
            graph.layers(),
            Err(GraphError::UnknownDependency { .. })
        ));

        let mut cyclic = TaskGraph::new();
        cyclic.add_task("x", &["y"], || Ok(String::new())).unwrap();
        cyclic.add_task("y", &["x"], || Ok(String::new())).unwrap();
        assert_eq!(
            cyclic.layers(),
            Err(GraphError::Cycle(vec!["x".into(), "y".into()]))
        );
    }

    #[test]
    fn failure_skips_dependents_but_not_siblings() {
        let ran = Mutex::new(Vec::new());
        let mut graph = TaskGraph::new();
        graph
            .add_task("a", &[], || Err("boom".to_string()))
            .unwrap();
        graph
            .add_task("b", &[], || {
                ran.lock().unwrap().push("b");
                Ok("ok".to_string())
            })
            .unwrap();
        graph
            .add_task("c", &["a", "b"], || {
                ran.lock().unwrap().push("c");
                Ok(String::new())
            })
            .unwrap();
        graph
            .add_task("d", &["c"], || {
                ran.lock().unwrap().push("d");
                Ok(String::new())
            })
            .unwrap();

        let outcomes = graph.execute().unwrap();
        assert_eq!(outcomes["a"], StageOutcome::Failed { error: "boom".into() });
        assert_eq!(outcomes["b"], StageOutcome::Succeeded { detail: "ok".into() });
        assert_eq!(
            outcomes["c"],
            StageOutcome::Skipped {
                blocked_by: vec!["a".into()]
            }
        );
        assert_eq!(
            outcomes["d"],
            StageOutcome::Skipped {
                blocked_by: vec!["c".into()]
            }
        );
        assert_eq!(*ran.lock().unwrap(), vec!["b"]);
    }
}
