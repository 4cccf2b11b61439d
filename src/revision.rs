use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of one stage run within a pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageStatus {
    Passed,
    Failed,
    Cancelled,
    Building,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct StageSummary {
    pub name: String,
    pub status: StageStatus,
    /// Wall-clock duration in seconds; absent while the stage is running or
    /// has never run.
    pub duration: Option<i64>,
    /// Stage counter within the pipeline instance (re-runs bump it).
    pub counter: u32,
}

impl StageSummary {
    pub fn new(name: impl Into<String>, status: StageStatus, duration: Option<i64>) -> Self {
        Self {
            name: name.into(),
            status,
            duration,
            counter: 1,
        }
    }

    pub fn with_counter(mut self, counter: u32) -> Self {
        self.counter = counter;
        self
    }
}

/// One concrete, numbered execution of a pipeline, with its stage results.
/// A counter of 0 with an empty label marks a revision that has not run.
#[derive(Debug, Clone)]
pub struct PipelineRevision {
    pub label: String,
    pub counter: u32,
    pub stages: Vec<StageSummary>,
}

impl PipelineRevision {
    pub fn new(label: impl Into<String>, counter: u32, stages: Vec<StageSummary>) -> Self {
        Self {
            label: label.into(),
            counter,
            stages,
        }
    }

    /// The instance for a pipeline revision that has not run yet: empty
    /// label, counter 0, and every stage reporting `Unknown`.
    pub fn unrun<S: Into<String>>(stage_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            label: String::new(),
            counter: 0,
            stages: stage_names
                .into_iter()
                .map(|name| StageSummary::new(name, StageStatus::Unknown, None))
                .collect(),
        }
    }

    pub fn has_run(&self) -> bool {
        self.counter > 0
    }

    /// Instance identity used to deduplicate repeated upstream hops.
    pub(crate) fn same_instance(&self, other: &PipelineRevision) -> bool {
        self.counter == other.counter && self.label == other.label
    }
}

/// A single check-in within a material revision.
#[derive(Debug, Clone)]
pub struct Modification {
    pub revision: String,
    pub user: String,
    pub comment: String,
    pub modified_time: DateTime<Utc>,
}

impl Modification {
    pub fn new(
        revision: impl Into<String>,
        user: impl Into<String>,
        comment: impl Into<String>,
        modified_time: DateTime<Utc>,
    ) -> Self {
        Self {
            revision: revision.into(),
            user: user.into(),
            comment: comment.into(),
            modified_time,
        }
    }
}

/// A material's check-in history entry as resolved for one upstream hop.
///
/// Two revisions are the same when their latest modification carries the
/// same revision string; merging unions the modification lists without
/// duplicating revisions.
#[derive(Debug, Clone, Default)]
pub struct MaterialRevision {
    /// Identifier of the concrete material (repository URL or similar),
    /// used to detect a pipeline built from incompatible revisions of the
    /// same material. Absent when only topology is known.
    pub material: Option<String>,
    /// Newest first, matching the server's resolution order.
    pub modifications: Vec<Modification>,
}

impl MaterialRevision {
    pub fn new(material: Option<String>, modifications: Vec<Modification>) -> Self {
        Self {
            material,
            modifications,
        }
    }

    pub fn latest_revision(&self) -> Option<&str> {
        self.modifications.first().map(|m| m.revision.as_str())
    }

    pub(crate) fn same_revision(&self, other: &MaterialRevision) -> bool {
        match (self.latest_revision(), other.latest_revision()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub(crate) fn merge(&mut self, other: MaterialRevision) {
        for modification in other.modifications {
            if !self
                .modifications
                .iter()
                .any(|m| m.revision == modification.revision)
            {
                self.modifications.push(modification);
            }
        }
        if self.material.is_none() {
            self.material = other.material;
        }
    }
}
