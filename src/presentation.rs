use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::graph::ValueStreamGraph;
use crate::levels::assemble_levels;
use crate::node::{Node, NodeKind, ViewType};
use crate::revision::{MaterialRevision, Modification, PipelineRevision, StageStatus, StageSummary};

/// Builds the link to a pipeline instance: `(pipeline_name, counter)`.
pub type PipelineHistoryFn = dyn Fn(&str, u32) -> String;
/// Builds the link to a material modification: `(fingerprint, revision)`.
pub type MaterialModificationFn = dyn Fn(&str, &str) -> String;
/// Builds the link to a stage detail page:
/// `(pipeline_name, counter, stage_name, stage_counter)`.
pub type StageDetailFn = dyn Fn(&str, u32, &str, u32) -> String;
/// Decides editability of a pipeline: `Some(edit_path)` grants it.
pub type PipelineEditFn = dyn Fn(&str) -> Option<String>;
/// Humanizes a modification timestamp ("less than a minute ago").
pub type HumanizeTimeFn = dyn Fn(DateTime<Utc>) -> String;

/// The path-building callbacks injected by the presentation layer. Every
/// one is optional; a missing formatter projects as an empty locator (or
/// not-editable, or an RFC 3339 timestamp for the humanizer).
#[derive(Default)]
pub struct Formatters<'a> {
    pub pipeline_history: Option<&'a PipelineHistoryFn>,
    pub material_modification: Option<&'a MaterialModificationFn>,
    pub stage_detail: Option<&'a StageDetailFn>,
    pub pipeline_edit: Option<&'a PipelineEditFn>,
    pub humanize_time: Option<&'a HumanizeTimeFn>,
}

/// The render-ready model handed to the UI layer. Field names, nesting and
/// null-vs-absent semantics are a stable contract with the view.
#[derive(Debug, Serialize)]
pub struct GraphModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_pipeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<LevelModel>>,
}

#[derive(Debug, Serialize)]
pub struct LevelModel {
    pub nodes: Vec<NodeModel>,
}

#[derive(Debug, Serialize)]
pub struct NodeModel {
    pub id: String,
    pub name: String,
    pub node_type: String,
    pub locator: String,
    /// 1-based row within the node's level.
    pub depth: usize,
    pub parents: Vec<String>,
    pub dependents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<Vec<InstanceModel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_revisions: Option<Vec<MaterialRevisionModel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_type: Option<ViewType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub can_edit: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub edit_path: String,
}

#[derive(Debug, Serialize)]
pub struct InstanceModel {
    pub label: String,
    pub counter: u32,
    pub locator: String,
    pub stages: Vec<StageModel>,
}

#[derive(Debug, Serialize)]
pub struct StageModel {
    pub name: String,
    pub status: StageStatus,
    pub locator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MaterialRevisionModel {
    pub modifications: Vec<ModificationModel>,
}

#[derive(Debug, Serialize)]
pub struct ModificationModel {
    pub revision: String,
    pub user: String,
    pub comment: String,
    pub modified_time: String,
    pub locator: String,
}

impl GraphModel {
    /// A model carrying only the resolution failure; nothing else is set.
    pub fn for_error(message: impl Into<String>) -> Self {
        Self {
            current_pipeline: None,
            current_material: None,
            error: Some(message.into()),
            levels: None,
        }
    }

    /// Projects the graph into the renderable model. A non-null `error`
    /// from the upstream resolution step wins over everything: the model
    /// carries only that message and no traversal happens.
    pub fn render(
        graph: &mut ValueStreamGraph,
        error: Option<String>,
        formatters: &Formatters,
    ) -> Result<Self> {
        if let Some(message) = error {
            return Ok(Self::for_error(message));
        }

        let levels = assemble_levels(graph)?;
        let mut level_models = Vec::with_capacity(levels.len());
        for level in &levels {
            let nodes = level
                .nodes
                .iter()
                .enumerate()
                .filter_map(|(row, id)| graph.find_node(id).map(|node| (row, node)))
                .map(|(row, node)| project_node(node, row + 1, formatters))
                .collect();
            level_models.push(LevelModel { nodes });
        }

        let (current_pipeline, current_material) = if graph.root().kind().is_material() {
            (None, Some(graph.root().name().to_string()))
        } else {
            (Some(graph.root().name().to_string()), None)
        };

        Ok(Self {
            current_pipeline,
            current_material,
            error: None,
            levels: Some(level_models),
        })
    }
}

fn project_node(node: &Node, row: usize, formatters: &Formatters) -> NodeModel {
    let ids = |list: &[crate::node::NodeId]| -> Vec<String> {
        list.iter().map(|id| id.as_str().to_string()).collect()
    };
    let denied = node.view_type() == Some(ViewType::NoPermission);

    let (locator, instances, material_revisions, material_names, can_edit, edit_path) =
        match node.kind() {
            NodeKind::Pipeline if denied => {
                // Run data stays hidden even when it was resolved.
                (String::new(), Some(Vec::new()), None, None, false, String::new())
            }
            NodeKind::Pipeline => {
                let instances: Vec<InstanceModel> = node
                    .revisions()
                    .iter()
                    .map(|revision| project_instance(node.name(), revision, formatters))
                    .collect();
                let newest = node.revisions().iter().map(|r| r.counter).max().unwrap_or(0);
                let locator = match (newest, formatters.pipeline_history) {
                    (counter, Some(format)) if counter > 0 => format(node.name(), counter),
                    _ => String::new(),
                };
                let edit_path = formatters
                    .pipeline_edit
                    .and_then(|format| format(node.name()));
                (
                    locator,
                    Some(instances),
                    None,
                    None,
                    edit_path.is_some(),
                    edit_path.unwrap_or_default(),
                )
            }
            NodeKind::Material(_) => {
                let revisions = if denied {
                    Vec::new()
                } else {
                    node.material_revisions()
                        .iter()
                        .map(|revision| {
                            project_material_revision(node.id().as_str(), revision, formatters)
                        })
                        .collect()
                };
                (
                    String::new(),
                    None,
                    Some(revisions),
                    Some(node.material_names().to_vec()),
                    false,
                    String::new(),
                )
            }
            NodeKind::Dummy => (
                String::new(),
                Some(Vec::new()),
                None,
                None,
                false,
                String::new(),
            ),
        };

    NodeModel {
        id: node.id().as_str().to_string(),
        name: node.name().to_string(),
        node_type: node.kind().type_tag(),
        locator,
        depth: row,
        parents: ids(node.parents()),
        dependents: ids(node.dependents()),
        instances,
        material_revisions,
        material_names,
        view_type: node.view_type(),
        message: node.message().map(str::to_string),
        can_edit,
        edit_path,
    }
}

fn project_instance(
    pipeline_name: &str,
    revision: &PipelineRevision,
    formatters: &Formatters,
) -> InstanceModel {
    let locator = match formatters.pipeline_history {
        Some(format) if revision.has_run() => format(pipeline_name, revision.counter),
        _ => String::new(),
    };
    InstanceModel {
        label: revision.label.clone(),
        counter: revision.counter,
        locator,
        stages: revision
            .stages
            .iter()
            .map(|stage| project_stage(pipeline_name, revision.counter, stage, formatters))
            .collect(),
    }
}

fn project_stage(
    pipeline_name: &str,
    counter: u32,
    stage: &StageSummary,
    formatters: &Formatters,
) -> StageModel {
    let locator = match formatters.stage_detail {
        Some(format) if stage.status != StageStatus::Unknown => {
            format(pipeline_name, counter, &stage.name, stage.counter)
        }
        _ => String::new(),
    };
    StageModel {
        name: stage.name.clone(),
        status: stage.status,
        locator,
        duration: stage.duration,
    }
}

fn project_material_revision(
    fingerprint: &str,
    revision: &MaterialRevision,
    formatters: &Formatters,
) -> MaterialRevisionModel {
    MaterialRevisionModel {
        modifications: revision
            .modifications
            .iter()
            .map(|modification| project_modification(fingerprint, modification, formatters))
            .collect(),
    }
}

fn project_modification(
    fingerprint: &str,
    modification: &Modification,
    formatters: &Formatters,
) -> ModificationModel {
    let locator = formatters
        .material_modification
        .map(|format| format(fingerprint, &modification.revision))
        .unwrap_or_default();
    let modified_time = formatters
        .humanize_time
        .map(|humanize| humanize(modification.modified_time))
        .unwrap_or_else(|| modification.modified_time.to_rfc3339());
    ModificationModel {
        revision: modification.revision.clone(),
        user: if modification.user.is_empty() {
            "anonymous".to_string()
        } else {
            modification.user.clone()
        },
        comment: modification.comment.clone(),
        modified_time,
        locator,
    }
}
