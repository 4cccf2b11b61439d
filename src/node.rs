use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::revision::{MaterialRevision, PipelineRevision};

/// Identity of a graph node: a pipeline name, a material fingerprint, or a
/// generated dummy id. Compares and hashes case-insensitively, because the
/// server treats pipeline names as case-insensitive.
#[derive(Debug, Clone, Serialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for NodeId {}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(other.0.bytes().map(|b| b.to_ascii_lowercase()))
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Pipeline,
    /// A source-control or package dependency; carries the lower-case SCM
    /// kind ("git", "hg", "svn", "package", ...).
    Material(String),
    /// Synthesized placeholder keeping a multi-level edge contiguous.
    Dummy,
}

impl NodeKind {
    /// Upper-cased type tag used in the wire format ("PIPELINE", "GIT",
    /// "DUMMY", ...).
    pub fn type_tag(&self) -> String {
        match self {
            NodeKind::Pipeline => "PIPELINE".to_string(),
            NodeKind::Material(scm_type) => scm_type.to_uppercase(),
            NodeKind::Dummy => "DUMMY".to_string(),
        }
    }

    pub fn is_material(&self) -> bool {
        matches!(self, NodeKind::Material(_))
    }
}

/// Node-level degraded state. Not a whole-graph failure: the node stays in
/// the layout but projects without run data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewType {
    NoPermission,
    Deleted,
    Warning,
}

/// One node of the value stream map.
///
/// `level` is the signed distance from the root pipeline: the root starts at
/// 0, upstream nodes go negative, downstream nodes positive. The level
/// assembler re-bases to zero-indexed levels. `ordinal` records first
/// insertion order, which decides left-to-right placement within a level.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) level: i32,
    pub(crate) ordinal: u64,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) dependents: Vec<NodeId>,
    pub(crate) revisions: Vec<PipelineRevision>,
    pub(crate) material_revisions: Vec<MaterialRevision>,
    pub(crate) material_names: Vec<String>,
    pub(crate) view_type: Option<ViewType>,
    pub(crate) message: Option<String>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, kind: NodeKind, level: i32, ordinal: u64) -> Self {
        Self {
            id,
            name,
            kind,
            level,
            ordinal,
            parents: Vec::new(),
            dependents: Vec::new(),
            revisions: Vec::new(),
            material_revisions: Vec::new(),
            material_names: Vec::new(),
            view_type: None,
            message: None,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn dependents(&self) -> &[NodeId] {
        &self.dependents
    }

    pub fn revisions(&self) -> &[PipelineRevision] {
        &self.revisions
    }

    pub fn material_revisions(&self) -> &[MaterialRevision] {
        &self.material_revisions
    }

    pub fn material_names(&self) -> &[String] {
        &self.material_names
    }

    pub fn view_type(&self) -> Option<ViewType> {
        self.view_type
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub(crate) fn add_parent_if_absent(&mut self, id: &NodeId) {
        if !self.parents.contains(id) {
            self.parents.push(id.clone());
        }
    }

    pub(crate) fn add_dependent_if_absent(&mut self, id: &NodeId) {
        if !self.dependents.contains(id) {
            self.dependents.push(id.clone());
        }
    }
}
