use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::{Result, VsmError};
use crate::node::{Node, NodeId, NodeKind, ViewType};
use crate::presentation::{Formatters, GraphModel};
use crate::revision::{MaterialRevision, PipelineRevision};

/// Descriptor for a pipeline node, as resolved by the dependency service.
#[derive(Debug, Clone)]
pub struct PipelineDependency {
    pub id: String,
    pub name: String,
}

impl PipelineDependency {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Pipeline whose id is its name, the common case.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
        }
    }
}

/// Descriptor for a material (SCM) node: fingerprint identity, display
/// name, and the lower-case SCM kind ("git", "hg", "svn", "package", ...).
#[derive(Debug, Clone)]
pub struct MaterialDependency {
    pub fingerprint: String,
    pub name: String,
    pub scm_type: String,
}

impl MaterialDependency {
    pub fn new(
        fingerprint: impl Into<String>,
        name: impl Into<String>,
        scm_type: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            name: name.into(),
            scm_type: scm_type.into(),
        }
    }
}

/// Bookkeeping for a long edge that was replaced by a dummy chain, so the
/// chain can be undone before the graph is re-leveled.
#[derive(Debug, Clone)]
struct SplicedEdge {
    parent: NodeId,
    child: NodeId,
    dummies: Vec<NodeId>,
}

/// The value stream map under construction: an arena of nodes addressed by
/// id, built incrementally from upstream/downstream hops around one root
/// pipeline (or material).
///
/// Levels are signed distances from the root: the root starts at 0,
/// upstream nodes go negative, downstream nodes positive. Every edge add
/// enforces `child.level = max(parent.level + 1, child.level)` and
/// propagates an increase breadth-first through the child's dependents.
///
/// One graph serves one visualization request; build it, level it, project
/// it, drop it.
pub struct ValueStreamGraph {
    pub(crate) nodes: IndexMap<NodeId, Node>,
    root: NodeId,
    next_ordinal: u64,
    cyclic: bool,
    spliced: Vec<SplicedEdge>,
}

impl ValueStreamGraph {
    /// A map rooted at the pipeline being visualized.
    pub fn for_pipeline(name: impl Into<String>) -> Self {
        let name = name.into();
        let root = NodeId::new(name.clone());
        let mut nodes = IndexMap::new();
        nodes.insert(
            root.clone(),
            Node::new(root.clone(), name, NodeKind::Pipeline, 0, 0),
        );
        Self {
            nodes,
            root,
            next_ordinal: 1,
            cyclic: false,
            spliced: Vec::new(),
        }
    }

    /// A map rooted at a raw material: the "what does this repository
    /// feed" view.
    pub fn for_material(material: MaterialDependency) -> Self {
        let root = NodeId::new(material.fingerprint);
        let mut nodes = IndexMap::new();
        nodes.insert(
            root.clone(),
            Node::new(
                root.clone(),
                material.name,
                NodeKind::Material(material.scm_type),
                0,
                0,
            ),
        );
        Self {
            nodes,
            root,
            next_ordinal: 1,
            cyclic: false,
            spliced: Vec::new(),
        }
    }

    pub fn root(&self) -> &Node {
        self.nodes
            .get(&self.root)
            .expect("root node is registered at construction and never removed")
    }

    pub fn find_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes with no upstream dependencies, in first-insertion order.
    pub fn root_nodes(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|node| node.parents.is_empty())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Registers `pipeline` (or fetches it by id) as an upstream dependency
    /// of `child_id`, appending `revision` as a run instance unless an
    /// instance with the same counter and label is already recorded.
    pub fn add_upstream_pipeline(
        &mut self,
        pipeline: PipelineDependency,
        revision: Option<PipelineRevision>,
        child_id: &NodeId,
    ) -> Result<NodeId> {
        let id = NodeId::new(pipeline.id);
        let child_level = self.level_of(child_id)?;
        self.register(&id, &pipeline.name, NodeKind::Pipeline, child_level - 1)?;
        self.link(&id, child_id)?;

        if let Some(revision) = revision {
            let node = self.node_mut(&id)?;
            if !node.revisions.iter().any(|r| r.same_instance(&revision)) {
                node.revisions.push(revision);
            }
        }
        Ok(id)
    }

    /// Registers `material` (or fetches it by fingerprint) as an upstream
    /// dependency of `child_id`. `material_name` is the configured name of
    /// the material at this call site and accumulates on the node;
    /// `revision` merges with an already-recorded revision when both carry
    /// the same latest modification. Materials are leaves: they never gain
    /// parents.
    pub fn add_upstream_material(
        &mut self,
        material: MaterialDependency,
        material_name: Option<&str>,
        child_id: &NodeId,
        revision: MaterialRevision,
    ) -> Result<NodeId> {
        let id = NodeId::new(material.fingerprint);
        let child_level = self.level_of(child_id)?;
        self.register(
            &id,
            &material.name,
            NodeKind::Material(material.scm_type),
            child_level - 1,
        )?;
        self.link(&id, child_id)?;

        let node = self.node_mut(&id)?;
        if let Some(name) = material_name {
            if !node.material_names.iter().any(|n| n == name) {
                node.material_names.push(name.to_string());
            }
        }
        if revision.material.is_some() || !revision.modifications.is_empty() {
            match node
                .material_revisions
                .iter_mut()
                .find(|r| r.same_revision(&revision))
            {
                Some(existing) => existing.merge(revision),
                None => node.material_revisions.push(revision),
            }
        }
        Ok(id)
    }

    /// Registers `pipeline` (or fetches it by id) as a dependent of
    /// `parent_id`.
    pub fn add_downstream_pipeline(
        &mut self,
        pipeline: PipelineDependency,
        parent_id: &NodeId,
    ) -> Result<NodeId> {
        let id = NodeId::new(pipeline.id);
        let parent_level = self.level_of(parent_id)?;
        self.register(&id, &pipeline.name, NodeKind::Pipeline, parent_level + 1)?;
        self.link(parent_id, &id)?;
        Ok(id)
    }

    /// Appends a run instance to an already-registered pipeline node,
    /// unless an instance with the same counter and label is recorded.
    /// This is how the root pipeline gets its own run history, which no
    /// upstream/downstream hop ever delivers.
    pub fn add_revision(&mut self, id: &NodeId, revision: PipelineRevision) -> Result<()> {
        let node = self.node_mut(id)?;
        if !node.revisions.iter().any(|r| r.same_instance(&revision)) {
            node.revisions.push(revision);
        }
        Ok(())
    }

    /// Marks a node as degraded (permission denied, deleted, warning) with
    /// the message to surface in its place.
    pub fn annotate(
        &mut self,
        id: &NodeId,
        view_type: ViewType,
        message: impl Into<String>,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        node.view_type = Some(view_type);
        node.message = Some(message.into());
        Ok(())
    }

    /// True when the dependency edges contain a directed cycle. A pipeline
    /// config edited between runs can legitimately produce one; the graph
    /// still builds, but leveling refuses it.
    pub fn has_cycle(&self) -> bool {
        if self.cyclic {
            return true;
        }

        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;
        let mut colors: HashMap<&NodeId, u8> = HashMap::new();

        for start in self.nodes.keys() {
            if colors.get(start).copied().unwrap_or(WHITE) != WHITE {
                continue;
            }
            let mut stack: Vec<(&NodeId, usize)> = vec![(start, 0)];
            colors.insert(start, GREY);
            while let Some((id, child_idx)) = stack.pop() {
                let Some(node) = self.nodes.get(id) else {
                    continue;
                };
                if child_idx < node.dependents.len() {
                    stack.push((id, child_idx + 1));
                    let Some((dep, _)) = self.nodes.get_key_value(&node.dependents[child_idx])
                    else {
                        continue;
                    };
                    match colors.get(dep).copied().unwrap_or(WHITE) {
                        GREY => return true,
                        BLACK => {}
                        _ => {
                            colors.insert(dep, GREY);
                            stack.push((dep, 0));
                        }
                    }
                } else {
                    colors.insert(id, BLACK);
                }
            }
        }
        false
    }

    /// Flags the root pipeline with a warning when any single material fed
    /// it two or more distinct revisions: the run mixed incompatible
    /// checkouts of the same repository.
    pub fn add_warning_for_incompatible_revisions(&mut self) {
        let mut conflicting: Option<String> = None;
        for node in self.nodes.values() {
            if !node.kind.is_material() {
                continue;
            }
            let mut revisions_per_material: HashMap<&str, usize> = HashMap::new();
            for revision in &node.material_revisions {
                if let Some(material) = revision.material.as_deref() {
                    let count = revisions_per_material.entry(material).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        conflicting = Some(node.name.clone());
                    }
                }
            }
        }

        if let Some(material) = conflicting {
            debug!("material '{material}' contributed multiple revisions, flagging root");
            let root_id = self.root.clone();
            if let Some(root) = self.nodes.get_mut(&root_id) {
                root.view_type = Some(ViewType::Warning);
                root.message = Some(format!(
                    "this run was built from multiple revisions of material '{material}'"
                ));
            }
        }
    }

    /// Renders the leveled presentation model. A non-null `error` from the
    /// upstream resolution step short-circuits into an error-only model.
    pub fn presentation(
        &mut self,
        error: Option<String>,
        formatters: &Formatters,
    ) -> Result<GraphModel> {
        GraphModel::render(self, error, formatters)
    }

    fn level_of(&self, id: &NodeId) -> Result<i32> {
        self.nodes
            .get(id)
            .map(|node| node.level)
            .ok_or_else(|| VsmError::UnknownNode(id.clone()))
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| VsmError::UnknownNode(id.clone()))
    }

    fn register(&mut self, id: &NodeId, name: &str, kind: NodeKind, level: i32) -> Result<()> {
        if let Some(existing) = self.nodes.get(id) {
            if existing.kind != kind {
                return Err(VsmError::NodeKindConflict {
                    id: id.clone(),
                    existing: existing.kind.clone(),
                    requested: kind,
                });
            }
            return Ok(());
        }
        trace!("registering node '{id}' at level {level}");
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.nodes.insert(
            id.clone(),
            Node::new(id.clone(), name.to_string(), kind, level, ordinal),
        );
        Ok(())
    }

    fn link(&mut self, parent_id: &NodeId, child_id: &NodeId) -> Result<()> {
        if parent_id == child_id {
            return Err(VsmError::SelfReferencingDependency(parent_id.clone()));
        }
        let child = self
            .nodes
            .get(child_id)
            .ok_or_else(|| VsmError::UnknownNode(child_id.clone()))?;
        if child.kind.is_material() {
            return Err(VsmError::MaterialAsDependent(child_id.clone()));
        }
        let parent_level = self.level_of(parent_id)?;

        self.node_mut(parent_id)?.add_dependent_if_absent(child_id);
        let child = self.node_mut(child_id)?;
        child.add_parent_if_absent(parent_id);

        if child.level <= parent_level {
            child.level = parent_level + 1;
            debug!("pushing '{child_id}' down to level {}", parent_level + 1);
            self.propagate_levels_from(child_id.clone());
        }
        Ok(())
    }

    /// Breadth-first fixpoint over the dependents closure after a node was
    /// pushed to a deeper level. Every legitimate re-level strictly deepens
    /// a node, and levels span at most twice the node count, so a node
    /// re-leveled beyond that can only mean the edges loop; the graph is
    /// marked cyclic and the pass abandoned.
    fn propagate_levels_from(&mut self, start: NodeId) {
        let bound = self.nodes.len() * 2 + 1;
        let mut relevels: HashMap<NodeId, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(id) = queue.pop_front() {
            let (level, dependents) = match self.nodes.get(&id) {
                Some(node) => (node.level, node.dependents.clone()),
                None => continue,
            };
            for dep_id in dependents {
                let Some(dep) = self.nodes.get_mut(&dep_id) else {
                    continue;
                };
                if dep.level <= level {
                    dep.level = level + 1;
                    trace!("re-leveling '{dep_id}' to {}", level + 1);
                    let seen = relevels.entry(dep_id.clone()).or_insert(0);
                    *seen += 1;
                    if *seen > bound {
                        debug!("re-level bound exceeded at '{dep_id}', marking graph cyclic");
                        self.cyclic = true;
                        return;
                    }
                    queue.push_back(dep_id);
                }
            }
        }
    }

    /// Replaces every edge spanning more than one level with a chain of
    /// dummy nodes, one per intermediate level, so each level the edge
    /// crosses holds a placeholder for routing. Dummy ids derive from the
    /// `(parent, child)` pair and the chain index, so rebuilding the same
    /// graph yields the same ids. Any chains from an earlier leveling pass
    /// are undone first, since levels may have shifted in between.
    pub(crate) fn splice_dummies(&mut self) {
        self.unsplice_dummies();

        let mut long_edges: Vec<(NodeId, NodeId, i32, i32)> = Vec::new();
        for node in self.nodes.values() {
            for dep_id in &node.dependents {
                if let Some(dep) = self.nodes.get(dep_id) {
                    if dep.level - node.level > 1 {
                        long_edges.push((node.id.clone(), dep_id.clone(), node.level, dep.level));
                    }
                }
            }
        }

        for (parent, child, parent_level, child_level) in long_edges {
            debug!(
                "splicing {} dummy node(s) between '{parent}' ({parent_level}) and '{child}' ({child_level})",
                child_level - parent_level - 1
            );
            let mut dummies: Vec<NodeId> = Vec::new();
            for (index, level) in (parent_level + 1..child_level).enumerate() {
                let id = NodeId::new(format!("dummy:{parent}:{child}:{index}"));
                let ordinal = self.next_ordinal;
                self.next_ordinal += 1;
                self.nodes.insert(
                    id.clone(),
                    Node::new(
                        id.clone(),
                        id.to_string(),
                        NodeKind::Dummy,
                        level,
                        ordinal,
                    ),
                );
                dummies.push(id);
            }

            let (Some(first), Some(last)) = (dummies.first().cloned(), dummies.last().cloned())
            else {
                continue;
            };

            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                replace_id(&mut parent_node.dependents, &child, first.clone());
            }
            if let Some(first_node) = self.nodes.get_mut(&first) {
                first_node.parents.push(parent.clone());
            }
            for pair in dummies.windows(2) {
                if let Some(from) = self.nodes.get_mut(&pair[0]) {
                    from.dependents.push(pair[1].clone());
                }
                if let Some(to) = self.nodes.get_mut(&pair[1]) {
                    to.parents.push(pair[0].clone());
                }
            }
            if let Some(last_node) = self.nodes.get_mut(&last) {
                last_node.dependents.push(child.clone());
            }
            if let Some(child_node) = self.nodes.get_mut(&child) {
                replace_id(&mut child_node.parents, &parent, last);
            }

            self.spliced.push(SplicedEdge {
                parent,
                child,
                dummies,
            });
        }
    }

    /// Removes every dummy chain and restores the direct edges in place,
    /// preserving the slot each child held in its parent's dependent list.
    fn unsplice_dummies(&mut self) {
        for edge in std::mem::take(&mut self.spliced) {
            let (Some(first), Some(last)) = (edge.dummies.first(), edge.dummies.last()) else {
                continue;
            };
            if let Some(parent_node) = self.nodes.get_mut(&edge.parent) {
                replace_id(&mut parent_node.dependents, first, edge.child.clone());
            }
            if let Some(child_node) = self.nodes.get_mut(&edge.child) {
                replace_id(&mut child_node.parents, last, edge.parent.clone());
            }
            for dummy in &edge.dummies {
                self.nodes.shift_remove(dummy);
            }
        }
    }
}

fn replace_id(list: &mut Vec<NodeId>, from: &NodeId, to: NodeId) {
    match list.iter().position(|id| id == from) {
        Some(index) => list[index] = to,
        None => list.push(to),
    }
}
