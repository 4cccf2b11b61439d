use crate::node::{NodeId, NodeKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VsmError {
    #[error("node '{0}' cannot depend on itself")]
    SelfReferencingDependency(NodeId),

    #[error("node '{id}' is already registered as {existing:?}, cannot re-register as {requested:?}")]
    NodeKindConflict {
        id: NodeId,
        existing: NodeKind,
        requested: NodeKind,
    },

    #[error("unknown node '{0}'")]
    UnknownNode(NodeId),

    #[error("material '{0}' cannot have upstream dependencies")]
    MaterialAsDependent(NodeId),

    #[error("pipeline dependencies form a cycle")]
    CyclicDependency,

    #[error("level {0} is empty, levels must be contiguous")]
    NonContiguousLevels(i32),
}

pub type Result<T> = std::result::Result<T, VsmError>;
