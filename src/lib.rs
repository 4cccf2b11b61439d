//! Value stream map graph model for CI/CD pipeline dependency
//! visualization.
//!
//! Given the dependency graph of pipelines and materials around a target
//! pipeline (resolved by the server ahead of time), this crate lays the
//! graph out into discrete levels, splices placeholder nodes into edges
//! that span more than one level, and projects every node plus its run
//! history into the flat, render-ready [`GraphModel`] consumed by the UI.
//!
//! The flow is build, level, project:
//!
//! ```
//! use vsmap::{Formatters, MaterialDependency, MaterialRevision, NodeId,
//!             PipelineDependency, ValueStreamGraph};
//!
//! let mut graph = ValueStreamGraph::for_pipeline("deploy");
//! let deploy = NodeId::from("deploy");
//! let build = graph
//!     .add_upstream_pipeline(PipelineDependency::named("build"), None, &deploy)
//!     .unwrap();
//! graph
//!     .add_upstream_material(
//!         MaterialDependency::new("2f6e-fingerprint", "app-repo", "git"),
//!         None,
//!         &build,
//!         MaterialRevision::default(),
//!     )
//!     .unwrap();
//!
//! let model = graph.presentation(None, &Formatters::default()).unwrap();
//! assert_eq!(model.current_pipeline.as_deref(), Some("deploy"));
//! assert_eq!(model.levels.unwrap().len(), 3);
//! ```
//!
//! A graph serves exactly one visualization request and is not meant to be
//! shared across requests; build a fresh one per request.

pub mod error;
pub mod graph;
pub mod levels;
pub mod node;
pub mod presentation;
pub mod revision;

pub use error::{Result, VsmError};
pub use graph::{MaterialDependency, PipelineDependency, ValueStreamGraph};
pub use levels::{assemble_levels, Level};
pub use node::{Node, NodeId, NodeKind, ViewType};
pub use presentation::{Formatters, GraphModel};
pub use revision::{MaterialRevision, Modification, PipelineRevision, StageStatus, StageSummary};
