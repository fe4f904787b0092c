//! # Context Tree
//!
//! Curated slices of a codebase, kept as a deduplicated selection tree and
//! rendered back to source text for a language model.
//!
//! ## Features
//!
//! - **Graph conversion** - turn a class dependency graph into a project tree
//! - **Whole selections** - classes and files collapse once fully covered
//! - **Interactive edits** - add a file, add a method, remove any subtree
//! - **External code** - library classes grouped by `groupId:artifactId:version`
//!
//! ## Architecture
//!
//! ```text
//! ClassDependencyGraph
//!     │
//!     ├──> Tree Builder
//!     │      ├─ Local or external placement
//!     │      ├─ Module / dependency group → package → file → class
//!     │      └─ Collapse pass (whole files)
//!     │
//!     ├──> AppFileTree
//!     │      ├─ Mutator: add_file, add_method, remove_selected
//!     │      └─ merge (whole wins, methods unioned)
//!     │
//!     └──> Renderer
//!            ├─ SourceLookup (WorkspaceSource + FileFactsExtractor)
//!            └─ Bordered fragments per file
//! ```

mod builder;
mod coords;
mod error;
mod facts;
mod mutator;
mod render;
mod types;

pub use builder::{build_from_graph, BuildReport, TreeBuilder};
pub use coords::DependencyCoordinates;
pub use error::{Result, TreeError};
pub use facts::{
    ClassDependency, ClassDependencyGraph, ClassFacts, DeclaredClass, ExtractorRegistry, FileFacts,
    FileFactsExtractor, Language, MethodFacts, WorkspaceRef,
};
pub use mutator::{MutationOutcome, RemovalTarget, SelectedFile};
pub use render::{render_context, render_tree, slice_spans, wrap_border, SourceLookup, WorkspaceSource};
pub use types::{
    AppFileTree, ElementHandle, ExternalDependencyGroup, ModuleGroup, PackageGroup, ProjectClass,
    ProjectFile, ProjectFileTree, ProjectMethod, TreeStats, DEFAULT_PACKAGE, UNKNOWN_MODULE,
    UNNAMED_CLASS,
};
