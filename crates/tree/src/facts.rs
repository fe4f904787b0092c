//! Flat facts the engine consumes from its collaborators.
//!
//! The code graph provider hands over [`ClassDependencyGraph`]; language
//! plugins hand over [`FileFacts`] through [`FileFactsExtractor`]. Neither is
//! produced here.

use crate::error::Result;
use crate::types::ElementHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Workspace a class was resolved in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceRef {
    /// Project name, the key of its `ProjectFileTree`
    pub name: String,

    /// Absolute root path; files under it are local
    pub root: String,
}

impl WorkspaceRef {
    pub fn new(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Root without trailing separators
    pub fn base_path(&self) -> &str {
        self.root.trim_end_matches('/')
    }

    pub fn contains(&self, path: &str) -> bool {
        let base = self.base_path();
        !base.is_empty() && path.starts_with(base)
    }

    /// Path relative to the root, `None` when the path is outside it
    pub fn relative_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let base = self.base_path();
        if base.is_empty() {
            return None;
        }
        path.strip_prefix(base).map(|rest| rest.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFacts {
    pub name: String,

    /// Canonical parameter type names, in declaration order
    #[serde(default)]
    pub parameter_types: Vec<String>,

    #[serde(default)]
    pub is_constructor: bool,

    #[serde(default)]
    pub handle: Option<ElementHandle>,
}

impl MethodFacts {
    pub fn new(name: impl Into<String>, parameter_types: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parameter_types,
            is_constructor: false,
            handle: None,
        }
    }

    pub fn constructor(name: impl Into<String>, parameter_types: Vec<String>) -> Self {
        Self {
            is_constructor: true,
            ..Self::new(name, parameter_types)
        }
    }

    pub fn with_handle(mut self, handle: ElementHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn same_key(&self, other: &MethodFacts) -> bool {
        self.name == other.name && self.parameter_types == other.parameter_types
    }
}

/// A class as the code graph provider sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFacts {
    pub workspace: WorkspaceRef,

    /// Absolute path of the containing file (jar-qualified for external code)
    pub file_path: String,

    #[serde(default)]
    pub qualified_name: Option<String>,

    /// Simple name
    #[serde(default)]
    pub name: Option<String>,

    /// Every declared method, constructors included
    #[serde(default)]
    pub methods: Vec<MethodFacts>,

    #[serde(default)]
    pub handle: Option<ElementHandle>,
}

/// One graph entry: a class and the methods of it that are referenced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDependency {
    pub class: ClassFacts,

    #[serde(default)]
    pub used_methods: Vec<MethodFacts>,
}

/// Class-level dependency graph from the code graph provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDependencyGraph {
    #[serde(default)]
    pub classes: Vec<ClassDependency>,
}

impl ClassDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: ClassFacts, used_methods: Vec<MethodFacts>) {
        self.classes.push(ClassDependency {
            class,
            used_methods,
        });
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Source language, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Kotlin,
    Scala,
    Groovy,
    Python,
    Rust,
    Go,
    JavaScript,
    TypeScript,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "java" | "class" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "scala" => Language::Scala,
            "groovy" => Language::Groovy,
            "py" | "pyw" => Language::Python,
            "rs" => Language::Rust,
            "go" => Language::Go,
            "js" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Groovy => "groovy",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Unknown => "unknown",
        }
    }
}

/// Class declared in a file, with its span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredClass {
    pub name: String,

    #[serde(default)]
    pub qualified_name: Option<String>,

    #[serde(default)]
    pub span: Option<ElementHandle>,

    #[serde(default)]
    pub methods: Vec<MethodFacts>,
}

/// What a language plugin knows about one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFacts {
    pub name: String,
    pub path: String,
    pub language: Language,

    #[serde(default)]
    pub package: Option<String>,

    #[serde(default)]
    pub imports: Vec<String>,

    #[serde(default)]
    pub classes: Vec<DeclaredClass>,

    /// Top-level functions
    #[serde(default)]
    pub functions: Vec<MethodFacts>,
}

impl FileFacts {
    pub fn find_class(&self, name: &str) -> Option<&DeclaredClass> {
        self.classes
            .iter()
            .find(|c| c.name == name || c.qualified_name.as_deref() == Some(name))
    }
}

/// Per-language capability that enumerates a file's declarations
pub trait FileFactsExtractor: Send + Sync {
    fn language(&self) -> Language;

    fn extract(&self, path: &Path, source: &str) -> Option<FileFacts>;
}

/// Extractors keyed by language tag
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<Language, Box<dyn FileFactsExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor, replacing any previous one for its language
    pub fn register(&mut self, extractor: Box<dyn FileFactsExtractor>) {
        self.extractors.insert(extractor.language(), extractor);
    }

    pub fn supports(&self, language: Language) -> bool {
        self.extractors.contains_key(&language)
    }

    pub fn extractor_for(&self, path: &Path) -> Option<&dyn FileFactsExtractor> {
        self.extractors
            .get(&Language::from_path(path))
            .map(|e| e.as_ref())
    }

    pub fn extract(&self, path: &Path, source: &str) -> Option<FileFacts> {
        let extractor = self.extractor_for(path)?;
        extractor.extract(path, source)
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut languages: Vec<_> = self.extractors.keys().map(|l| l.as_str()).collect();
        languages.sort_unstable();
        f.debug_struct("ExtractorRegistry")
            .field("languages", &languages)
            .finish()
    }
}
