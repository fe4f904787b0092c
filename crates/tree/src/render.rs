//! Turns a selection back into source text for the model.

use crate::error::TreeError;
use crate::facts::{ExtractorRegistry, FileFacts, Language};
use crate::types::{AppFileTree, ElementHandle, ProjectFile};
use std::path::{Path, PathBuf};

/// Read access to live source, keyed by the file paths stored in the tree
pub trait SourceLookup {
    /// Full text of a file, `None` when it cannot be read
    fn file_text(&self, file_path: &str) -> Option<String>;

    fn locate_class(&self, file_path: &str, class_name: &str) -> Option<ElementHandle>;

    fn locate_method(
        &self,
        file_path: &str,
        class_name: &str,
        method_name: &str,
        parameter_types: &[String],
    ) -> Option<ElementHandle>;

    /// Text of the given elements of one file, in line order
    fn elements_text(&self, file_path: &str, handles: &[ElementHandle]) -> Option<String> {
        let text = self.file_text(file_path)?;
        slice_spans(&text, handles)
    }
}

/// Render every file of the selection, skipping files with nothing resolvable
pub fn render_context<'a>(
    files: impl IntoIterator<Item = &'a ProjectFile>,
    lookup: &dyn SourceLookup,
) -> Vec<String> {
    files
        .into_iter()
        .filter_map(|file| render_file(file, lookup))
        .collect()
}

/// Whole tree as one document, one `=== Project: <name> ===` section per project
pub fn render_tree(tree: &AppFileTree, lookup: &dyn SourceLookup) -> String {
    tree.project_file_trees()
        .iter()
        .map(|project| {
            let fragments =
                render_context(project.local_files().chain(project.external_files()), lookup);
            format!("=== Project: {} ===\n{}", project.project_name(), fragments.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_file(file: &ProjectFile, lookup: &dyn SourceLookup) -> Option<String> {
    let path = file.file_path();
    if file.is_whole() {
        let text = lookup.file_text(path);
        if text.is_none() {
            log::debug!("{}", TreeError::render_miss(path, "<file>"));
        }
        return text.map(|text| wrap_border(path, &text));
    }

    let mut handles = Vec::new();
    for class in file.classes() {
        if class.is_whole() {
            match class
                .handle()
                .cloned()
                .or_else(|| lookup.locate_class(path, class.class_name()))
            {
                Some(handle) => handles.push(handle),
                None => log::debug!("{}", TreeError::render_miss(path, class.class_name())),
            }
            continue;
        }

        for method in class.methods() {
            let located = method.handle().cloned().or_else(|| {
                lookup.locate_method(
                    path,
                    class.class_name(),
                    method.method_name(),
                    method.parameter_types(),
                )
            });
            match located {
                Some(handle) => handles.push(handle),
                None => log::debug!(
                    "{}",
                    TreeError::render_miss(path, format!("{}.{}", class.class_name(), method.signature()))
                ),
            }
        }
    }

    if handles.is_empty() {
        return None;
    }
    let text = lookup.elements_text(path, &handles)?;
    Some(wrap_border(path, &text))
}

/// Path header followed by a fenced block tagged with the file's language
pub fn wrap_border(file_path: &str, content: &str) -> String {
    let tag = match Language::from_path(file_path) {
        Language::Unknown => "",
        language => language.as_str(),
    };
    format!("{}\n```{}\n{}\n```", file_path, tag, content.trim())
}

/// Cut 1-based inclusive line spans out of `text`. Overlapping or adjacent
/// spans are merged; fragments are joined by a blank line.
pub fn slice_spans(text: &str, handles: &[ElementHandle]) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut spans: Vec<(usize, usize)> = handles
        .iter()
        .map(|h| (h.start_line.max(1), h.end_line.min(lines.len())))
        .filter(|(start, end)| start <= end)
        .collect();
    spans.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    if merged.is_empty() {
        return None;
    }

    let fragments: Vec<String> = merged
        .into_iter()
        .map(|(start, end)| lines[start - 1..end].join("\n"))
        .collect();
    Some(fragments.join("\n\n"))
}

/// Filesystem-backed [`SourceLookup`].
///
/// Relative paths resolve against the workspace root, absolute paths are read
/// as is. Entries inside archives (`.jar!/...`) cannot be read and always miss.
/// Class and method spans come from the extractor registered for the file's
/// language.
#[derive(Debug)]
pub struct WorkspaceSource {
    root: PathBuf,
    extractors: ExtractorRegistry,
}

impl WorkspaceSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extractors: ExtractorRegistry::new(),
        }
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, file_path: &str) -> Option<PathBuf> {
        if file_path.contains("!/") {
            return None;
        }
        let path = Path::new(file_path);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.root.join(path))
        }
    }

    fn facts(&self, file_path: &str) -> Option<FileFacts> {
        let path = self.resolve(file_path)?;
        let text = self.file_text(file_path)?;
        self.extractors.extract(&path, &text)
    }
}

impl SourceLookup for WorkspaceSource {
    fn file_text(&self, file_path: &str) -> Option<String> {
        let path = self.resolve(file_path)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(err) => {
                log::debug!("Cannot read {}: {}", path.display(), err);
                None
            }
        }
    }

    fn locate_class(&self, file_path: &str, class_name: &str) -> Option<ElementHandle> {
        self.facts(file_path)?.find_class(class_name)?.span.clone()
    }

    fn locate_method(
        &self,
        file_path: &str,
        class_name: &str,
        method_name: &str,
        parameter_types: &[String],
    ) -> Option<ElementHandle> {
        let facts = self.facts(file_path)?;
        facts
            .find_class(class_name)?
            .methods
            .iter()
            .find(|m| m.name == method_name && m.parameter_types == parameter_types)?
            .handle
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{DeclaredClass, FileFactsExtractor, MethodFacts};
    use crate::types::{ProjectClass, ProjectMethod};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const SERVICE: &str = "package com.demo;\n\nclass Service {\n  void run() {\n    go();\n  }\n\n  void stop() {}\n}\n";

    #[derive(Default)]
    struct FakeLookup {
        texts: HashMap<String, String>,
        methods: HashMap<(String, String), ElementHandle>,
    }

    impl SourceLookup for FakeLookup {
        fn file_text(&self, file_path: &str) -> Option<String> {
            self.texts.get(file_path).cloned()
        }

        fn locate_class(&self, _file_path: &str, _class_name: &str) -> Option<ElementHandle> {
            None
        }

        fn locate_method(
            &self,
            file_path: &str,
            _class_name: &str,
            method_name: &str,
            _parameter_types: &[String],
        ) -> Option<ElementHandle> {
            self.methods
                .get(&(file_path.to_string(), method_name.to_string()))
                .cloned()
        }
    }

    fn lookup() -> FakeLookup {
        let mut lookup = FakeLookup::default();
        lookup.texts.insert("app/Service.java".to_string(), SERVICE.to_string());
        lookup.methods.insert(
            ("app/Service.java".to_string(), "run".to_string()),
            ElementHandle::new("app/Service.java", 4, 6),
        );
        lookup
    }

    #[test]
    fn test_whole_file_renders_full_text() {
        let file = ProjectFile::whole("app/Service.java");
        let rendered = render_context([&file], &lookup());
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].starts_with("app/Service.java\n```java\npackage com.demo;"));
        assert!(rendered[0].ends_with("}\n```"));
    }

    #[test]
    fn test_methods_render_their_spans_and_skip_misses() {
        let mut file = ProjectFile::new("app/Service.java");
        let class = file.class_entry("Service").unwrap();
        class.add_method(ProjectMethod::new("run", vec![]));
        class.add_method(ProjectMethod::new("missing", vec![]));

        let rendered = render_context([&file], &lookup());
        assert_eq!(
            rendered,
            vec!["app/Service.java\n```java\nvoid run() {\n    go();\n  }\n```".to_string()]
        );
    }

    #[test]
    fn test_unresolvable_files_yield_nothing() {
        let mut file = ProjectFile::new("app/Service.java");
        file.insert_class(ProjectClass::whole("Service"));
        let unreadable = ProjectFile::whole("app/Gone.java");

        assert!(render_context([&file, &unreadable], &lookup()).is_empty());
    }

    #[test]
    fn test_stored_handle_wins_over_lookup() {
        let mut file = ProjectFile::new("app/Service.java");
        file.insert_class(
            ProjectClass::whole("Service").with_handle(Some(ElementHandle::new("app/Service.java", 3, 9))),
        );
        let rendered = render_context([&file], &lookup());
        assert!(rendered[0].contains("class Service {"));
        assert!(rendered[0].contains("void stop() {}"));
    }

    #[test]
    fn test_slice_spans_merges_overlaps() {
        let text = "a\nb\nc\nd\ne";
        let handles = vec![
            ElementHandle::new("x", 4, 5),
            ElementHandle::new("x", 1, 2),
            ElementHandle::new("x", 2, 3),
        ];
        assert_eq!(slice_spans(text, &handles).unwrap(), "a\nb\nc\nd\ne");
        assert_eq!(
            slice_spans(text, &[ElementHandle::new("x", 5, 9), ElementHandle::new("x", 1, 1)]).unwrap(),
            "a\n\ne"
        );
        assert!(slice_spans(text, &[ElementHandle::new("x", 7, 9)]).is_none());
    }

    #[test]
    fn test_render_tree_sections() {
        let mut tree = AppFileTree::new();
        tree.project_entry("demo")
            .module_entry("app")
            .package_entry("com.demo")
            .insert_file(ProjectFile::whole("app/Service.java"));
        tree.project_entry("empty");

        let rendered = render_tree(&tree, &lookup());
        assert!(rendered.starts_with("=== Project: demo ===\napp/Service.java\n"));
        assert!(rendered.ends_with("\n\n=== Project: empty ===\n"));
    }

    struct SpanExtractor;

    impl FileFactsExtractor for SpanExtractor {
        fn language(&self) -> Language {
            Language::Java
        }

        fn extract(&self, path: &Path, _source: &str) -> Option<FileFacts> {
            Some(FileFacts {
                name: path.file_name()?.to_string_lossy().into_owned(),
                path: path.to_string_lossy().into_owned(),
                language: Language::Java,
                package: Some("com.demo".to_string()),
                imports: vec![],
                classes: vec![DeclaredClass {
                    name: "Service".to_string(),
                    qualified_name: Some("com.demo.Service".to_string()),
                    span: Some(ElementHandle::new("Service.java", 3, 9)),
                    methods: vec![MethodFacts::new("stop", vec![])
                        .with_handle(ElementHandle::new("Service.java", 8, 8))],
                }],
                functions: vec![],
            })
        }
    }

    #[test]
    fn test_workspace_source_reads_files_and_spans() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/Service.java"), SERVICE).unwrap();

        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(SpanExtractor));
        let source = WorkspaceSource::new(dir.path()).with_extractors(registry);

        assert_eq!(source.file_text("app/Service.java").unwrap(), SERVICE);
        assert!(source.file_text("/repo/x/1.0/x-1.0.jar!/X.class").is_none());
        assert_eq!(
            source.locate_class("app/Service.java", "Service"),
            Some(ElementHandle::new("Service.java", 3, 9))
        );

        let mut file = ProjectFile::new("app/Service.java");
        file.class_entry("Service")
            .unwrap()
            .add_method(ProjectMethod::new("stop", vec![]));
        let rendered = render_context([&file], &source);
        assert_eq!(rendered, vec!["app/Service.java\n```java\nvoid stop() {}\n```".to_string()]);
    }
}
