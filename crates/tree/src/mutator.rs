use crate::builder::{class_name, module_name, project_method, Placement};
use crate::error::TreeError;
use crate::facts::{ClassFacts, MethodFacts, WorkspaceRef};
use crate::types::{AppFileTree, ProjectFile, DEFAULT_PACKAGE};
use std::path::PathBuf;

/// Result of one interactive edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Changed,
    /// Request was valid but the tree already satisfied it
    Unchanged,
    /// Request was rejected; the tree is untouched
    Skipped(TreeError),
}

impl MutationOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, MutationOutcome::Changed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, MutationOutcome::Skipped(_))
    }

    fn from_changed(changed: bool) -> Self {
        if changed {
            MutationOutcome::Changed
        } else {
            MutationOutcome::Unchanged
        }
    }
}

/// A file picked by the user for whole-file selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub writable: bool,

    /// Declared package, when the language plugin knows it
    pub package: Option<String>,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writable: true,
            package: None,
        }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }
}

/// Which part of a workspace's selection to drop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalTarget {
    pub file_path: Option<String>,
    pub class_name: Option<String>,
    pub method_names: Option<Vec<String>>,
}

impl RemovalTarget {
    /// Everything local to the workspace
    pub fn workspace() -> Self {
        Self::default()
    }

    pub fn file(file_path: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            ..Self::default()
        }
    }

    pub fn class(file_path: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::file(file_path)
        }
    }

    pub fn methods(
        file_path: impl Into<String>,
        class_name: impl Into<String>,
        method_names: Vec<String>,
    ) -> Self {
        Self {
            method_names: Some(method_names),
            ..Self::class(file_path, class_name)
        }
    }
}

impl AppFileTree {
    /// Select a whole file under the workspace's local tree.
    ///
    /// Unwritable files and files outside the workspace are rejected; a path
    /// already present anywhere in the local tree is left as is.
    pub fn add_file(&mut self, workspace: &WorkspaceRef, file: &SelectedFile) -> MutationOutcome {
        let display = file.path.to_string_lossy().into_owned();
        if !file.writable {
            return MutationOutcome::Skipped(TreeError::invalid_input(display, "file is not writable"));
        }
        let Some(relative) = workspace.relative_path(&display).map(str::to_string) else {
            return MutationOutcome::Skipped(TreeError::invalid_input(
                display,
                format!("file is outside workspace {}", workspace.root),
            ));
        };
        if relative.is_empty() {
            return MutationOutcome::Skipped(TreeError::invalid_input(display, "path is the workspace root"));
        }

        let project = self.project_entry(&workspace.name);
        if project.find_local_file(&relative).is_some() {
            log::info!("File already exists in session: {}", relative);
            return MutationOutcome::Unchanged;
        }

        let package = file.package.as_deref().unwrap_or(DEFAULT_PACKAGE);
        project
            .module_entry(&module_name(&relative))
            .package_entry(package)
            .insert_file(ProjectFile::whole(relative));
        MutationOutcome::Changed
    }

    /// Select one method, creating the chain down to it on demand.
    ///
    /// New files and classes start method-granular. Nothing is added when the
    /// file or class is already a whole selection, and adding never collapses.
    pub fn add_method(&mut self, class: &ClassFacts, method: &MethodFacts) -> MutationOutcome {
        let placement = match Placement::resolve(class) {
            Ok(placement) => placement,
            Err(err) => return MutationOutcome::Skipped(err),
        };

        let project = self.project_entry(&class.workspace.name);
        let file = placement.file_entry(project);
        let Some(selected) = file.class_entry(class_name(class)) else {
            log::debug!(
                "{} is selected whole; ignoring method {}",
                placement.file_path(),
                method.name
            );
            return MutationOutcome::Unchanged;
        };
        selected.attach_handle(class.handle.clone());

        MutationOutcome::from_changed(selected.add_method(project_method(method)))
    }

    /// Hierarchical removal within one workspace.
    ///
    /// * no file → every local module goes
    /// * file only → that file goes
    /// * file + class, no method names → that class goes
    /// * file + class + method names → those methods go, and the class with
    ///   them once it is empty. The file is never removed this way.
    pub fn remove_selected(&mut self, workspace_name: &str, target: &RemovalTarget) -> MutationOutcome {
        let Some(project) = self.project_mut(workspace_name) else {
            return MutationOutcome::Unchanged;
        };

        let Some(file_path) = target.file_path.as_deref() else {
            return MutationOutcome::from_changed(project.clear_local());
        };

        let Some(class_name) = target.class_name.as_deref() else {
            return MutationOutcome::from_changed(project.remove_file(file_path));
        };

        let Some(file) = project.find_file_mut(file_path) else {
            return MutationOutcome::Unchanged;
        };

        let method_names = match target.method_names.as_deref() {
            Some(names) if !names.is_empty() => names,
            _ => return MutationOutcome::from_changed(file.remove_class(class_name)),
        };

        let Some(class) = file.find_class_mut(class_name) else {
            return MutationOutcome::Unchanged;
        };
        let removed = class.remove_methods_named(method_names);
        let emptied = removed > 0 && class.is_empty();
        if emptied {
            file.remove_class(class_name);
        }
        MutationOutcome::from_changed(removed > 0 || emptied)
    }
}
