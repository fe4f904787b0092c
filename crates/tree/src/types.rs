use crate::coords::DependencyCoordinates;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_MODULE: &str = "UnknownModule";
pub const DEFAULT_PACKAGE: &str = "(default package)";
pub const UNNAMED_CLASS: &str = "Unnamed";

/// Value pointer to a source element (path + 1-based inclusive line span).
///
/// Handles are resolved by a [`crate::SourceLookup`] at render time; the tree
/// never compares or dereferences them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl ElementHandle {
    pub fn new(path: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            path: path.into(),
            start_line,
            end_line,
        }
    }
}

/// Find-or-create over a key-unique vector.
pub(crate) fn entry<T>(
    items: &mut Vec<T>,
    matches: impl Fn(&T) -> bool,
    create: impl FnOnce() -> T,
) -> &mut T {
    let idx = match items.iter().position(matches) {
        Some(idx) => idx,
        None => {
            items.push(create());
            items.len() - 1
        }
    };
    &mut items[idx]
}

/// Selected method, keyed by `(method_name, parameter_types)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMethod {
    method_name: String,
    #[serde(default)]
    parameter_types: Vec<String>,
    #[serde(skip)]
    handle: Option<ElementHandle>,
}

impl ProjectMethod {
    pub fn new(method_name: impl Into<String>, parameter_types: Vec<String>) -> Self {
        Self {
            method_name: method_name.into(),
            parameter_types,
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: Option<ElementHandle>) -> Self {
        self.handle = handle;
        self
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn handle(&self) -> Option<&ElementHandle> {
        self.handle.as_ref()
    }

    /// Identity check against a method key
    pub fn matches(&self, method_name: &str, parameter_types: &[String]) -> bool {
        self.method_name == method_name && self.parameter_types == parameter_types
    }

    /// `name(T1, T2)` form used in logs and render misses
    pub fn signature(&self) -> String {
        format!("{}({})", self.method_name, self.parameter_types.join(", "))
    }
}

impl PartialEq for ProjectMethod {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.method_name, &other.parameter_types)
    }
}

impl Eq for ProjectMethod {}

/// Selected class inside a file.
///
/// `whole` and `methods` are mutually exclusive: a whole class never lists
/// methods. Deserialization normalizes documents that break this rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ProjectClassRecord")]
pub struct ProjectClass {
    class_name: String,
    whole: bool,
    methods: Vec<ProjectMethod>,
    #[serde(skip)]
    handle: Option<ElementHandle>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectClassRecord {
    class_name: String,
    #[serde(default)]
    whole: bool,
    #[serde(default)]
    methods: Vec<ProjectMethod>,
}

impl From<ProjectClassRecord> for ProjectClass {
    fn from(record: ProjectClassRecord) -> Self {
        let mut class = ProjectClass::new(record.class_name);
        if record.whole {
            class.mark_whole();
        } else {
            for method in record.methods {
                class.add_method(method);
            }
        }
        class
    }
}

impl ProjectClass {
    /// Class selected method by method
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            whole: false,
            methods: Vec::new(),
            handle: None,
        }
    }

    /// Class selected in its entirety
    pub fn whole(class_name: impl Into<String>) -> Self {
        let mut class = Self::new(class_name);
        class.whole = true;
        class
    }

    pub fn with_handle(mut self, handle: Option<ElementHandle>) -> Self {
        self.handle = handle;
        self
    }

    /// Keep the first handle seen for this class
    pub fn attach_handle(&mut self, handle: Option<ElementHandle>) {
        if self.handle.is_none() {
            self.handle = handle;
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn is_whole(&self) -> bool {
        self.whole
    }

    pub fn methods(&self) -> &[ProjectMethod] {
        &self.methods
    }

    pub fn handle(&self) -> Option<&ElementHandle> {
        self.handle.as_ref()
    }

    pub fn find_method(&self, method_name: &str, parameter_types: &[String]) -> Option<&ProjectMethod> {
        self.methods
            .iter()
            .find(|m| m.matches(method_name, parameter_types))
    }

    /// Append a method unless its key is already present.
    ///
    /// A whole class already covers every method, so nothing is added.
    pub fn add_method(&mut self, method: ProjectMethod) -> bool {
        if self.whole || self.find_method(&method.method_name, &method.parameter_types).is_some() {
            return false;
        }
        self.methods.push(method);
        true
    }

    /// Switch to whole-class selection, dropping the method list
    pub fn mark_whole(&mut self) {
        self.whole = true;
        self.methods.clear();
    }

    /// Remove every method whose name is listed (all overloads). Returns the count removed.
    pub fn remove_methods_named(&mut self, names: &[String]) -> usize {
        let before = self.methods.len();
        self.methods
            .retain(|m| !names.iter().any(|name| name == &m.method_name));
        before - self.methods.len()
    }

    /// Neither whole nor holding any method
    pub fn is_empty(&self) -> bool {
        !self.whole && self.methods.is_empty()
    }

    pub fn merge(&mut self, other: ProjectClass) {
        self.attach_handle(other.handle);
        if self.whole {
            return;
        }
        if other.whole {
            self.mark_whole();
            return;
        }
        for method in other.methods {
            self.add_method(method);
        }
    }
}

impl PartialEq for ProjectClass {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.whole == other.whole
            && self.methods == other.methods
    }
}

impl Eq for ProjectClass {}

/// Selected file. `whole` excludes any class listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ProjectFileRecord")]
pub struct ProjectFile {
    file_path: String,
    whole: bool,
    classes: Vec<ProjectClass>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFileRecord {
    file_path: String,
    #[serde(default)]
    whole: bool,
    #[serde(default)]
    classes: Vec<ProjectClass>,
}

impl From<ProjectFileRecord> for ProjectFile {
    fn from(record: ProjectFileRecord) -> Self {
        let mut file = ProjectFile::new(record.file_path);
        if record.whole {
            file.mark_whole();
        } else {
            for class in record.classes {
                file.insert_class(class);
            }
        }
        file
    }
}

impl ProjectFile {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            whole: false,
            classes: Vec::new(),
        }
    }

    pub fn whole(file_path: impl Into<String>) -> Self {
        let mut file = Self::new(file_path);
        file.whole = true;
        file
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn is_whole(&self) -> bool {
        self.whole
    }

    pub fn classes(&self) -> &[ProjectClass] {
        &self.classes
    }

    pub fn find_class(&self, class_name: &str) -> Option<&ProjectClass> {
        self.classes.iter().find(|c| c.class_name == class_name)
    }

    pub fn find_class_mut(&mut self, class_name: &str) -> Option<&mut ProjectClass> {
        self.classes.iter_mut().find(|c| c.class_name == class_name)
    }

    /// Find-or-create a method-granular class. `None` when the file is whole.
    pub fn class_entry(&mut self, class_name: &str) -> Option<&mut ProjectClass> {
        if self.whole {
            return None;
        }
        Some(entry(
            &mut self.classes,
            |c| c.class_name == class_name,
            || ProjectClass::new(class_name),
        ))
    }

    /// Insert a class, merging into an existing one with the same name.
    pub fn insert_class(&mut self, class: ProjectClass) -> bool {
        if self.whole {
            return false;
        }
        match self.find_class_mut(&class.class_name) {
            Some(existing) => existing.merge(class),
            None => self.classes.push(class),
        }
        true
    }

    pub fn remove_class(&mut self, class_name: &str) -> bool {
        let before = self.classes.len();
        self.classes.retain(|c| c.class_name != class_name);
        before != self.classes.len()
    }

    pub fn mark_whole(&mut self) {
        self.whole = true;
        self.classes.clear();
    }

    /// Promote to whole when every listed class is whole.
    pub fn collapse_if_complete(&mut self) -> bool {
        if self.whole || self.classes.is_empty() || !self.classes.iter().all(|c| c.whole) {
            return false;
        }
        self.mark_whole();
        true
    }

    pub fn merge(&mut self, other: ProjectFile) {
        if self.whole {
            return;
        }
        if other.whole {
            self.mark_whole();
            return;
        }
        for class in other.classes {
            self.insert_class(class);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageGroup {
    package_name: String,
    #[serde(default)]
    files: Vec<ProjectFile>,
}

impl PackageGroup {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            files: Vec::new(),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn files(&self) -> &[ProjectFile] {
        &self.files
    }

    pub fn find_file(&self, file_path: &str) -> Option<&ProjectFile> {
        self.files.iter().find(|f| f.file_path == file_path)
    }

    pub fn find_file_mut(&mut self, file_path: &str) -> Option<&mut ProjectFile> {
        self.files.iter_mut().find(|f| f.file_path == file_path)
    }

    /// Find-or-create a file; new files start method-granular
    pub fn file_entry(&mut self, file_path: &str) -> &mut ProjectFile {
        entry(
            &mut self.files,
            |f| f.file_path == file_path,
            || ProjectFile::new(file_path),
        )
    }

    /// Insert a file unless one with the same path exists
    pub fn insert_file(&mut self, file: ProjectFile) -> bool {
        if self.find_file(&file.file_path).is_some() {
            return false;
        }
        self.files.push(file);
        true
    }

    pub fn remove_file(&mut self, file_path: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.file_path != file_path);
        before != self.files.len()
    }

    pub fn merge(&mut self, other: PackageGroup) {
        for file in other.files {
            match self.find_file_mut(&file.file_path) {
                Some(existing) => existing.merge(file),
                None => self.files.push(file),
            }
        }
    }

    fn files_mut(&mut self) -> impl Iterator<Item = &mut ProjectFile> {
        self.files.iter_mut()
    }
}

fn merge_packages(target: &mut Vec<PackageGroup>, incoming: Vec<PackageGroup>) {
    for package in incoming {
        let name = package.package_name.clone();
        entry(target, |p| p.package_name == name, || PackageGroup::new(&name)).merge(package);
    }
}

fn package_entry<'a>(packages: &'a mut Vec<PackageGroup>, package_name: &str) -> &'a mut PackageGroup {
    entry(
        packages,
        |p| p.package_name == package_name,
        || PackageGroup::new(package_name),
    )
}

/// Local code grouped by its top-level directory under the workspace root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleGroup {
    module_name: String,
    #[serde(default)]
    packages: Vec<PackageGroup>,
}

impl ModuleGroup {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            packages: Vec::new(),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn packages(&self) -> &[PackageGroup] {
        &self.packages
    }

    pub fn package_entry(&mut self, package_name: &str) -> &mut PackageGroup {
        package_entry(&mut self.packages, package_name)
    }

    pub fn files(&self) -> impl Iterator<Item = &ProjectFile> {
        self.packages.iter().flat_map(|p| p.files.iter())
    }
}

/// External code grouped by `groupId:artifactId:version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDependencyGroup {
    group_id: String,
    artifact_id: String,
    version: String,
    #[serde(default)]
    packages: Vec<PackageGroup>,
}

impl ExternalDependencyGroup {
    pub fn new(coordinates: DependencyCoordinates) -> Self {
        Self {
            group_id: coordinates.group_id,
            artifact_id: coordinates.artifact_id,
            version: coordinates.version,
            packages: Vec::new(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is(&self, coordinates: &DependencyCoordinates) -> bool {
        self.group_id == coordinates.group_id
            && self.artifact_id == coordinates.artifact_id
            && self.version == coordinates.version
    }

    pub fn coordinates(&self) -> DependencyCoordinates {
        DependencyCoordinates {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
        }
    }

    pub fn packages(&self) -> &[PackageGroup] {
        &self.packages
    }

    pub fn package_entry(&mut self, package_name: &str) -> &mut PackageGroup {
        package_entry(&mut self.packages, package_name)
    }

    pub fn files(&self) -> impl Iterator<Item = &ProjectFile> {
        self.packages.iter().flat_map(|p| p.files.iter())
    }
}

/// Everything selected from one workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFileTree {
    project_name: String,
    #[serde(default)]
    modules: Vec<ModuleGroup>,
    #[serde(default)]
    external_dependencies: Vec<ExternalDependencyGroup>,
}

impl ProjectFileTree {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            modules: Vec::new(),
            external_dependencies: Vec::new(),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn modules(&self) -> &[ModuleGroup] {
        &self.modules
    }

    pub fn external_dependencies(&self) -> &[ExternalDependencyGroup] {
        &self.external_dependencies
    }

    pub fn module_entry(&mut self, module_name: &str) -> &mut ModuleGroup {
        entry(
            &mut self.modules,
            |m| m.module_name == module_name,
            || ModuleGroup::new(module_name),
        )
    }

    pub fn dependency_entry(&mut self, coordinates: &DependencyCoordinates) -> &mut ExternalDependencyGroup {
        entry(
            &mut self.external_dependencies,
            |d| d.is(coordinates),
            || ExternalDependencyGroup::new(coordinates.clone()),
        )
    }

    /// Files under local modules
    pub fn local_files(&self) -> impl Iterator<Item = &ProjectFile> {
        self.modules.iter().flat_map(|m| m.files())
    }

    /// Files under external dependency groups
    pub fn external_files(&self) -> impl Iterator<Item = &ProjectFile> {
        self.external_dependencies
            .iter()
            .flat_map(|d| d.files())
    }

    pub fn find_local_file(&self, file_path: &str) -> Option<&ProjectFile> {
        self.local_files().find(|f| f.file_path == file_path)
    }

    /// Local or external file with this path (local wins)
    pub fn find_file(&self, file_path: &str) -> Option<&ProjectFile> {
        self.find_local_file(file_path)
            .or_else(|| self.external_files().find(|f| f.file_path == file_path))
    }

    pub fn find_file_mut(&mut self, file_path: &str) -> Option<&mut ProjectFile> {
        self.packages_mut()
            .flat_map(|p| p.files.iter_mut())
            .find(|f| f.file_path == file_path)
    }

    /// Remove a file by path from local modules, falling back to external groups.
    pub fn remove_file(&mut self, file_path: &str) -> bool {
        for package in self.modules.iter_mut().flat_map(|m| m.packages.iter_mut()) {
            if package.remove_file(file_path) {
                return true;
            }
        }
        for package in self
            .external_dependencies
            .iter_mut()
            .flat_map(|d| d.packages.iter_mut())
        {
            if package.remove_file(file_path) {
                return true;
            }
        }
        false
    }

    /// Drop every local module; external groups are kept
    pub fn clear_local(&mut self) -> bool {
        let changed = !self.modules.is_empty();
        self.modules.clear();
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.external_dependencies.is_empty()
    }

    /// Collapse pass over every file of this project. Returns files collapsed.
    pub fn collapse_whole_files(&mut self) -> usize {
        let mut collapsed = 0;
        for package in self.packages_mut() {
            for file in package.files_mut() {
                if file.collapse_if_complete() {
                    collapsed += 1;
                }
            }
        }
        collapsed
    }

    pub fn merge(&mut self, other: ProjectFileTree) {
        for module in other.modules {
            let target = self.module_entry(&module.module_name);
            merge_packages(&mut target.packages, module.packages);
        }
        for dependency in other.external_dependencies {
            let coordinates = dependency.coordinates();
            let target = self.dependency_entry(&coordinates);
            merge_packages(&mut target.packages, dependency.packages);
        }
    }

    fn packages_mut(&mut self) -> impl Iterator<Item = &mut PackageGroup> {
        self.modules
            .iter_mut()
            .flat_map(|m| m.packages.iter_mut())
            .chain(
                self.external_dependencies
                    .iter_mut()
                    .flat_map(|d| d.packages.iter_mut()),
            )
    }
}

/// Root of a session's selection: one [`ProjectFileTree`] per workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppFileTree {
    #[serde(default)]
    project_file_trees: Vec<ProjectFileTree>,
}

impl AppFileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_file_trees(&self) -> &[ProjectFileTree] {
        &self.project_file_trees
    }

    pub fn project(&self, project_name: &str) -> Option<&ProjectFileTree> {
        self.project_file_trees
            .iter()
            .find(|p| p.project_name == project_name)
    }

    pub fn project_mut(&mut self, project_name: &str) -> Option<&mut ProjectFileTree> {
        self.project_file_trees
            .iter_mut()
            .find(|p| p.project_name == project_name)
    }

    pub fn project_entry(&mut self, project_name: &str) -> &mut ProjectFileTree {
        entry(
            &mut self.project_file_trees,
            |p| p.project_name == project_name,
            || ProjectFileTree::new(project_name),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.project_file_trees.iter().all(ProjectFileTree::is_empty)
    }

    /// Every file across projects, local before external within each project
    pub fn files(&self) -> impl Iterator<Item = &ProjectFile> {
        self.project_file_trees
            .iter()
            .flat_map(|p| p.local_files().chain(p.external_files()))
    }

    /// Promote fully covered files to whole selections. Returns files collapsed.
    pub fn collapse_whole_files(&mut self) -> usize {
        self.project_file_trees
            .iter_mut()
            .map(ProjectFileTree::collapse_whole_files)
            .sum()
    }

    /// Fold another tree into this one with find-or-create at every level.
    ///
    /// A whole flag on either side wins; method lists are unioned by key.
    pub fn merge(&mut self, other: AppFileTree) {
        for project in other.project_file_trees {
            let name = project.project_name.clone();
            self.project_entry(&name).merge(project);
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            projects: self.project_file_trees.len(),
            ..TreeStats::default()
        };
        for file in self.files() {
            stats.files += 1;
            if file.whole {
                stats.whole_files += 1;
            }
            stats.classes += file.classes.len();
            stats.methods += file.classes.iter().map(|c| c.methods.len()).sum::<usize>();
        }
        stats
    }
}

/// Node counts, used for build summaries and `show`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub projects: usize,
    pub files: usize,
    pub whole_files: usize,
    pub classes: usize,
    pub methods: usize,
}
