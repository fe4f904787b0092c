use crate::coords::DependencyCoordinates;
use crate::error::TreeError;
use crate::facts::{ClassDependencyGraph, ClassFacts, MethodFacts};
use crate::types::*;

/// Where a class lands in its project tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Placement {
    Local {
        module: String,
        package: String,
        file_path: String,
    },
    External {
        coordinates: DependencyCoordinates,
        package: String,
        file_path: String,
    },
}

impl Placement {
    /// Classify a class as local or external and derive its grouping keys
    pub(crate) fn resolve(class: &ClassFacts) -> Result<Self, TreeError> {
        let package = package_name(class.qualified_name.as_deref());
        if class.workspace.contains(&class.file_path) {
            let relative = class
                .workspace
                .relative_path(&class.file_path)
                .unwrap_or(&class.file_path);
            Ok(Placement::Local {
                module: module_name(relative),
                package,
                file_path: relative.to_string(),
            })
        } else {
            let coordinates = DependencyCoordinates::from_jar_path(&class.file_path)
                .ok_or_else(|| TreeError::UnresolvedExternalPath(class.file_path.clone()))?;
            Ok(Placement::External {
                coordinates,
                package,
                file_path: class.file_path.clone(),
            })
        }
    }

    pub(crate) fn file_path(&self) -> &str {
        match self {
            Placement::Local { file_path, .. } | Placement::External { file_path, .. } => file_path,
        }
    }

    /// Find-or-create module/dependency → package → file.
    ///
    /// A file already in the project is reused where it sits, so one path
    /// never appears under two packages.
    pub(crate) fn file_entry<'t>(&self, project: &'t mut ProjectFileTree) -> &'t mut ProjectFile {
        match existing_placement(project, self.file_path()) {
            Some(existing) => existing.create_in(project),
            None => self.create_in(project),
        }
    }

    fn create_in<'t>(&self, project: &'t mut ProjectFileTree) -> &'t mut ProjectFile {
        match self {
            Placement::Local {
                module,
                package,
                file_path,
            } => project
                .module_entry(module)
                .package_entry(package)
                .file_entry(file_path),
            Placement::External {
                coordinates,
                package,
                file_path,
            } => project
                .dependency_entry(coordinates)
                .package_entry(package)
                .file_entry(file_path),
        }
    }
}

fn existing_placement(project: &ProjectFileTree, file_path: &str) -> Option<Placement> {
    for module in project.modules() {
        for package in module.packages() {
            if package.find_file(file_path).is_some() {
                return Some(Placement::Local {
                    module: module.module_name().to_string(),
                    package: package.package_name().to_string(),
                    file_path: file_path.to_string(),
                });
            }
        }
    }
    for dependency in project.external_dependencies() {
        for package in dependency.packages() {
            if package.find_file(file_path).is_some() {
                return Some(Placement::External {
                    coordinates: dependency.coordinates(),
                    package: package.package_name().to_string(),
                    file_path: file_path.to_string(),
                });
            }
        }
    }
    None
}

/// First segment of a workspace-relative path
pub(crate) fn module_name(relative_path: &str) -> String {
    match relative_path.split('/').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => UNKNOWN_MODULE.to_string(),
    }
}

/// Qualified name without its last dotted segment
pub(crate) fn package_name(qualified_name: Option<&str>) -> String {
    qualified_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(package, _)| package)
        .filter(|package| !package.is_empty())
        .unwrap_or(DEFAULT_PACKAGE)
        .to_string()
}

pub(crate) fn class_name(class: &ClassFacts) -> &str {
    class
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .or_else(|| {
            class
                .qualified_name
                .as_deref()
                .and_then(|qualified| qualified.rsplit('.').next())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or(UNNAMED_CLASS)
}

pub(crate) fn project_method(method: &MethodFacts) -> ProjectMethod {
    ProjectMethod::new(method.name.clone(), method.parameter_types.clone())
        .with_handle(method.handle.clone())
}

/// Build counters, logged once per build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub placed: usize,
    pub skipped: usize,
    pub collapsed_files: usize,
}

/// Converts a class dependency graph into an [`AppFileTree`]
#[derive(Debug, Default)]
pub struct TreeBuilder {
    report: BuildReport,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters from the last [`TreeBuilder::build`]
    pub fn report(&self) -> BuildReport {
        self.report
    }

    /// Build a tree from the graph.
    ///
    /// Entries whose external path carries no dependency coordinates are
    /// dropped; every other entry lands in the tree.
    pub fn build(&mut self, graph: &ClassDependencyGraph) -> AppFileTree {
        self.report = BuildReport::default();
        let mut tree = AppFileTree::new();

        // Phase 1: place every class
        for dependency in &graph.classes {
            let class = &dependency.class;
            let placement = match Placement::resolve(class) {
                Ok(placement) => placement,
                Err(err) => {
                    log::debug!("Skipping class {}: {}", class_name(class), err);
                    self.report.skipped += 1;
                    continue;
                }
            };

            let project = tree.project_entry(&class.workspace.name);
            let file = placement.file_entry(project);
            file.insert_class(select_class(class, &dependency.used_methods));
            self.report.placed += 1;
        }

        // Phase 2: whole-ness of a file is only known once all its classes are in
        self.report.collapsed_files = tree.collapse_whole_files();

        let stats = tree.stats();
        log::info!(
            "Built context tree: {} projects, {} files ({} whole), {} classes, {} skipped",
            stats.projects,
            stats.files,
            stats.whole_files,
            stats.classes,
            self.report.skipped
        );

        tree
    }
}

/// Build a tree with a throwaway [`TreeBuilder`]
pub fn build_from_graph(graph: &ClassDependencyGraph) -> AppFileTree {
    TreeBuilder::new().build(graph)
}

/// Selected class for one graph entry; whole when every declared
/// non-constructor method is used.
fn select_class(class: &ClassFacts, used_methods: &[MethodFacts]) -> ProjectClass {
    let declared: Vec<&MethodFacts> = class.methods.iter().filter(|m| !m.is_constructor).collect();
    let used: Vec<&MethodFacts> = used_methods.iter().filter(|m| !m.is_constructor).collect();

    let whole = !declared.is_empty()
        && declared
            .iter()
            .all(|d| used.iter().any(|u| u.same_key(d)));

    let mut selected = ProjectClass::new(class_name(class)).with_handle(class.handle.clone());
    if whole {
        selected.mark_whole();
    } else {
        for method in used {
            selected.add_method(project_method(method));
        }
    }
    selected
}
