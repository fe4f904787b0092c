use context_tree::{
    build_from_graph, AppFileTree, ClassDependencyGraph, ClassFacts, DependencyCoordinates,
    MethodFacts, MutationOutcome, ProjectFile, RemovalTarget, SelectedFile, WorkspaceRef,
};
use pretty_assertions::assert_eq;

const ROOT: &str = "/work/shop";
const GUAVA_JAR: &str =
    "/home/dev/.m2/repository/com/google/guava/guava/33.0/guava-33.0.jar!/com/google/common/base/Strings.class";

fn workspace() -> WorkspaceRef {
    WorkspaceRef::new("shop", ROOT)
}

fn methods(names: &[&str]) -> Vec<MethodFacts> {
    names.iter().map(|n| MethodFacts::new(*n, vec![])).collect()
}

fn class(file_path: &str, qualified_name: &str, declared: &[&str]) -> ClassFacts {
    ClassFacts {
        workspace: workspace(),
        file_path: file_path.to_string(),
        qualified_name: Some(qualified_name.to_string()),
        name: qualified_name.rsplit('.').next().map(str::to_string),
        methods: methods(declared),
        handle: None,
    }
}

fn sample_graph() -> ClassDependencyGraph {
    let mut graph = ClassDependencyGraph::new();
    graph.insert(
        class(&format!("{ROOT}/orders/src/OrderService.java"), "shop.orders.OrderService", &["place", "cancel"]),
        methods(&["place"]),
    );
    graph.insert(
        class(&format!("{ROOT}/orders/src/Order.java"), "shop.orders.Order", &["total"]),
        methods(&["total"]),
    );
    graph.insert(
        class(GUAVA_JAR, "com.google.common.base.Strings", &["isNullOrEmpty", "repeat"]),
        methods(&["isNullOrEmpty"]),
    );
    graph
}

fn file<'a>(tree: &'a AppFileTree, path: &str) -> &'a ProjectFile {
    tree.project("shop")
        .and_then(|p| p.find_file(path))
        .unwrap_or_else(|| panic!("missing file {path}"))
}

#[test]
fn build_groups_local_and_external_code() {
    let tree = build_from_graph(&sample_graph());
    let project = tree.project("shop").unwrap();

    assert_eq!(project.modules().len(), 1);
    assert_eq!(project.modules()[0].module_name(), "orders");
    assert_eq!(project.modules()[0].packages()[0].package_name(), "shop.orders");

    let dependency = &project.external_dependencies()[0];
    assert_eq!(
        dependency.coordinates(),
        DependencyCoordinates::new("com.google.guava", "guava", "33.0")
    );
    assert_eq!(dependency.packages()[0].package_name(), "com.google.common.base");
    assert!(dependency.packages()[0].find_file(GUAVA_JAR).is_some());

    assert!(file(&tree, "orders/src/Order.java").is_whole());
    let service = file(&tree, "orders/src/OrderService.java");
    assert!(!service.is_whole());
    assert_eq!(service.find_class("OrderService").unwrap().methods().len(), 1);
}

#[test]
fn build_skips_unresolvable_external_paths() {
    let mut graph = ClassDependencyGraph::new();
    graph.insert(class("/usr/lib/jvm/rt.jar!/java/lang/String.class", "java.lang.String", &["trim"]), methods(&["trim"]));
    let tree = build_from_graph(&graph);

    assert!(tree.project("shop").is_none());
    assert!(tree.is_empty());
}

#[test]
fn build_merges_classes_sharing_a_file() {
    let path = format!("{ROOT}/orders/src/Pair.java");
    let mut graph = ClassDependencyGraph::new();
    graph.insert(class(&path, "shop.orders.Pair", &["left", "right"]), methods(&["left"]));
    graph.insert(class(&path, "shop.orders.Pair", &["left", "right"]), methods(&["right"]));

    let tree = build_from_graph(&graph);
    let pair = file(&tree, "orders/src/Pair.java");
    assert_eq!(pair.classes().len(), 1);
    assert_eq!(pair.find_class("Pair").unwrap().methods().len(), 2);
}

#[test]
fn whole_flags_exclude_children_everywhere() {
    let tree = build_from_graph(&sample_graph());
    for f in tree.files() {
        if f.is_whole() {
            assert!(f.classes().is_empty(), "{} is whole but lists classes", f.file_path());
        }
        for c in f.classes() {
            if c.is_whole() {
                assert!(c.methods().is_empty(), "{} is whole but lists methods", c.class_name());
            }
        }
    }
}

#[test]
fn add_method_is_idempotent() {
    let service = class(&format!("{ROOT}/orders/src/OrderService.java"), "shop.orders.OrderService", &["place", "cancel"]);
    let cancel = MethodFacts::new("cancel", vec!["String".to_string()]);

    let mut tree = build_from_graph(&sample_graph());
    assert!(tree.add_method(&service, &cancel).is_changed());
    let once = tree.clone();
    assert_eq!(tree.add_method(&service, &cancel), MutationOutcome::Unchanged);
    assert_eq!(tree, once);
}

#[test]
fn add_file_is_idempotent_and_local_only() {
    let mut tree = AppFileTree::new();
    let selected = SelectedFile::new(format!("{ROOT}/billing/Invoice.java")).with_package("shop.billing");

    assert!(tree.add_file(&workspace(), &selected).is_changed());
    let once = tree.clone();
    assert_eq!(tree.add_file(&workspace(), &selected), MutationOutcome::Unchanged);
    assert_eq!(tree, once);

    let outside = SelectedFile::new("/tmp/Scratch.java");
    assert!(tree.add_file(&workspace(), &outside).is_skipped());
    assert_eq!(tree, once);
}

#[test]
fn add_method_into_existing_file_keeps_its_package() {
    let invoice = class(&format!("{ROOT}/billing/Invoice.java"), "shop.billing.Invoice", &["sum", "tax"]);
    let unqualified = ClassFacts {
        qualified_name: None,
        ..invoice.clone()
    };

    let mut tree = AppFileTree::new();
    tree.add_method(&unqualified, &MethodFacts::new("sum", vec![]));
    tree.add_method(&invoice, &MethodFacts::new("tax", vec![]));

    let files: Vec<_> = tree.files().map(|f| f.file_path().to_string()).collect();
    assert_eq!(files, vec!["billing/Invoice.java".to_string()]);
    assert_eq!(file(&tree, "billing/Invoice.java").classes()[0].methods().len(), 2);
}

#[test]
fn removing_last_method_drops_class_but_not_file() {
    let mut tree = build_from_graph(&sample_graph());
    let target = RemovalTarget::methods("orders/src/OrderService.java", "OrderService", vec!["place".to_string()]);

    assert!(tree.remove_selected("shop", &target).is_changed());
    let service = file(&tree, "orders/src/OrderService.java");
    assert!(service.classes().is_empty());
    assert!(!service.is_whole());
}

#[test]
fn remove_file_falls_back_to_external_groups() {
    let mut tree = build_from_graph(&sample_graph());
    assert!(tree.remove_selected("shop", &RemovalTarget::file(GUAVA_JAR)).is_changed());
    assert!(tree.project("shop").unwrap().find_file(GUAVA_JAR).is_none());
}

#[test]
fn remove_workspace_keeps_external_groups() {
    let mut tree = build_from_graph(&sample_graph());
    assert!(tree.remove_selected("shop", &RemovalTarget::workspace()).is_changed());

    let project = tree.project("shop").unwrap();
    assert!(project.modules().is_empty());
    assert_eq!(project.external_dependencies().len(), 1);
}

#[test]
fn interactive_adds_never_collapse() {
    let order = class(&format!("{ROOT}/orders/src/Cart.java"), "shop.orders.Cart", &["add"]);
    let mut tree = AppFileTree::new();
    tree.add_method(&order, &MethodFacts::new("add", vec![]));

    let cart = file(&tree, "orders/src/Cart.java");
    assert!(!cart.is_whole());
    assert!(!cart.find_class("Cart").unwrap().is_whole());
}

#[test]
fn json_round_trip_preserves_tree() {
    let mut tree = build_from_graph(&sample_graph());
    tree.add_method(
        &class(&format!("{ROOT}/orders/src/OrderService.java"), "shop.orders.OrderService", &[]),
        &MethodFacts::new("cancel", vec!["java.lang.String".to_string(), "int".to_string()]),
    );

    let json = serde_json::to_string(&tree).unwrap();
    assert!(json.contains("\"projectFileTrees\""));
    assert!(json.contains("\"parameterTypes\":[\"java.lang.String\",\"int\"]"));

    let back: AppFileTree = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tree);
}

#[test]
fn merge_is_idempotent_and_whole_wins() {
    let built = build_from_graph(&sample_graph());

    let mut session = AppFileTree::new();
    session.add_method(
        &class(&format!("{ROOT}/orders/src/Order.java"), "shop.orders.Order", &["total"]),
        &MethodFacts::new("total", vec![]),
    );
    session.merge(built.clone());
    let once = session.clone();
    session.merge(built);

    assert_eq!(session, once);
    let order = file(&session, "orders/src/Order.java");
    assert!(order.is_whole());
    assert!(order.classes().is_empty());
}
