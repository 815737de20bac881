//! Tests for the build watch graph across nested Acornfiles.

use acorn_appdef::appdef::AppDefinition;
use tracing_test::traced_test;

use super::common::TestTree;

const ROOT: &str = r#"
  return {
    containers = { web = { build = "web" } },
    acorns = {
      good = { build = "good" },
      broken = { build = "broken" },
      missing = { build = "missing" },
    },
  }
"#;

fn tree() -> TestTree {
  let tree = TestTree::new();
  tree.write_file("Acornfile", ROOT);
  tree.write_file("good/Acornfile", r#"return { containers = { inner = { build = "inner" } } }"#);
  tree.write_file("broken/Acornfile", "return { containers = ");
  tree
}

#[test]
fn repeated_walks_are_identical() {
  let tree = tree();
  let def = AppDefinition::new(ROOT.as_bytes()).unwrap();

  let first = def.watch_files(tree.root()).unwrap();
  let second = def.watch_files(tree.root()).unwrap();
  assert_eq!(first, second);

  let mut sorted = first.clone();
  sorted.sort();
  sorted.dedup();
  assert_eq!(first, sorted);
}

#[test]
#[traced_test]
fn broken_subtree_keeps_siblings() {
  let tree = tree();
  let root = tree.root();
  let files = AppDefinition::new(ROOT.as_bytes()).unwrap().watch_files(root).unwrap();

  assert_eq!(
    files,
    [
      root.join("broken/Acornfile"),
      root.join("good/Acornfile"),
      root.join("good/inner/.dockerignore"),
      root.join("good/inner/Dockerfile"),
      root.join("web/.dockerignore"),
      root.join("web/Dockerfile"),
    ]
  );
  assert!(!files.iter().any(|p| p.starts_with(root.join("missing"))));
  assert!(logs_contain("skipping"));
}

#[test]
fn fixing_a_subtree_only_adds_its_paths() {
  let tree = tree();
  let root = tree.root();
  let def = AppDefinition::new(ROOT.as_bytes()).unwrap();
  let before = def.watch_files(root).unwrap();

  tree.write_file("missing/Acornfile", r#"return { jobs = { seed = { build = "." } } }"#);
  let after = def.watch_files(root).unwrap();

  assert!(before.iter().all(|p| after.contains(p)));
  let added: Vec<_> = after.iter().filter(|p| !before.contains(p)).cloned().collect();
  assert_eq!(
    added,
    [
      root.join("missing/.dockerignore"),
      root.join("missing/Acornfile"),
      root.join("missing/Dockerfile"),
    ]
  );
}
