use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn variants_cmd(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("variants"));
    cmd.arg("--root").arg(root).env_remove("VARIANTS_EDITOR");
    cmd
}

fn widget_root() -> TempDir {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("ui");
    fs::create_dir_all(&dir).expect("ui dir");
    fs::write(dir.join("Widget.manifest.ts"), "").expect("manifest");
    fs::write(
        dir.join("Widget.v1.tsx"),
        "export default function WidgetV1() {\n  return null;\n}\n",
    )
    .expect("v1");
    tmp
}

#[test]
fn list_json_reports_units() {
    let tmp = widget_root();
    variants_cmd(tmp.path())
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(contains("\"Widget\""))
        .stdout(contains("\"v1\""));
}

#[test]
fn new_then_label_updates_manifest() {
    let tmp = widget_root();
    variants_cmd(tmp.path())
        .args(["new", "Widget"])
        .assert()
        .success()
        .stdout(contains("created"));
    assert!(tmp.path().join("ui/Widget.v2.tsx").is_file());

    variants_cmd(tmp.path())
        .args(["label", "Widget", "v2", "Compact"])
        .assert()
        .success();
    let manifest = fs::read_to_string(tmp.path().join("ui/Widget.manifest.ts")).expect("manifest");
    assert!(manifest.contains("label: \"Compact\""), "{manifest}");

    variants_cmd(tmp.path())
        .args(["diff", "Widget"])
        .assert()
        .success()
        .stdout(contains("No differences"));
}

#[test]
fn unit_resolves_from_version_file_path() {
    let tmp = widget_root();
    let version = tmp.path().join("ui/Widget.v1.tsx");
    variants_cmd(tmp.path())
        .args(["fork", version.to_str().expect("utf8"), "v1", "--to", "v1_2"])
        .assert()
        .success();
    let copy = fs::read(tmp.path().join("ui/Widget.v1_2.tsx")).expect("copy");
    assert_eq!(copy, fs::read(&version).expect("source"));
}

#[test]
fn conflicting_rename_fails_without_touching_files() {
    let tmp = widget_root();
    fs::write(tmp.path().join("ui/Widget.v2.tsx"), "").expect("v2");
    variants_cmd(tmp.path())
        .args(["rename", "Widget", "v1", "v2"])
        .assert()
        .failure()
        .stderr(contains("already has version v2"));
    assert!(tmp.path().join("ui/Widget.v1.tsx").is_file());
}

#[test]
fn diff_shows_pending_regeneration() {
    let tmp = widget_root();
    variants_cmd(tmp.path())
        .args(["diff", "ui"])
        .assert()
        .success()
        .stdout(contains("+++ b/Widget.manifest.ts"))
        .stdout(contains("+  \"v1\": {"));
}

#[test]
fn promote_replaces_unit_with_base_file() {
    let tmp = widget_root();
    fs::write(tmp.path().join("ui/Widget.v2.tsx"), "export default function WidgetV2() {}\n")
        .expect("v2");
    variants_cmd(tmp.path())
        .args(["promote", "Widget", "v2"])
        .assert()
        .success()
        .stdout(contains("promoted"));

    let base = fs::read_to_string(tmp.path().join("ui/Widget.tsx")).expect("base");
    assert!(base.contains("function Widget()"), "{base}");
    assert!(!tmp.path().join("ui/Widget.manifest.ts").exists());
    assert!(!tmp.path().join("ui/Widget.v1.tsx").exists());

    variants_cmd(tmp.path())
        .args(["list"])
        .assert()
        .success()
        .stdout(contains("No units"));
}
