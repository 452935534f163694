//! End-to-end unit scenarios against a temporary directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use variants_codec::{parse, parse_keys, TemplateEngine};
use variants_core::Extension;
use variants_sync::{ErrorKind, UnitManager};

fn widget(dir: &Path, files: &[(&str, &str)]) -> UnitManager {
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
    let engine = Arc::new(TemplateEngine::embedded().expect("templates"));
    let mut manager = UnitManager::new(
        dir.join("Widget.manifest.ts"),
        Extension::DEFAULT_PROBE_ORDER.to_vec(),
        engine,
    )
    .expect("manager");
    manager.regenerate().expect("regenerate");
    manager
}

fn manifest(dir: &Path) -> String {
    fs::read_to_string(dir.join("Widget.manifest.ts")).expect("manifest")
}

#[test]
fn manifest_lists_keys_in_ascending_order() {
    let tmp = TempDir::new().unwrap();
    widget(
        tmp.path(),
        &[
            ("Widget.v10.tsx", ""),
            ("Widget.v2.tsx", ""),
            ("Widget.v1_2.tsx", ""),
            ("Widget.v1.tsx", ""),
        ],
    );
    let text = manifest(tmp.path());
    let order: Vec<usize> = ["\"v1\":", "\"v1_2\":", "\"v2\":", "\"v10\":"]
        .iter()
        .map(|k| text.find(k).expect("entry"))
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]), "{text}");
}

#[test]
fn deleting_the_last_version_is_a_conflict() {
    let tmp = TempDir::new().unwrap();
    let mut m = widget(tmp.path(), &[("Widget.v1.tsx", "one")]);
    let err = m.delete_version("v1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(tmp.path().join("Widget.v1.tsx").exists());
}

#[test]
fn delete_removes_file_and_entry() {
    let tmp = TempDir::new().unwrap();
    let mut m = widget(tmp.path(), &[("Widget.v1.tsx", ""), ("Widget.v2.tsx", "")]);
    m.delete_version("v2").unwrap();
    assert!(!tmp.path().join("Widget.v2.tsx").exists());
    assert_eq!(parse_keys(&manifest(tmp.path())).into_iter().collect::<Vec<_>>(), ["v1"]);
}

#[test]
fn file_rename_transfers_label() {
    let tmp = TempDir::new().unwrap();
    let mut m = widget(tmp.path(), &[("Widget.v1.tsx", "")]);
    m.rename_label("v1", "Draft").unwrap();

    fs::remove_file(tmp.path().join("Widget.v1.tsx")).unwrap();
    fs::write(tmp.path().join("Widget.v2.tsx"), "").unwrap();
    m.handle_file_rename().unwrap();

    let meta = parse(&manifest(tmp.path()));
    assert_eq!(meta["v2"].label.as_deref(), Some("Draft"));
    assert!(!meta.contains_key("v1"));
}

#[test]
fn new_version_appends_next_major() {
    let tmp = TempDir::new().unwrap();
    let mut m = widget(tmp.path(), &[("Widget.v1.tsx", ""), ("Widget.v2.tsx", "")]);
    m.new_version(None).unwrap();
    assert!(tmp.path().join("Widget.v3.tsx").exists());
    let meta = parse(&manifest(tmp.path()));
    assert_eq!(meta["v3"].label.as_deref(), Some(""));
}

#[test]
fn duplicate_copies_bytes_verbatim() {
    let tmp = TempDir::new().unwrap();
    let body = "export default function WidgetV1() {\r\n  return <p>é</p>;\r\n}\r\n";
    let mut m = widget(tmp.path(), &[("Widget.v1.tsx", body), ("Widget.v2.tsx", "")]);
    m.duplicate_version("v1", None).unwrap();
    assert_eq!(
        fs::read(tmp.path().join("Widget.v3.tsx")).unwrap(),
        fs::read(tmp.path().join("Widget.v1.tsx")).unwrap()
    );
    assert!(parse_keys(&manifest(tmp.path())).contains("v3"));
}

#[test]
fn rename_label_changes_only_that_label() {
    let tmp = TempDir::new().unwrap();
    let mut m = widget(tmp.path(), &[("Widget.v1.tsx", "original"), ("Widget.v2.tsx", "")]);
    let before = manifest(tmp.path());
    m.rename_label("v1", "Primary").unwrap();

    let after = manifest(tmp.path());
    let meta = parse(&after);
    assert_eq!(meta["v1"].label.as_deref(), Some("Primary"));
    assert_eq!(meta["v2"].label.as_deref(), Some(""));
    assert_eq!(after.lines().count(), before.lines().count());
    assert_eq!(fs::read_to_string(tmp.path().join("Widget.v1.tsx")).unwrap(), "original");
}

#[test]
fn promotion_collapses_the_unit() {
    let tmp = TempDir::new().unwrap();
    let mut m = widget(
        tmp.path(),
        &[
            ("Widget.v1.tsx", "export default function WidgetV1() { return null; }\n"),
            ("Widget.v2.tsx", "export default function WidgetV2() { return <b />; }\nWidgetV2.displayName = 'x';\n"),
            ("Widget.switcher.tsx", "// switcher\n"),
        ],
    );
    let report = m.promote("v2").unwrap();

    assert_eq!(report.base_file, tmp.path().join("Widget.tsx"));
    assert_eq!(
        fs::read_to_string(tmp.path().join("Widget.tsx")).unwrap(),
        "export default function Widget() { return <b />; }\nWidget.displayName = 'x';\n"
    );
    for gone in ["Widget.v1.tsx", "Widget.v2.tsx", "Widget.switcher.tsx", "Widget.manifest.ts"] {
        assert!(!tmp.path().join(gone).exists(), "{gone} should be deleted");
    }
    assert_eq!(report.removed.len(), 4);
    let remaining: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(remaining.len(), 1);
}

#[test]
fn promoted_unit_never_writes_its_manifest_again() {
    let tmp = TempDir::new().unwrap();
    let mut m = widget(
        tmp.path(),
        &[("Widget.v1.tsx", ""), ("Widget.v2.tsx", "export default function WidgetV2() {}\n")],
    );
    m.promote("v2").unwrap();
    assert!(m.is_retired());

    let now = std::time::Instant::now();
    assert_eq!(m.handle_file_rename().unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(m.handle_versions_key_change(now).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(m.regenerate().unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(m.new_version(None).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(m.promote("v2").unwrap_err().kind(), ErrorKind::NotFound);

    assert!(!tmp.path().join("Widget.manifest.ts").exists());
    let remaining: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(remaining.len(), 1);
}

#[test]
fn regenerate_preserves_hand_edited_description() {
    let tmp = TempDir::new().unwrap();
    let mut m = widget(tmp.path(), &[("Widget.v1.tsx", "")]);
    let edited = manifest(tmp.path()).replace(
        "label: \"\",",
        "label: \"Hand\",\n    description: 'multi\\nline',",
    );
    fs::write(tmp.path().join("Widget.manifest.ts"), edited).unwrap();

    fs::write(tmp.path().join("Widget.v2.tsx"), "").unwrap();
    m.handle_file_rename().unwrap();

    let meta = parse(&manifest(tmp.path()));
    assert_eq!(meta["v1"].label.as_deref(), Some("Hand"));
    assert_eq!(meta["v1"].description.as_deref(), Some("multi\nline"));
    assert!(meta.contains_key("v2"));
}

#[test]
fn padded_version_file_never_reaches_the_manifest() {
    let tmp = TempDir::new().unwrap();
    widget(tmp.path(), &[("Widget.v01.tsx", ""), ("Widget.v2.tsx", "")]);
    let text = manifest(tmp.path());
    assert!(!text.contains("./Widget.v1\""), "{text}");
    assert!(text.contains("./Widget.v2\""), "{text}");
    for line in text.lines().filter(|l| l.starts_with("import ")) {
        let specifier = line.split('"').nth(1).unwrap();
        let file = tmp.path().join(format!("{}.tsx", specifier.trim_start_matches("./")));
        assert!(file.is_file(), "import {specifier} has no file on disk");
    }
}
