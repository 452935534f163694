//! Idempotence and ordering properties of the manifest codec.

use proptest::prelude::*;
use variants_codec::{parse, parse_keys, render_manifest, MetadataMap, PendingTransfers, TemplateEngine};
use variants_core::{UnitName, VersionKey, VersionMetadata};

fn render(engine: &TemplateEngine, keys: &[VersionKey], previous: &MetadataMap) -> String {
    render_manifest(
        engine,
        &UnitName::from("Widget"),
        keys,
        previous,
        &mut PendingTransfers::new(),
    )
    .expect("render")
}

#[test]
fn keys_are_listed_in_ascending_order() {
    let engine = TemplateEngine::embedded().unwrap();
    let keys: Vec<VersionKey> = ["v10", "v2", "v1_2", "v1"]
        .iter()
        .map(|k| k.parse().unwrap())
        .collect();
    let out = render(&engine, &keys, &MetadataMap::new());

    let positions: Vec<usize> = ["\"v1\":", "\"v1_2\":", "\"v2\":", "\"v10\":"]
        .iter()
        .map(|needle| out.find(needle).unwrap_or_else(|| panic!("{needle} missing in\n{out}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{out}");
    assert_eq!(parse_keys(&out).len(), 4);
}

fn key_strategy() -> impl Strategy<Value = VersionKey> {
    (0u64..40, proptest::option::of(0u64..5)).prop_map(|(major, minor)| VersionKey::new(major, minor))
}

fn metadata_strategy() -> impl Strategy<Value = VersionMetadata> {
    (
        proptest::option::of(any::<String>()),
        proptest::option::of(any::<String>()),
    )
        .prop_map(|(label, description)| VersionMetadata { label, description })
}

proptest! {
    #[test]
    fn parse_then_render_is_idempotent(
        entries in proptest::collection::btree_map(key_strategy(), metadata_strategy(), 1..8)
    ) {
        let engine = TemplateEngine::embedded().unwrap();
        let keys: Vec<VersionKey> = entries.keys().copied().collect();
        let previous: MetadataMap = entries
            .iter()
            .map(|(key, meta)| (key.to_string(), meta.clone()))
            .collect();

        let first = render(&engine, &keys, &previous);
        let second = render(&engine, &keys, &parse(&first));
        prop_assert_eq!(&first, &second);

        let reparsed = parse(&first);
        for (key, meta) in &entries {
            let got = &reparsed[&key.to_string()];
            prop_assert_eq!(got.label.as_deref(), Some(meta.label.as_deref().unwrap_or_default()));
            prop_assert_eq!(&got.description, &meta.description);
        }
    }
}
