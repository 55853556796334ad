//! Merging generated keys into existing metadata (`_meta.json`) files.
//!
//! A MetaFile is a JSON object owned mostly by humans. The pipeline owns a
//! few top-level keys and regenerates them on each run; everything else is
//! preserved verbatim, in its original order.

use std::path::Path;

use feedgen_shared::{ConfigArtifact, FeedgenError, Result};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::writer::{ArtifactMeta, to_pretty_json, write_atomic};

/// Build the generated fragment: `{ <key>: [ { "symbol", "title" }, ... ] }`.
pub fn meta_fragment(key: &str, artifact: &ConfigArtifact) -> Map<String, Value> {
    let entries = artifact
        .feeds
        .iter()
        .map(|feed| {
            let mut entry = Map::new();
            entry.insert("symbol".into(), Value::String(feed.symbol.clone()));
            entry.insert("title".into(), Value::String(feed.display_name.clone()));
            Value::Object(entry)
        })
        .collect();

    let mut fragment = Map::new();
    fragment.insert(key.to_string(), Value::Array(entries));
    fragment
}

/// Shallow merge of `fragment` into `existing`.
///
/// Keys already present keep their position; new keys are appended.
/// Keys in `owned_keys` that the fragment no longer produces are removed.
pub fn merge_meta(
    mut existing: Map<String, Value>,
    fragment: &Map<String, Value>,
    owned_keys: &[String],
) -> Map<String, Value> {
    existing.retain(|key, _| fragment.contains_key(key) || !owned_keys.contains(key));
    for (key, value) in fragment {
        existing.insert(key.clone(), value.clone());
    }
    existing
}

/// Read a MetaFile. A missing file is an empty object.
pub fn read_meta(path: &Path) -> Result<Map<String, Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "meta file missing, starting empty");
            return Ok(Map::new());
        }
        Err(e) => return Err(FeedgenError::io(path, e)),
    };

    let value: Value = serde_json::from_str(&content).map_err(|e| {
        FeedgenError::emission(path.display().to_string(), format!("malformed JSON: {e}"))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(FeedgenError::emission(
            path.display().to_string(),
            format!("expected a JSON object, found {}", json_kind(&other)),
        )),
    }
}

/// Read, merge, and write back one MetaFile.
///
/// On a malformed existing file the error is returned and the file is not touched.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn merge_meta_file(
    path: &Path,
    fragment: &Map<String, Value>,
    owned_keys: &[String],
) -> Result<ArtifactMeta> {
    let existing = read_meta(path)?;
    let preserved = existing
        .keys()
        .filter(|k| !fragment.contains_key(*k) && !owned_keys.contains(*k))
        .count();

    let merged = merge_meta(existing, fragment, owned_keys);
    let json = to_pretty_json(&Value::Object(merged))?;
    let meta = write_atomic(path, json.as_bytes())?;

    info!(preserved, generated = fragment.len(), "meta file merged");
    Ok(meta)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::test_support::temp_dir;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn feeds_fragment(symbols: &[&str]) -> Map<String, Value> {
        let list: Vec<Value> = symbols
            .iter()
            .map(|s| json!({ "symbol": s, "title": s }))
            .collect();
        object(json!({ "feeds": list }))
    }

    #[test]
    fn unrelated_keys_survive() {
        let merged = merge_meta(object(json!({ "foo": 1 })), &feeds_fragment(&["BTC-USD"]), &[]);
        assert_eq!(
            Value::Object(merged),
            json!({ "foo": 1, "feeds": [{ "symbol": "BTC-USD", "title": "BTC-USD" }] })
        );
    }

    #[test]
    fn remerge_replaces_only_owned_key_in_place() {
        let first = merge_meta(
            object(json!({ "foo": 1, "feeds": ["old"], "zeta": true })),
            &feeds_fragment(&["BTC-USD"]),
            &[],
        );
        let second = merge_meta(first.clone(), &feeds_fragment(&["ETH-USD"]), &[]);

        let keys: Vec<&str> = second.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["foo", "feeds", "zeta"]);
        assert_eq!(second["foo"], json!(1));
        assert_eq!(second["feeds"][0]["symbol"], json!("ETH-USD"));
    }

    #[test]
    fn merge_is_idempotent() {
        let fragment = feeds_fragment(&["BTC-USD", "AAPL"]);
        let once = merge_meta(object(json!({ "foo": 1 })), &fragment, &[]);
        let twice = merge_meta(once.clone(), &fragment, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn stale_owned_keys_are_removed() {
        let existing = object(json!({ "a": 1, "legacy_feeds": [], "feeds": [], "b": 2 }));
        let owned = vec!["feeds".to_string(), "legacy_feeds".to_string()];

        let merged = merge_meta(existing, &feeds_fragment(&[]), &owned);

        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "feeds", "b"]);
    }

    #[test]
    fn fragment_lists_symbol_and_title() {
        use chrono::Utc;
        use feedgen_shared::ArtifactFeed;

        let artifact = ConfigArtifact {
            schema_version: 1,
            generator: "feedgen/test".into(),
            generated_at: Utc::now(),
            feeds: vec![ArtifactFeed {
                symbol: "BTC-USD".into(),
                display_name: "Bitcoin / USD".into(),
                metadata: Default::default(),
                supporting_adapters: vec!["yahoo".into()],
            }],
        };

        let fragment = meta_fragment("data_feeds", &artifact);
        assert_eq!(
            Value::Object(fragment),
            json!({ "data_feeds": [{ "symbol": "BTC-USD", "title": "Bitcoin / USD" }] })
        );
    }

    #[test]
    fn missing_file_starts_empty() {
        let root = temp_dir("fg-meta-test");
        let path = root.join("docs/_meta.json");

        merge_meta_file(&path, &feeds_fragment(&["BTC-USD"]), &[]).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({ "feeds": [{ "symbol": "BTC-USD", "title": "BTC-USD" }] }));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn file_merge_preserves_existing_order() {
        let root = temp_dir("fg-meta-test");
        let path = root.join("_meta.json");
        std::fs::write(&path, r#"{"zebra": {"title": "Z"}, "feeds": [], "apple": 1}"#).unwrap();

        merge_meta_file(&path, &feeds_fragment(&["AAPL"]), &[]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let zebra = content.find("\"zebra\"").unwrap();
        let feeds = content.find("\"feeds\"").unwrap();
        let apple = content.find("\"apple\"").unwrap();
        assert!(zebra < feeds && feeds < apple);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn malformed_file_is_error_and_untouched() {
        let root = temp_dir("fg-meta-test");
        let path = root.join("_meta.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = merge_meta_file(&path, &feeds_fragment(&["AAPL"]), &[]).unwrap_err();
        assert!(matches!(err, FeedgenError::Emission { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");

        std::fs::write(&path, "[1, 2]").unwrap();
        let err = merge_meta_file(&path, &feeds_fragment(&["AAPL"]), &[]).unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1, 2]");

        std::fs::remove_dir_all(&root).ok();
    }
}
