//! Integration tests for concatenating writers.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use datalayer::config::SourceConfig;
use datalayer::models::{Item, Value};
use datalayer::{CodecFactory, CodecRegistry, ConcatenatingWriter, Error, ItemReader, ItemWriter};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::json;

fn concat(config: &SourceConfig, parts: &[Vec<u8>]) -> datalayer::Result<Vec<u8>> {
    let registry = CodecRegistry::with_defaults();
    let factory = registry.for_config(config)?;
    let mut out = Vec::new();
    {
        let mut writer = factory.concatenating_writer(config, Box::new(&mut out))?;
        for part in parts {
            writer.write_part(&mut part.as_slice())?;
        }
        writer.finalize()?;
    }
    Ok(out)
}

fn encode(config: &SourceConfig, items: &[Item]) -> Vec<u8> {
    let registry = CodecRegistry::with_defaults();
    let mut out = Vec::new();
    let mut writer = registry
        .create_item_writer(config, Box::new(&mut out))
        .unwrap();
    for item in items {
        writer.write(item).unwrap();
    }
    writer.close().unwrap();
    out
}

fn decode(config: &SourceConfig, data: &[u8]) -> Vec<Item> {
    let registry = CodecRegistry::with_defaults();
    let mut reader = registry.create_item_reader(config, Box::new(data)).unwrap();
    let mut items = Vec::new();
    while let Some(item) = reader.read().unwrap() {
        items.push(item);
    }
    items
}

#[test]
fn test_json_parts_merge_into_one_array() {
    let config = SourceConfig::from_json(json!({"encoding": "json"})).unwrap();
    let parts = vec![
        br#"[{"id":1}]"#.to_vec(),
        br#"[{"id":2}]"#.to_vec(),
        br#"[{"id":3}]"#.to_vec(),
    ];
    let out = concat(&config, &parts).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), r#"[{"id":1},{"id":2},{"id":3}]"#);
}

#[test]
fn test_json_merge_of_encoded_parts_is_readable() {
    let config = SourceConfig::from_json(json!({"encoding": "json"})).unwrap();
    let parts = vec![
        encode(&config, &[Item::new().with("id", 1), Item::new().with("id", 2)]),
        encode(&config, &[]),
        encode(&config, &[Item::new().with("id", 3)]),
    ];
    let items = decode(&config, &concat(&config, &parts).unwrap());
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].get("id"), Some(&Value::Integer(3)));
}

#[test]
fn test_json_malformed_part_fails_merge() {
    let config = SourceConfig::from_json(json!({"encoding": "json"})).unwrap();
    let parts = vec![br#"[{"id":1}]"#.to_vec(), b"[{\"id\":".to_vec()];
    assert!(matches!(concat(&config, &parts), Err(Error::Decode { .. })));
}

#[test]
fn test_csv_parts_concatenate_bytes() {
    let config = SourceConfig::from_json(json!({
        "encoding": "csv",
        "columns": ["id"],
        "hasHeader": false
    }))
    .unwrap();
    let parts = vec![b"1\n2\n".to_vec(), b"3\n".to_vec()];
    let out = concat(&config, &parts).unwrap();
    assert_eq!(out, b"1\n2\n3\n");
}

#[test]
fn test_parquet_parts_keep_row_order() {
    let config = SourceConfig::from_json(json!({
        "encoding": "parquet",
        "schema": "message m { required int64 id; optional binary name (STRING); }"
    }))
    .unwrap();
    let first: Vec<Item> = (0..3).map(|i| Item::new().with("id", i)).collect();
    let second: Vec<Item> = (3..5)
        .map(|i| Item::new().with("id", i).with("name", format!("n{i}")))
        .collect();
    let parts = vec![encode(&config, &first), encode(&config, &second)];
    let merged = concat(&config, &parts).unwrap();

    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(merged.clone())).unwrap();
    assert_eq!(builder.metadata().num_row_groups(), parts.len());

    let items = decode(&config, &merged);
    let ids: Vec<_> = items.iter().filter_map(|item| item.get("id").cloned()).collect();
    assert_eq!(ids, (0..5).map(Value::Integer).collect::<Vec<_>>());
    assert_eq!(items[4].get("name"), Some(&Value::from("n4")));
}

#[test]
fn test_parquet_zero_parts_yield_readable_empty_file() {
    let config = SourceConfig::from_json(json!({
        "encoding": "parquet",
        "schema": "message m { required int64 id; optional binary name (STRING); }"
    }))
    .unwrap();
    let merged = concat(&config, &[]).unwrap();
    assert!(!merged.is_empty());
    assert!(decode(&config, &merged).is_empty());
}

#[test]
fn test_parquet_garbage_part_fails_merge() {
    let config = SourceConfig::from_json(json!({
        "encoding": "parquet",
        "schema": "message m { required int64 id; }"
    }))
    .unwrap();
    assert!(concat(&config, &[b"nope".to_vec()]).is_err());
}
