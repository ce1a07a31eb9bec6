//! Property-based tests for values, items and fixed-width cells.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Flat-file cells always have the declared width
//! - Integer cells keep their value through zero padding
//! - JSON values survive conversion through `Value`
//! - JSON items survive a write/read cycle in field order

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use datalayer::config::SourceConfig;
use datalayer::io::formats::flatfile::{FieldDescriptor, FieldType, render_cell};
use datalayer::models::{Item, Value};
use datalayer::{CodecRegistry, ItemReader, ItemWriter};
use proptest::prelude::*;
use serde_json::json;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        "[a-zA-Z0-9 ]{0,20}".prop_map(Value::String),
    ]
}

proptest! {
    /// Property: a rendered cell is exactly as wide as its descriptor.
    #[test]
    fn prop_cell_has_declared_width(text in "\\PC{0,30}", width in 1usize..40, integer in any::<bool>()) {
        let field_type = if integer { FieldType::Integer } else { FieldType::String };
        let descriptor = FieldDescriptor::new("f", width).with_type(field_type);
        prop_assert_eq!(render_cell(&descriptor, &Value::String(text)).len(), width);
    }

    /// Property: zero padding keeps a non-negative integer that fits.
    #[test]
    fn prop_zero_padding_preserves_integer(n in 0i64..1_000_000, extra in 0usize..5) {
        let width = n.to_string().len() + extra;
        let descriptor = FieldDescriptor::new("n", width).with_type(FieldType::Integer);
        let cell = render_cell(&descriptor, &Value::Integer(n));
        prop_assert_eq!(cell.parse::<i64>().unwrap(), n);
        prop_assert!(cell.chars().all(|c| c.is_ascii_digit()));
    }

    /// Property: JSON scalars and arrays convert through `Value` unchanged.
    #[test]
    fn prop_value_json_conversion(values in prop::collection::vec(scalar(), 0..5)) {
        let value = Value::Sequence(values);
        prop_assert_eq!(Value::from_json(value.to_json()), value);
    }

    /// Property: the JSON codec reads back what it wrote, in field order.
    #[test]
    fn prop_json_item_cycle(fields in prop::collection::btree_map("[a-z]{1,8}", scalar(), 0..6)) {
        let item: Item = fields.into_iter().rev().collect();
        let config = SourceConfig::from_json(json!({"encoding": "json", "framing": "array"})).unwrap();
        let registry = CodecRegistry::with_defaults();

        let mut out = Vec::new();
        let mut writer = registry.create_item_writer(&config, Box::new(&mut out)).unwrap();
        writer.write(&item).unwrap();
        writer.close().unwrap();

        let mut reader = registry.create_item_reader(&config, Box::new(out.as_slice())).unwrap();
        prop_assert_eq!(reader.read().unwrap(), Some(item));
        prop_assert_eq!(reader.read().unwrap(), None);
    }
}
