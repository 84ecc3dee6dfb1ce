use chainwatch_store::storage::remote::{camel_to_snake, snake_to_camel, FieldCodec};
use chainwatch_store::Record;
use chrono::{DateTime, SecondsFormat};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Upper bound for generated epoch millis (2100-01-01).
const MAX_MILLIS: i64 = 4_102_444_800_000;

fn arb_field_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-zA-Z0-9]{0,12}",
        Just("rpcUrl".to_string()),
        Just("explorerUrl".to_string()),
        Just("isActive".to_string()),
        Just("chainId".to_string()),
        Just("responseTime".to_string()),
    ]
}

fn arb_instant_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("updatedAt".to_string()),
        Just("createdAt".to_string()),
        Just("lastTriggered".to_string()),
        Just("syncedAt".to_string()),
        Just("blockTimestamp".to_string()),
    ]
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000i64..MAX_MILLIS).prop_map(Value::from),
        "[a-zA-Z0-9 _-]{0,16}".prop_map(Value::String),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(2, 12, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn arb_record() -> impl Strategy<Value = Record> {
    (
        proptest::option::of(1i64..10_000),
        prop::collection::btree_map(arb_field_name(), arb_value(), 0..8),
        prop::collection::btree_map(arb_instant_name(), 0i64..MAX_MILLIS, 0..3),
    )
        .prop_map(|(id, fields, instants)| {
            let mut fields: Map<String, Value> = fields.into_iter().collect();
            for (name, millis) in instants {
                fields.insert(name, Value::from(millis));
            }
            Record { id, fields }
        })
}

fn is_instant_name(name: &str) -> bool {
    (name.len() > 2 && name.ends_with("At"))
        || (name.len() > 9 && name.ends_with("Timestamp"))
        || name == "lastTriggered"
}

/// What the caller should read back after a write: the creation instant is
/// server-owned, and top-level epoch millis on instant fields come back as
/// RFC 3339 strings.
fn expected_after_round_trip(record: &Record) -> Record {
    let mut expected = record.clone();
    expected.fields.remove("createdAt");
    for (name, value) in expected.fields.iter_mut() {
        if !is_instant_name(name) {
            continue;
        }
        let at = value
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true));
        if let Some(at) = at {
            *value = Value::String(at);
        }
    }
    expected
}

proptest! {
    #[test]
    fn case_transform_inverts_for_translatable_names(name in "[a-zA-Z][a-zA-Z0-9]{0,16}") {
        prop_assert_eq!(snake_to_camel(&camel_to_snake(&name)), name);
    }

    #[test]
    fn verbatim_columns_survive_decoding(column in "[a-z]{1,6}(_[0-9]{1,3})+(_[a-z]{1,4})?") {
        let codec = FieldCodec::for_collection("Scratchpad").unwrap();
        let field = codec.field_for(&column).unwrap();
        prop_assert_eq!(codec.column_for(&field).unwrap(), column);
    }

    #[test]
    fn remote_round_trip_preserves_fields_and_normalizes_instants(record in arb_record()) {
        let codec = FieldCodec::for_collection("Scratchpad").unwrap();
        let row = codec.to_remote(&record);
        // Unmapped names that land on a mapped column or the key are rejected.
        prop_assume!(row.is_ok());
        let back = codec.from_remote(row.unwrap()).unwrap();

        prop_assert_eq!(back, expected_after_round_trip(&record));
    }
}
