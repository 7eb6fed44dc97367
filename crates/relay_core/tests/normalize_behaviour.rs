use pretty_assertions::assert_eq;
use relay_core::{normalize, NormalizeError};
use serde_json::{json, Value};

fn random_user_payload() -> Value {
    json!({
        "results": [
            {
                "gender": "female",
                "name": {"title": "Ms", "first": "Ana", "last": "Lima"},
                "location": {
                    "street": {"number": 4181, "name": "Rua Dois"},
                    "city": "Recife",
                    "state": "Pernambuco",
                    "country": "Brazil",
                    "postcode": 70142,
                    "coordinates": {"latitude": "-50.4197", "longitude": "-107.0834"}
                },
                "email": "ana.lima@example.com",
                "dob": {"date": "1994-03-12T05:09:44.106Z", "age": 30},
                "nat": "BR"
            },
            {
                "gender": "male",
                "name": {"title": "Mr", "first": "Rui", "last": "Sousa"},
                "location": {
                    "street": {"number": 12, "name": "Avenida Um"},
                    "city": "Natal",
                    "state": "Rio Grande do Norte",
                    "country": "Brazil",
                    "postcode": "59000-000",
                    "coordinates": {"latitude": "1.0", "longitude": "2.0"}
                },
                "email": "rui.sousa@example.com",
                "dob": {"date": "1980-01-01T00:00:00.000Z", "age": 44},
                "nat": "BR"
            }
        ],
        "info": {"seed": "abc", "results": 2, "page": 1, "version": "1.4"}
    })
}

#[test]
fn single_nested_record_flattens_to_one_row() {
    let raw = json!({"results": [{"name": {"first": "Ana", "last": "Lima"}, "age": 30}]});

    let table = normalize(&raw).expect("normalize");

    assert_eq!(table.len(), 1);
    assert_eq!(table.columns(), ["name_first", "name_last", "age"]);
    assert_eq!(
        Value::Object(table.rows()[0].clone()),
        json!({"name_first": "Ana", "name_last": "Lima", "age": "30"})
    );
}

#[test]
fn numbers_are_stringified_and_other_values_kept() {
    let raw = json!({"results": [{
        "count": 7,
        "ratio": 0.25,
        "label": "x",
        "missing": null,
        "active": true,
        "tags": [1, 2]
    }]});

    let table = normalize(&raw).expect("normalize");
    let row = &table.rows()[0];

    assert_eq!(row["count"], json!("7"));
    assert_eq!(row["ratio"], json!("0.25"));
    assert_eq!(row["label"], json!("x"));
    assert_eq!(row["missing"], Value::Null);
    assert_eq!(row["active"], json!(true));
    assert_eq!(row["tags"], json!([1, 2]));
}

#[test]
fn column_names_are_lower_trimmed_and_dot_free() {
    let table = normalize(&random_user_payload()).expect("normalize");

    assert!(table.has_column("location_street_number"));
    assert!(table.has_column("dob_age"));
    for column in table.columns() {
        assert_eq!(column, &column.to_lowercase());
        assert_eq!(column, column.trim());
        assert!(!column.contains('.'), "column {column} still has a dot");
    }
    for row in table.rows() {
        for value in row.values() {
            assert!(!value.is_number(), "numeric value survived: {value}");
        }
    }
}

#[test]
fn mixed_types_in_one_column_are_coerced_per_value() {
    let table = normalize(&random_user_payload()).expect("normalize");

    assert_eq!(table.cell(0, "location_postcode"), &json!("70142"));
    assert_eq!(table.cell(1, "location_postcode"), &json!("59000-000"));
}

#[test]
fn normalizing_twice_changes_nothing() {
    let once = normalize(&random_user_payload()).expect("first pass");
    let twice = normalize(&once.to_payload()).expect("second pass");

    assert_eq!(once, twice);
}

#[test]
fn colliding_columns_keep_the_last_value() {
    let raw = json!({"results": [{"Name": {"First": "outer"}, "name_first": "flat"}]});

    let table = normalize(&raw).expect("normalize");

    assert_eq!(table.columns(), ["name_first"]);
    assert_eq!(table.cell(0, "name_first"), &json!("flat"));
}

#[test]
fn empty_nested_objects_add_no_column() {
    let raw = json!({"results": [{"id": {}, "email": "a@b.c"}]});

    let table = normalize(&raw).expect("normalize");

    assert_eq!(table.columns(), ["email"]);
}

#[test]
fn empty_results_give_an_empty_table() {
    let table = normalize(&json!({"results": []})).expect("normalize");
    assert!(table.is_empty());
    assert!(table.columns().is_empty());
}

#[test]
fn malformed_payloads_are_rejected() {
    for raw in [
        json!({}),
        json!({"results": {"name": "x"}}),
        json!({"results": [1, 2]}),
        json!([]),
    ] {
        let err = normalize(&raw).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedPayload(_)), "{raw}");
    }
}
