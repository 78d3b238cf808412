//! JSON bulk protocol: export, import, validate.

mod common;

use common::{Balance, Blob, FlakyBackend, Item, snapshot, memory_backend};
use serde_json::{Value, json};
use tabx_core::{
    AutoIncrementTable, ErrorClass, KeyPart, Table, TableOptions, TabxError,
    TabxResult,
};

fn items() -> AutoIncrementTable<Item> {
    AutoIncrementTable::new().unwrap()
}

fn export<F>(f: F) -> Value
where
    F: FnOnce(&mut Vec<u8>) -> TabxResult<()>,
{
    let mut out = Vec::new();
    f(&mut out).unwrap();
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn test_export_leads_with_sequence() -> TabxResult<()> {
    let backend = memory_backend();
    let table = items();
    table.insert(&backend, &mut Item::new("a"))?;
    table.insert(&backend, &mut Item::new("b"))?;

    let mut out = Vec::new();
    table.export_json(&backend, &mut out)?;
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text, "[2,\n{\"id\":1,\"name\":\"a\"},\n{\"id\":2,\"name\":\"b\"}]");
    assert_eq!(
        serde_json::from_str::<Value>(&text).unwrap(),
        json!([2, {"id": 1, "name": "a"}, {"id": 2, "name": "b"}])
    );
    Ok(())
}

#[test]
fn test_empty_export_has_no_sequence() {
    let backend = memory_backend();
    let table = items();
    let mut out = Vec::new();
    table.export_json(&backend, &mut out).unwrap();
    assert_eq!(out, b"[]");
    assert_eq!(table.default_json(), "[]");
}

#[test]
fn test_export_import_round_trip() -> TabxResult<()> {
    let source = memory_backend();
    let table = items();
    for name in ["a", "b", "c"] {
        table.insert(&source, &mut Item::new(name))?;
    }
    table.delete_by_id(&source, 3)?;

    let mut dump = Vec::new();
    table.export_json(&source, &mut dump)?;
    assert_eq!(
        serde_json::from_slice::<Value>(&dump).unwrap(),
        json!([3, {"id": 1, "name": "a"}, {"id": 2, "name": "b"}])
    );

    let target = memory_backend();
    table.import_json(&target, dump.as_slice())?;
    assert_eq!(table.last_sequence(&target)?, 3);
    assert_eq!(table.list(&target)?, table.list(&source)?);
    assert_eq!(snapshot(&target), snapshot(&source));

    // Fresh inserts continue after the restored counter
    assert_eq!(table.insert_returning_id(&target, &mut Item::new("d"))?, 4);
    Ok(())
}

#[test]
fn test_import_within_declared_sequence() -> TabxResult<()> {
    let backend = memory_backend();
    let table = items();
    table.import_json(&backend, r#"[5,{"id":3,"name":"x"}]"#.as_bytes())?;
    assert_eq!(table.last_sequence(&backend)?, 5);
    assert_eq!(table.get(&backend, 3)?.map(|i| i.name), Some("x".to_string()));
    Ok(())
}

#[test]
fn test_import_id_above_sequence_fails() {
    let backend = memory_backend();
    let table = items();
    let err = table
        .import_json(&backend, r#"[5,{"id":7,"name":"y"}]"#.as_bytes())
        .unwrap_err();
    assert!(matches!(err, TabxError::SequenceOutOfRange { id: 7, max: 5 }));
    assert_eq!(err.class(), ErrorClass::Validation);
    assert!(err.to_string().contains("invalid ID 7"));

    // The sequence element was committed before the failing record
    assert_eq!(table.last_sequence(&backend).unwrap(), 5);
    assert!(!table.has(&backend, 7).unwrap());
}

#[test]
fn test_import_without_sequence_needs_zero_ids() -> TabxResult<()> {
    let backend = memory_backend();
    let table = items();
    table.import_json(&backend, r#"[{"id":0,"name":"a"},{"id":0,"name":"b"}]"#.as_bytes())?;
    assert_eq!(table.last_sequence(&backend)?, 2);
    assert_eq!(table.list(&backend)?.len(), 2);

    let err = table
        .import_json(&backend, r#"[{"id":1,"name":"c"}]"#.as_bytes())
        .unwrap_err();
    assert!(matches!(err, TabxError::SequenceOutOfRange { id: 1, max: 0 }));
    Ok(())
}

#[test]
fn test_import_mints_ids_after_declared_sequence() -> TabxResult<()> {
    let backend = memory_backend();
    let table = items();
    table.import_json(&backend, r#"[2,{"id":1,"name":"a"},{"id":0,"name":"new"}]"#.as_bytes())?;
    assert_eq!(table.get(&backend, 3)?.map(|i| i.name), Some("new".to_string()));
    assert_eq!(table.last_sequence(&backend)?, 3);
    Ok(())
}

#[test]
fn test_import_is_per_element() {
    let backend = memory_backend();
    let table = items();
    let err = table
        .import_json(
            &backend,
            r#"[3,{"id":1,"name":"a"},{"id":2,"name":17},{"id":3,"name":"c"}]"#.as_bytes(),
        )
        .unwrap_err();
    assert!(matches!(err, TabxError::JsonImport(_)));
    // Earlier elements stay committed, later ones never ran
    assert!(table.has(&backend, 1).unwrap());
    assert!(!table.has(&backend, 3).unwrap());
    assert_eq!(backend.open_writers(), 0);
}

#[test]
fn test_import_duplicate_id_fails() {
    let backend = memory_backend();
    let table = items();
    table
        .import_json(&backend, r#"[1,{"id":1,"name":"a"}]"#.as_bytes())
        .unwrap();
    let err = table
        .import_json(&backend, r#"[1,{"id":1,"name":"again"}]"#.as_bytes())
        .unwrap_err();
    assert!(matches!(err, TabxError::AlreadyExists { .. }));
}

#[test]
fn test_import_sequence_write_failure_is_returned() {
    let backend = FlakyBackend::new();
    let table = items();
    backend.fail_commits(true);
    let err = table
        .import_json(&backend, r#"[4,{"id":1,"name":"a"}]"#.as_bytes())
        .unwrap_err();
    assert!(matches!(err, TabxError::Storage(_)));
    assert_eq!(backend.inner.open_writers(), 0);
    assert!(backend.inner.index().is_empty());
}

#[test]
fn test_malformed_streams() {
    let backend = memory_backend();
    let table = items();
    for input in [
        "",
        "{}",
        "[1,",
        "[1, 2]",
        "[-3]",
        "[1.5]",
        r#"[{"id": 1}]"#,
        "[] trailing",
    ] {
        let err = table.import_json(&backend, input.as_bytes()).unwrap_err();
        assert!(
            matches!(err, TabxError::JsonImport(_)),
            "{input:?} gave {err:?}"
        );
        assert!(table.validate_json(input.as_bytes()).is_err());
    }
}

#[test]
fn test_validate_matches_execute_and_does_not_mutate() {
    let backend = memory_backend();
    let table = items();
    table.insert(&backend, &mut Item::new("existing")).unwrap();
    let before = snapshot(&backend);

    let good = r#"[5,{"id":3,"name":"x"},{"id":0,"name":"y"}]"#;
    let bad = r#"[5,{"id":3,"name":"x"},{"id":7,"name":"y"}]"#;

    table.validate_json(good.as_bytes()).unwrap();
    let err = table.validate_json(bad.as_bytes()).unwrap_err();
    assert!(matches!(err, TabxError::SequenceOutOfRange { id: 7, max: 5 }));
    assert_eq!(snapshot(&backend), before);

    table.import_json(&memory_backend(), good.as_bytes()).unwrap();
    assert!(table.import_json(&memory_backend(), bad.as_bytes()).is_err());
}

#[test]
fn test_custom_validator() {
    let backend = memory_backend();
    let table = items().with_json_validator(|item: &Item| {
        if item.name.is_empty() {
            return Err(TabxError::JsonValidation("name must be set".to_string()));
        }
        Ok(())
    });
    let input = r#"[{"id":0,"name":"ok"},{"id":0,"name":""}]"#;
    assert!(matches!(
        table.validate_json(input.as_bytes()),
        Err(TabxError::JsonValidation(_))
    ));
    assert!(matches!(
        table.import_json(&backend, input.as_bytes()),
        Err(TabxError::JsonValidation(_))
    ));
    assert_eq!(table.last_sequence(&backend).unwrap(), 1);
}

#[test]
fn test_plain_table_json() -> TabxResult<()> {
    let backend = memory_backend();
    let table = Table::<Balance>::new()?;
    table.insert(&backend, &Balance::new("bob", "atom", 2))?;
    table.insert(&backend, &Balance::new("alice", "atom", 1))?;

    let dump = export(|out| table.export_json(&backend, out));
    assert_eq!(
        dump,
        json!([
            {"owner": "alice", "denom": "atom", "amount": 1},
            {"owner": "bob", "denom": "atom", "amount": 2}
        ])
    );

    // Import upserts
    let update = r#"[{"owner":"alice","denom":"atom","amount":50},{"owner":"carol","denom":"osmo","amount":3}]"#;
    table.validate_json(update.as_bytes())?;
    table.import_json(&backend, update.as_bytes())?;
    assert_eq!(
        table
            .get(&backend, &[KeyPart::from("alice"), KeyPart::from("atom")])?
            .map(|b| b.amount),
        Some(50)
    );
    assert_eq!(table.list(&backend, &[])?.len(), 3);

    // A leading sequence number means nothing to a plain table
    assert!(matches!(
        table.validate_json(r#"[1]"#.as_bytes()),
        Err(TabxError::JsonImport(_))
    ));
    Ok(())
}

#[test]
fn test_bytes_fields_use_base64() -> TabxResult<()> {
    let backend = memory_backend();
    let table = Table::<Blob>::new()?;
    table.insert(&backend, &Blob { hash: vec![0xde, 0xad, 0x00], size: 3 })?;

    let dump = export(|out| table.export_json(&backend, out));
    assert_eq!(dump, json!([{"hash": "3q0A", "size": 3}]));

    let target = memory_backend();
    table.import_json(&target, serde_json::to_vec(&dump).unwrap().as_slice())?;
    assert_eq!(snapshot(&target), snapshot(&backend));
    Ok(())
}

#[test]
fn test_export_pages_through_large_tables() -> TabxResult<()> {
    let backend = memory_backend();
    let options = TableOptions::default().with_export_page_size(3);
    let table = AutoIncrementTable::<Item>::with_options(options)?;
    for i in 0..10 {
        table.insert(&backend, &mut Item::new(&format!("n{i}")))?;
    }
    let dump = export(|out| table.export_json(&backend, out));
    let array = dump.as_array().unwrap();
    assert_eq!(array.len(), 11);
    assert_eq!(array[0], json!(10));
    let ids: Vec<u64> = array[1..].iter().map(|v| v["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_pretty_export_still_parses() -> TabxResult<()> {
    let backend = memory_backend();
    let table =
        AutoIncrementTable::<Item>::with_options(TableOptions::default().with_json_pretty(true))?;
    table.insert(&backend, &mut Item::new("a"))?;
    let mut out = Vec::new();
    table.export_json(&backend, &mut out)?;
    assert!(String::from_utf8_lossy(&out).contains("\n  \"id\": 1"));
    let value: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value, json!([1, {"id": 1, "name": "a"}]));
    Ok(())
}
