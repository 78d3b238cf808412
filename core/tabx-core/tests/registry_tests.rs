//! Module table registry: routing, module JSON.

mod common;

use common::{Balance, Item, Person, memory_backend};
use serde_json::{Value, json};
use tabx_core::{AutoIncrementTable, ModuleTables, Table, TabxError, TabxResult};

fn module() -> ModuleTables {
    let mut tables = ModuleTables::new();
    tables
        .register(AutoIncrementTable::<Item>::new().unwrap())
        .unwrap();
    tables.register(Table::<Balance>::new().unwrap()).unwrap();
    tables
}

#[test]
fn test_routing() {
    let tables = module();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables.type_names(), vec!["test.Balance", "test.Item"]);
    assert_eq!(
        tables.get_table("test.Item").map(|t| t.table_id()),
        Some(1)
    );
    assert!(tables.get_table("test.Missing").is_none());

    assert!(tables.table::<Balance>().is_some());
    assert!(tables.auto_increment_table::<Item>().is_some());
    // Registered as auto-increment, so not a plain table
    assert!(tables.table::<Item>().is_none());
}

#[test]
fn test_duplicates_rejected() {
    let mut tables = module();
    assert!(matches!(
        tables.register(Table::<Balance>::new().unwrap()),
        Err(TabxError::Schema(_))
    ));
    // Fresh type name and table id
    tables
        .register(AutoIncrementTable::<Person>::new().unwrap())
        .unwrap();
    assert_eq!(tables.len(), 3);
}

#[test]
fn test_table_id_clash_rejected() {
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, tabx_core::Record)]
    #[tabx(type_name = "test.Shadow", table_id = 1)]
    #[tabx(primary_key(fields = "key"))]
    struct Shadow {
        key: String,
    }

    let mut tables = module();
    let err = tables.register(Table::<Shadow>::new().unwrap()).unwrap_err();
    assert!(err.to_string().contains("table id 1"));
}

#[test]
fn test_default_json() {
    let tables = module();
    let value: Value = serde_json::from_str(&tables.default_json()).unwrap();
    assert_eq!(value, json!({"test.Balance": [], "test.Item": []}));
}

#[test]
fn test_module_round_trip() -> TabxResult<()> {
    let source = memory_backend();
    let tables = module();
    let items = tables.auto_increment_table::<Item>().unwrap();
    items.insert(&source, &mut Item::new("a"))?;
    items.insert(&source, &mut Item::new("b"))?;
    tables
        .table::<Balance>()
        .unwrap()
        .insert(&source, &Balance::new("alice", "atom", 5))?;

    let mut out = Vec::new();
    tables.export_json(&source, &mut out)?;
    let value: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        value,
        json!({
            "test.Balance": [{"owner": "alice", "denom": "atom", "amount": 5}],
            "test.Item": [2, {"id": 1, "name": "a"}, {"id": 2, "name": "b"}]
        })
    );

    tables.validate_json(out.as_slice())?;
    let target = memory_backend();
    tables.import_json(&target, out.as_slice())?;
    assert_eq!(target.commitment().dump(), source.commitment().dump());
    assert_eq!(target.index().dump(), source.index().dump());
    Ok(())
}

#[test]
fn test_unknown_table_in_module_json() {
    let backend = memory_backend();
    let tables = module();
    let input = r#"{"test.Item": [{"id": 0, "name": "a"}], "test.Nope": []}"#;
    assert!(matches!(
        tables.validate_json(input.as_bytes()),
        Err(TabxError::TableNotFound(name)) if name == "test.Nope"
    ));
    assert!(matches!(
        tables.import_json(&backend, input.as_bytes()),
        Err(TabxError::TableNotFound(_))
    ));
    // Rejected before anything was imported
    assert!(backend.commitment().is_empty());
}

#[test]
fn test_module_validate_reports_table_errors() {
    let tables = module();
    let input = r#"{"test.Item": [1, {"id": 2, "name": "a"}]}"#;
    assert!(matches!(
        tables.validate_json(input.as_bytes()),
        Err(TabxError::SequenceOutOfRange { id: 2, max: 1 })
    ));
    assert!(matches!(
        tables.validate_json("[]".as_bytes()),
        Err(TabxError::JsonImport(_))
    ));
}
