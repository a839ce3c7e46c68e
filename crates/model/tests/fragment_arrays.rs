//! Fragment collection integration tests.
//!
//! Uses the league/team/player and transaction/purchase/product fixtures:
//! a league holds an ordered array of team fragments, each team holds a
//! hasMany of players; a transaction holds purchase fragments that each
//! belong to a product.

use serde_json::{json, Value};
use tessera_model::{
    compare, ChangeSet, EntityRef, FragmentChange, ModelError, Schema, SerializeOptions, Store,
    StoreConfig,
};

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn schema() -> Value {
    json!({
        "id": "fixtures",
        "constructs": [
            { "kind": "Model", "id": "league", "attributes": [
                { "name": "name", "type": "string" },
                { "name": "teams", "kind": "fragmentArray", "model": "team" }
            ] },
            { "kind": "Fragment", "id": "team", "attributes": [
                { "name": "name", "type": "string" },
                { "name": "players", "kind": "hasMany", "model": "player", "async": true }
            ] },
            { "kind": "Model", "id": "player", "attributes": [
                { "name": "name", "type": "string" }
            ] },
            { "kind": "Model", "id": "transaction", "attributes": [
                { "name": "purchases", "kind": "fragmentArray", "model": "purchase" }
            ] },
            { "kind": "Fragment", "id": "purchase", "attributes": [
                { "name": "quantity", "type": "number" },
                { "name": "product", "kind": "belongsTo", "model": "product", "async": true }
            ] },
            { "kind": "Model", "id": "product", "attributes": [
                { "name": "name", "type": "string" },
                { "name": "price", "type": "number" }
            ] }
        ]
    })
}

fn store() -> Store {
    Store::new(Schema::from_json(&schema()).unwrap(), StoreConfig::default()).unwrap()
}

fn league_payload() -> Value {
    json!({
        "id": 1,
        "name": "Big League",
        "teams": [
            { "name": "A Team", "players": [1, 2] },
            { "name": "B Team", "players": [3] }
        ]
    })
}

fn transaction_payload() -> Value {
    json!({
        "id": 1,
        "purchases": [
            { "quantity": 2, "product": 1 },
            { "quantity": 1, "product": 2 }
        ]
    })
}

// ──────────────────────────────────────────────
// Loading and serialization
// ──────────────────────────────────────────────

#[test]
fn pushed_collection_is_clean_and_ordered() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();

    let teams = store.fragment_array(league, "teams").unwrap();
    assert_eq!(teams.len(), 2);
    let first = teams.object_at(0).unwrap();
    let second = teams.object_at(1).unwrap();

    assert_eq!(store.get(first, "name").unwrap(), json!("A Team"));
    assert_eq!(store.get(first, "players").unwrap(), json!(["1", "2"]));
    assert_eq!(store.get(second, "name").unwrap(), json!("B Team"));
    assert!(!store.is_dirty(league).unwrap());
    assert!(!store.is_dirty(first).unwrap());
    assert_eq!(store.state_path(league).unwrap(), "root.loaded.saved");

    let (owner, name) = store.owner_of(first).unwrap().unwrap();
    assert_eq!(owner, EntityRef::from(league));
    assert_eq!(name, "teams");
}

#[test]
fn serializes_nested_fragments_in_order() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let out = store
        .serialize(league, SerializeOptions { include_id: true })
        .unwrap();
    assert_eq!(
        out,
        json!({
            "id": "1",
            "name": "Big League",
            "teams": [
                { "name": "A Team", "players": ["1", "2"] },
                { "name": "B Team", "players": ["3"] }
            ]
        })
    );
}

#[test]
fn null_collection_serializes_as_null() {
    let mut store = store();
    let league = store
        .push("league", &json!({ "id": 3, "name": "Empty League", "teams": null }))
        .unwrap();
    assert!(store.fragment_array(league, "teams").unwrap().is_null());
    let out = store.serialize(league, SerializeOptions::default()).unwrap();
    assert_eq!(out["teams"], Value::Null);

    let transaction = store
        .push("transaction", &json!({ "id": 2, "purchases": null }))
        .unwrap();
    let out = store.serialize(transaction, SerializeOptions::default()).unwrap();
    assert_eq!(out, json!({ "purchases": null }));
}

#[test]
fn omitted_collection_is_null() {
    let mut store = store();
    let league = store.push("league", &json!({ "id": 4 })).unwrap();
    let out = store.serialize(league, SerializeOptions::default()).unwrap();
    assert_eq!(out, json!({ "name": null, "teams": null }));
}

#[test]
fn non_array_collection_payload_is_rejected() {
    let mut store = store();
    match store.push("league", &json!({ "id": 5, "teams": { "name": "A Team" } })) {
        Err(ModelError::InvalidPayload { model, message }) => {
            assert_eq!(model, "league");
            assert!(message.contains("teams"));
        }
        other => panic!("expected InvalidPayload, got {:?}", other),
    }
}

// ──────────────────────────────────────────────
// Dirty tracking and rollback
// ──────────────────────────────────────────────

#[test]
fn member_write_dirties_owner_and_rollback_restores() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let first = store.fragment_array(league, "teams").unwrap().object_at(0).unwrap();

    store.set(first, "name", json!("Z Team")).unwrap();
    assert!(store.is_dirty(first).unwrap());
    assert!(store.is_dirty(league).unwrap());
    assert_eq!(store.state_path(league).unwrap(), "root.loaded.updated.uncommitted");

    store.rollback(league).unwrap();
    assert_eq!(store.get(first, "name").unwrap(), json!("A Team"));
    assert!(!store.is_dirty(first).unwrap());
    assert!(!store.is_dirty(league).unwrap());
}

#[test]
fn writing_back_original_value_cleans_owner() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let first = store.fragment_array(league, "teams").unwrap().object_at(0).unwrap();

    store.set(first, "name", json!("Z Team")).unwrap();
    assert!(store.is_dirty(league).unwrap());
    store.set(first, "name", json!("A Team")).unwrap();
    assert!(!store.is_dirty(first).unwrap());
    assert!(!store.is_dirty(league).unwrap());
}

#[test]
fn owner_stays_dirty_while_another_member_is_dirty() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let teams = store.fragment_array(league, "teams").unwrap();
    let (first, second) = (teams.object_at(0).unwrap(), teams.object_at(1).unwrap());

    store.set(first, "name", json!("Z Team")).unwrap();
    store.set(second, "name", json!("Y Team")).unwrap();
    store.rollback(first).unwrap();

    assert!(!store.is_dirty(first).unwrap());
    assert!(store.is_dirty(league).unwrap());

    store.rollback(second).unwrap();
    assert!(!store.is_dirty(league).unwrap());
}

#[test]
fn rollback_is_idempotent() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let first = store.fragment_array(league, "teams").unwrap().object_at(0).unwrap();
    store.set(first, "name", json!("Z Team")).unwrap();
    store.set(league, "name", json!("Small League")).unwrap();

    store.rollback(league).unwrap();
    let once = store.serialize(league, SerializeOptions::default()).unwrap();
    let state_once = store.state_path(league).unwrap().to_string();

    store.rollback(league).unwrap();
    assert_eq!(store.serialize(league, SerializeOptions::default()).unwrap(), once);
    assert_eq!(store.state_path(league).unwrap(), state_once);
    assert!(!store.is_dirty(league).unwrap());
}

#[test]
fn rollback_fragments_keeps_own_attributes() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let first = store.fragment_array(league, "teams").unwrap().object_at(0).unwrap();
    store.set(first, "name", json!("Z Team")).unwrap();
    store.set(league, "name", json!("Small League")).unwrap();

    store.rollback_fragments(league).unwrap();
    assert_eq!(store.get(first, "name").unwrap(), json!("A Team"));
    assert_eq!(store.get(league, "name").unwrap(), json!("Small League"));
    assert!(store.is_dirty(league).unwrap());
}

// ──────────────────────────────────────────────
// Membership
// ──────────────────────────────────────────────

#[test]
fn created_fragment_is_appended() {
    let mut store = store();
    let transaction = store.push("transaction", &transaction_payload()).unwrap();
    let before = store.fragment_array(transaction, "purchases").unwrap().len();

    let purchase = store
        .create_fragment("purchase", &json!({ "quantity": 1, "product": null }))
        .unwrap();
    assert!(store.owner_of(purchase).unwrap().is_none());
    store.add_fragment(transaction, "purchases", purchase).unwrap();

    let purchases = store.fragment_array(transaction, "purchases").unwrap();
    assert_eq!(purchases.len(), before + 1);
    assert_eq!(purchases.index_of(purchase), Some(before));
    assert!(store.is_dirty(transaction).unwrap());
}

#[test]
fn add_then_remove_restores_length_and_cleanliness() {
    let mut store = store();
    let transaction = store.push("transaction", &transaction_payload()).unwrap();
    let before = store.fragment_array(transaction, "purchases").unwrap().len();

    let purchase = store
        .create_fragment("purchase", &json!({ "quantity": 1, "product": null }))
        .unwrap();
    store.add_fragment(transaction, "purchases", purchase).unwrap();
    assert!(store.remove_fragment(transaction, "purchases", purchase).unwrap());

    assert_eq!(store.fragment_array(transaction, "purchases").unwrap().len(), before);
    assert!(!store.is_dirty(transaction).unwrap());
    assert!(!store.remove_fragment(transaction, "purchases", purchase).unwrap());
}

#[test]
fn rollback_drops_added_and_restores_removed_members() {
    let mut store = store();
    let transaction = store.push("transaction", &transaction_payload()).unwrap();
    let original = store
        .fragment_array(transaction, "purchases")
        .unwrap()
        .members()
        .to_vec();

    let purchase = store
        .create_fragment("purchase", &json!({ "quantity": 5 }))
        .unwrap();
    store.insert_fragment(transaction, "purchases", 0, purchase).unwrap();
    store.remove_fragment(transaction, "purchases", original[1]).unwrap();

    store.rollback(transaction).unwrap();
    assert_eq!(
        store.fragment_array(transaction, "purchases").unwrap().members(),
        &original[..]
    );
    assert!(!store.is_dirty(transaction).unwrap());
}

#[test]
fn reorder_dirties_owner_until_moved_back() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();

    store.move_fragment(league, "teams", 0, 1).unwrap();
    assert!(store.is_dirty(league).unwrap());
    match store.changed_attributes(league).unwrap().fragments.get("teams") {
        Some(FragmentChange::Array { diff, .. }) => assert!(diff.reordered),
        other => panic!("expected Array change, got {:?}", other),
    }

    store.move_fragment(league, "teams", 1, 0).unwrap();
    assert!(!store.is_dirty(league).unwrap());
}

#[test]
fn assigning_empty_to_null_collection_is_a_change() {
    let mut store = store();
    let league = store
        .push("league", &json!({ "id": 3, "teams": null }))
        .unwrap();
    store.set_fragments(league, "teams", Some(Vec::new())).unwrap();
    assert!(store.is_dirty(league).unwrap());

    store.set_fragments(league, "teams", None).unwrap();
    assert!(!store.is_dirty(league).unwrap());
}

#[test]
fn adding_to_null_collection_starts_a_sequence() {
    let mut store = store();
    let transaction = store
        .push("transaction", &json!({ "id": 2, "purchases": null }))
        .unwrap();
    let purchase = store
        .create_fragment("purchase", &json!({ "quantity": 1 }))
        .unwrap();
    store.add_fragment(transaction, "purchases", purchase).unwrap();

    let out = store.serialize(transaction, SerializeOptions::default()).unwrap();
    assert_eq!(out, json!({ "purchases": [{ "quantity": 1, "product": null }] }));
}

// ──────────────────────────────────────────────
// Ownership
// ──────────────────────────────────────────────

#[test]
fn fragment_cannot_move_to_another_owner() {
    let mut store = store();
    let first = store.push("transaction", &transaction_payload()).unwrap();
    let second = store
        .push("transaction", &json!({ "id": 2, "purchases": [] }))
        .unwrap();
    let purchase = store.fragment_array(first, "purchases").unwrap().object_at(0).unwrap();

    match store.add_fragment(second, "purchases", purchase) {
        Err(ModelError::OwnershipViolation { fragment, owner, attempted, .. }) => {
            assert_eq!(fragment, purchase);
            assert_eq!(owner, EntityRef::from(first));
            assert_eq!(attempted, EntityRef::from(second));
        }
        other => panic!("expected OwnershipViolation, got {:?}", other),
    }
    assert!(store.fragment_array(second, "purchases").unwrap().is_empty());
    assert!(!store.is_dirty(second).unwrap());
}

#[test]
fn removed_fragment_keeps_its_owner() {
    let mut store = store();
    let first = store.push("transaction", &transaction_payload()).unwrap();
    let second = store
        .push("transaction", &json!({ "id": 2, "purchases": [] }))
        .unwrap();
    let purchase = store.fragment_array(first, "purchases").unwrap().object_at(0).unwrap();

    store.remove_fragment(first, "purchases", purchase).unwrap();
    assert!(store.add_fragment(second, "purchases", purchase).is_err());
    store.add_fragment(first, "purchases", purchase).unwrap();
    assert_eq!(
        store.fragment_array(first, "purchases").unwrap().index_of(purchase),
        Some(1)
    );
}

#[test]
fn wrong_model_and_duplicates_are_rejected() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let first = store.fragment_array(league, "teams").unwrap().object_at(0).unwrap();
    let purchase = store
        .create_fragment("purchase", &json!({ "quantity": 1 }))
        .unwrap();

    assert!(matches!(
        store.add_fragment(league, "teams", purchase),
        Err(ModelError::WrongModel { .. })
    ));
    assert!(matches!(
        store.add_fragment(league, "teams", first),
        Err(ModelError::DuplicateMember { .. })
    ));
    assert!(matches!(
        store.insert_fragment(league, "teams", 7, purchase),
        Err(ModelError::WrongModel { .. })
    ));
    assert!(!store.is_dirty(league).unwrap());
}

#[test]
fn set_fragments_validates_before_binding() {
    let mut store = store();
    let first = store.push("transaction", &transaction_payload()).unwrap();
    let second = store
        .push("transaction", &json!({ "id": 2, "purchases": [] }))
        .unwrap();
    let fresh = store
        .create_fragment("purchase", &json!({ "quantity": 3 }))
        .unwrap();
    let foreign = store.fragment_array(first, "purchases").unwrap().object_at(0).unwrap();

    assert!(store
        .set_fragments(second, "purchases", Some(vec![fresh, foreign]))
        .is_err());
    assert!(store.owner_of(fresh).unwrap().is_none());
    assert!(store.fragment_array(second, "purchases").unwrap().is_empty());
}

// ──────────────────────────────────────────────
// Identity, copies and change reports
// ──────────────────────────────────────────────

#[test]
fn equal_content_fragments_are_distinct() {
    let mut store = store();
    let a = store
        .create_fragment("purchase", &json!({ "quantity": 1, "product": 1 }))
        .unwrap();
    let b = store
        .create_fragment("purchase", &json!({ "quantity": 1, "product": 1 }))
        .unwrap();
    assert_ne!(compare(a, b), 0);
    assert_eq!(compare(a, a), 0);
    assert_eq!(
        store.serialize(a, SerializeOptions::default()).unwrap(),
        store.serialize(b, SerializeOptions::default()).unwrap()
    );
}

#[test]
fn copy_is_detached_with_current_values() {
    let mut store = store();
    let transaction = store.push("transaction", &transaction_payload()).unwrap();
    let purchase = store
        .fragment_array(transaction, "purchases")
        .unwrap()
        .object_at(0)
        .unwrap();
    store.set(purchase, "quantity", json!(9)).unwrap();

    let copy = store.copy(purchase).unwrap();
    assert_ne!(compare(purchase, copy), 0);
    assert!(store.owner_of(copy).unwrap().is_none());
    assert!(!store.is_dirty(copy).unwrap());
    assert_eq!(store.get(copy, "quantity").unwrap(), json!(9));
    assert_eq!(store.get(copy, "product").unwrap(), json!("1"));

    let other = store
        .push("transaction", &json!({ "id": 2, "purchases": [] }))
        .unwrap();
    store.add_fragment(other, "purchases", copy).unwrap();
    assert!(store.is_dirty(other).unwrap());
}

#[test]
fn changed_attributes_reports_both_sets() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let first = store.fragment_array(league, "teams").unwrap().object_at(0).unwrap();
    store.set(league, "name", json!("Small League")).unwrap();
    store.set(first, "name", json!("Z Team")).unwrap();

    let changes: ChangeSet = store.changed_attributes(league).unwrap();
    assert_eq!(changes.attributes["name"].before, json!("Big League"));
    assert_eq!(changes.attributes["name"].after, json!("Small League"));
    match &changes.fragments["teams"] {
        FragmentChange::Array { diff, dirty_members } => {
            assert!(diff.is_empty());
            assert_eq!(dirty_members, &vec![first]);
        }
        other => panic!("expected Array change, got {:?}", other),
    }

    store.rollback(league).unwrap();
    assert!(store.changed_attributes(league).unwrap().is_empty());
}

#[test]
fn repush_reuses_fragments_by_position() {
    let mut store = store();
    let league = store.push("league", &league_payload()).unwrap();
    let first = store.fragment_array(league, "teams").unwrap().object_at(0).unwrap();
    store.set(first, "name", json!("Z Team")).unwrap();

    let again = store
        .push(
            "league",
            &json!({
                "id": 1,
                "name": "Big League",
                "teams": [{ "name": "C Team" }, { "name": "B Team" }, { "name": "D Team" }]
            }),
        )
        .unwrap();
    assert_eq!(again, league);

    let teams = store.fragment_array(league, "teams").unwrap();
    assert_eq!(teams.len(), 3);
    assert_eq!(teams.object_at(0), Some(first));
    assert_eq!(store.get(first, "name").unwrap(), json!("C Team"));
    assert!(!store.is_dirty(first).unwrap());
    assert!(!store.is_dirty(league).unwrap());
}
