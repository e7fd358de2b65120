use lifetrack_core::model::clock::parse_timestamp;
use lifetrack_core::model::domain::Notification;
use lifetrack_core::{
    listener, open_store_in_memory, EventBus, EventName, GetAllOptions, Record, RecordKey, Store,
    StoreError, StoreName, DB_VERSION,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

fn setup() -> (Arc<Store>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    let store = open_store_in_memory(DB_VERSION, Arc::clone(&bus)).expect("in-memory store");
    (Arc::new(store), bus)
}

fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object literal")
}

fn capture(bus: &EventBus, event: EventName) -> Arc<Mutex<Vec<Vec<Value>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.on(
        event,
        listener(move |args| {
            sink.lock().unwrap().push(args.to_vec());
            Ok(())
        }),
    );
    seen
}

#[test]
fn add_then_get_returns_stamped_record() {
    let (store, _) = setup();

    let key = store
        .add(StoreName::Todo, record(json!({"title": "Buy milk"})))
        .unwrap();
    let id = key.as_int().expect("numeric id");

    let stored = store.get_by_id(StoreName::Todo, &key).unwrap().expect("stored");
    assert_eq!(stored.get("title"), Some(&json!("Buy milk")));
    assert_eq!(stored.get("id"), Some(&json!(id)));
    assert!(matches!(stored.get("completed"), None | Some(Value::Bool(false))));
    let created = stored.get("createdAt").and_then(Value::as_str).unwrap();
    let updated = stored.get("updatedAt").and_then(Value::as_str).unwrap();
    assert!(parse_timestamp(created).is_some());
    assert!(parse_timestamp(updated).unwrap() >= parse_timestamp(created).unwrap());
}

#[test]
fn generated_keys_are_unique_and_survive_clear() {
    let (store, _) = setup();
    let mut keys = HashSet::new();
    for index in 0..20 {
        let key = store
            .add(StoreName::Todo, record(json!({"title": format!("task {index}")})))
            .unwrap();
        assert!(keys.insert(key), "key reused");
    }

    store.clear(Some(StoreName::Todo)).unwrap();
    let after_clear = store
        .add(StoreName::Todo, record(json!({"title": "again"})))
        .unwrap();
    assert!(!keys.contains(&after_clear));
}

#[test]
fn concurrent_adds_never_share_a_key() {
    let (store, _) = setup();
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                (0..10)
                    .map(|index| {
                        store
                            .add(
                                StoreName::Meal,
                                record(json!({"type": "pantry", "name": format!("{worker}-{index}")})),
                            )
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut keys = HashSet::new();
    for handle in handles {
        for key in handle.join().unwrap() {
            assert!(keys.insert(key));
        }
    }
    assert_eq!(keys.len(), 40);
    assert_eq!(store.count(StoreName::Meal).unwrap(), 40);
}

#[test]
fn update_keeps_created_at_and_moves_updated_at_forward() {
    let (store, _) = setup();
    let key = store
        .add(StoreName::Todo, record(json!({"title": "Draft"})))
        .unwrap();
    let first = store.get_by_id(StoreName::Todo, &key).unwrap().unwrap();

    let mut changed = first.clone();
    changed.insert("title".into(), json!("Final"));
    changed.insert("createdAt".into(), json!("1999-01-01T00:00:00.000Z"));
    store.update(StoreName::Todo, changed).unwrap();
    let second = store.get_by_id(StoreName::Todo, &key).unwrap().unwrap();
    store.update(StoreName::Todo, second.clone()).unwrap();
    let third = store.get_by_id(StoreName::Todo, &key).unwrap().unwrap();

    let stamp = |record: &Record, field: &str| {
        parse_timestamp(record.get(field).and_then(Value::as_str).unwrap()).unwrap()
    };
    assert_eq!(second.get("title"), Some(&json!("Final")));
    assert_eq!(stamp(&second, "createdAt"), stamp(&first, "createdAt"));
    assert!(stamp(&second, "updatedAt") > stamp(&first, "updatedAt"));
    assert!(stamp(&third, "updatedAt") > stamp(&second, "updatedAt"));
}

#[test]
fn update_requires_an_existing_keyed_record() {
    let (store, _) = setup();

    let err = store
        .update(StoreName::Todo, record(json!({"title": "no key"})))
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingKey(StoreName::Todo)));

    let err = store
        .update(StoreName::Todo, record(json!({"id": 42, "title": "ghost"})))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::NotFound { store: StoreName::Todo, key: RecordKey::Int(42) }
    ));
    assert_eq!(store.count(StoreName::Todo).unwrap(), 0);
}

#[test]
fn upsert_creates_then_replaces() {
    let (store, _) = setup();
    let routine = json!({
        "id": "morning-walk",
        "name": "Walk",
        "category": "health",
        "frequency": "daily",
    });
    let key = store.upsert(StoreName::Routine, record(routine.clone())).unwrap();
    assert_eq!(key, RecordKey::from("morning-walk"));

    let mut replaced = record(routine);
    replaced.insert("name".into(), json!("Long walk"));
    store.upsert(StoreName::Routine, replaced).unwrap();

    assert_eq!(store.count(StoreName::Routine).unwrap(), 1);
    let stored = store.get_by_id(StoreName::Routine, &key).unwrap().unwrap();
    assert_eq!(stored.get("name"), Some(&json!("Long walk")));
}

#[test]
fn add_with_taken_key_is_a_duplicate() {
    let (store, _) = setup();
    let routine = record(json!({
        "id": "r-1",
        "name": "Stretch",
        "category": "health",
        "frequency": "daily",
    }));
    store.add(StoreName::Routine, routine.clone()).unwrap();
    let err = store.add(StoreName::Routine, routine).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { store: StoreName::Routine, .. }));
}

#[test]
fn validation_rejects_bad_records_before_writing() {
    let (store, _) = setup();
    let err = store
        .add(StoreName::Todo, record(json!({"completed": false})))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let err = store
        .add(
            StoreName::Prayer,
            record(json!({"date": "2024-02-30", "vakit": "ogle"})),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(store.count_all().unwrap(), 0);
}

#[test]
fn keys_must_match_the_store_key_type() {
    let (store, _) = setup();
    let err = store
        .add(StoreName::Todo, record(json!({"id": "t-1", "title": "x"})))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(err.to_string().contains("todo.id"));

    let err = store
        .upsert(StoreName::Settings, record(json!({"key": 5, "value": 1})))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(store.count_all().unwrap(), 0);

    let key = store
        .add(StoreName::Todo, record(json!({"id": 7, "title": "x"})))
        .unwrap();
    assert_eq!(key, RecordKey::Int(7));
}

#[test]
fn delete_removes_record_and_announces_it() {
    let (store, bus) = setup();
    let deleted = capture(&bus, EventName::DataDeleted);
    let key = store
        .add(StoreName::Todo, record(json!({"title": "Buy milk"})))
        .unwrap();

    assert!(store.delete(StoreName::Todo, &key).unwrap());
    assert_eq!(store.get_by_id(StoreName::Todo, &key).unwrap(), None);
    assert!(!store.delete(StoreName::Todo, &key).unwrap());

    let deleted = deleted.lock().unwrap();
    assert_eq!(deleted.len(), 2);
    assert_eq!(deleted[0], vec![json!("todo"), key.to_value()]);
}

#[test]
fn writes_announce_saved_records() {
    let (store, bus) = setup();
    let saved = capture(&bus, EventName::DataSaved);
    let key = store
        .add(StoreName::Todo, record(json!({"title": "Buy milk"})))
        .unwrap();

    let saved = saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0][0], json!("todo"));
    assert_eq!(saved[0][1].get("id"), Some(&key.to_value()));
}

#[test]
fn listeners_may_write_back_into_the_store() {
    let (store, bus) = setup();
    let writer = Arc::clone(&store);
    bus.once(
        EventName::DataSaved,
        listener(move |args| {
            if args.first() == Some(&json!("todo")) {
                writer
                    .add(
                        StoreName::Notification,
                        record(json!({
                            "module": "todo",
                            "title": "New task",
                            "scheduledTime": "2024-03-01T08:00:00.000Z",
                        })),
                    )
                    .map_err(|err| lifetrack_core::ListenerError::new(err.to_string()))?;
            }
            Ok(())
        }),
    );

    store
        .add(StoreName::Todo, record(json!({"title": "Buy milk"})))
        .unwrap();
    assert_eq!(store.count(StoreName::Notification).unwrap(), 1);
}

#[test]
fn search_uses_declared_indexes_only() {
    let (store, _) = setup();
    for (title, done) in [("a", false), ("b", true), ("c", false)] {
        store
            .add(StoreName::Todo, record(json!({"title": title, "completed": done})))
            .unwrap();
    }

    let open = store
        .search(StoreName::Todo, "completed", &json!(false))
        .unwrap();
    let titles: Vec<_> = open.iter().map(|todo| todo["title"].clone()).collect();
    assert_eq!(titles, vec![json!("a"), json!("c")]);

    let err = store
        .search(StoreName::Todo, "title", &json!("a"))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownIndex { .. }));
}

#[test]
fn get_all_applies_index_filter_sort_and_limit_in_order() {
    let (store, _) = setup();
    let todos = [
        ("water plants", Some(1), "home"),
        ("file taxes", Some(3), "home"),
        ("gym", None, "workout"),
        ("call mom", Some(2), "home"),
        ("buy bulbs", Some(0), "home"),
    ];
    for (title, priority, module) in todos {
        let mut todo = record(json!({"title": title, "module": module}));
        if let Some(priority) = priority {
            todo.insert("priority".into(), json!(priority));
        }
        store.add(StoreName::Todo, todo).unwrap();
    }

    let all = store.get_all(StoreName::Todo, &GetAllOptions::new()).unwrap();
    let keys: Vec<_> = all.iter().map(|todo| todo["id"].as_i64().unwrap()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let options = GetAllOptions::new()
        .index_value("module", "home")
        .filter(|todo| todo.get("priority").and_then(Value::as_i64).unwrap_or(0) > 0)
        .sort_by_field("priority", true)
        .limit(2);
    let top: Vec<_> = store
        .get_all(StoreName::Todo, &options)
        .unwrap()
        .into_iter()
        .map(|todo| todo["title"].clone())
        .collect();
    assert_eq!(top, vec![json!("file taxes"), json!("call mom")]);

    let prioritized = store
        .get_all(StoreName::Todo, &GetAllOptions::new().index("priority"))
        .unwrap();
    assert_eq!(prioritized.len(), 4);
    assert_eq!(prioritized[0]["title"], json!("buy bulbs"));
}

#[test]
fn clear_all_empties_every_store() {
    let (store, _) = setup();
    store
        .add(StoreName::Todo, record(json!({"title": "x"})))
        .unwrap();
    store
        .add(StoreName::Meal, record(json!({"type": "recipe", "name": "Soup"})))
        .unwrap();
    store.save_setting("theme", "dark").unwrap();

    assert_eq!(store.clear(None).unwrap(), 3);
    assert_eq!(store.count_all().unwrap(), 0);
}

#[test]
fn typed_notifications_round_trip() {
    let (store, _) = setup();
    let reminder = Notification {
        id: None,
        module: "routine".into(),
        title: "Stretch".into(),
        body: None,
        scheduled_time: "2024-03-01T07:30:00Z".into(),
        sent: false,
        created_at: None,
        updated_at: None,
    };

    let key = store.add_typed(&reminder).unwrap();
    let stored: Notification = store.get_typed(&key).unwrap().expect("stored");
    assert_eq!(stored.id, key.as_int());
    assert_eq!(stored.title, "Stretch");
    assert!(stored.created_at.is_some());
    let by_module = store
        .search(StoreName::Notification, "module", &json!("routine"))
        .unwrap();
    assert_eq!(by_module.len(), 1);
}
