mod common;

use common::fixture;
use ormap::prelude::*;

#[test]
fn test_find_returns_same_handle() {
    let f = fixture();
    let events = f.events();
    let a = events.find(1).unwrap();
    let b = events.find(1).unwrap();
    assert!(a.ptr_eq(&b));
    assert!(a.is_ghost());
    assert_eq!(f.store.stats().selects, 0);
}

#[test]
fn test_find_rejects_non_positive_ids() {
    let f = fixture();
    assert!(matches!(f.events().find(0), Err(Error::InvalidArgument(_))));
    assert!(matches!(f.events().find(-3), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_ghost_loads_on_first_access() {
    let f = fixture();
    let events = f.events();
    f.store.reset_stats();
    let event = events.find(1).unwrap();
    assert!(event.is_ghost());
    assert_eq!(f.store.stats().selects, 0);

    assert_eq!(event.get_as_string("title").unwrap(), "RustConf");
    assert!(event.is_loaded());
    assert!(!event.is_dirty());

    let selects = f.store.stats().selects;
    assert_eq!(event.get_as_string("slug").unwrap(), "rustconf");
    assert_eq!(f.store.stats().selects, selects);
}

#[test]
fn test_missing_row_marks_model_dead() {
    let f = fixture();
    let model = f.events().find(99).unwrap();
    let err = model.get("title").unwrap_err();
    assert!(err.is_not_found());
    assert!(model.is_dead());
    assert!(model.get("title").unwrap_err().is_not_found());
}

#[test]
fn test_deleted_row_counts_as_missing() {
    let f = fixture();
    let gone = f.events().find(3).unwrap();
    assert!(gone.get("title").unwrap_err().is_not_found());
    assert!(gone.is_dead());
}

#[test]
fn test_get_model_first_write_wins() {
    let f = fixture();
    let places = f.places();
    let first = places
        .get_model(Row::new().with("uid", 10).with("title", "Lisbon"))
        .unwrap();
    let second = places
        .get_model(Row::new().with("uid", 10).with("title", "Porto"))
        .unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(second.get_as_string("title").unwrap(), "Lisbon");
}

#[test]
fn test_get_model_requires_uid() {
    let f = fixture();
    assert!(matches!(
        f.places().get_model(Row::new().with("title", "Nowhere")),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_get_list_of_models_keeps_order_and_identity() {
    let f = fixture();
    let places = f.places();
    let models = places
        .get_list_of_models(vec![
            Row::new().with("uid", 3).with("title", "c"),
            Row::new().with("uid", 1).with("title", "a"),
            Row::new().with("uid", 3).with("title", "again"),
        ])
        .unwrap();
    assert_eq!(models.ids(), vec![3, 1]);
    assert!(places.get_list_of_models(Vec::new()).unwrap().is_empty());
}

#[test]
fn test_reload_overwrites_local_changes() {
    let f = fixture();
    let event = f.events().find(2).unwrap();
    event.set("title", "Changed").unwrap();
    assert!(event.is_dirty());

    f.events().reload(&event).unwrap();
    assert_eq!(event.get_as_string("title").unwrap(), "EuroRust");
    assert!(!event.is_dirty());
}

#[test]
fn test_reload_of_vanished_row_marks_dead() {
    let f = fixture();
    let place = f.places().find(1).unwrap();
    assert_eq!(place.get_as_string("title").unwrap(), "Berlin");

    f.store
        .delete("places", &Filter::by_id(1))
        .unwrap();
    f.places().reload(&place).unwrap();
    assert!(place.is_dead());
}

#[test]
fn test_load_rejects_idless_models() {
    let f = fixture();
    assert!(matches!(
        f.places().load(&Model::new()),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_exists_model_respects_hidden_and_deleted() {
    let f = fixture();
    let events = f.events();
    assert!(events.exists_model(1, false).unwrap());
    assert!(!events.exists_model(3, false).unwrap());
    assert!(!events.exists_model(99, true).unwrap());
    assert!(!events.exists_model(4, false).unwrap());
    assert!(events.exists_model(4, true).unwrap());
}

#[test]
fn test_denied_storage_access_kills_loads_and_empties_finders() {
    let f = fixture();
    f.registry.deny_storage_access();
    let events = f.events();

    let event = events.find(1).unwrap();
    assert!(event.get("title").unwrap_err().is_not_found());
    assert!(event.is_dead());
    assert!(events.find_all(None).unwrap().is_empty());
    assert_eq!(events.count_by_page_uid(&[]).unwrap(), 0);
    assert_eq!(f.store.stats().selects, 0);
}

#[test]
fn test_read_only_mapper_hands_out_read_only_models() {
    let f = fixture();
    let tag = f.tags().find(1).unwrap();
    assert!(tag.is_read_only());
    assert_eq!(tag.get_as_string("title").unwrap(), "systems");
    assert!(matches!(
        tag.set("title", "other"),
        Err(Error::BadMethodCall(_))
    ));
}
