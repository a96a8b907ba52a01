mod common;

use common::fixture;
use ormap::prelude::*;

#[test]
fn test_find_one_by_key_caches_result() {
    let f = fixture();
    let events = f.events();
    let first = events.find_one_by_key("slug", "rustconf").unwrap();
    assert_eq!(first.id(), Some(1));

    f.store.reset_stats();
    let second = events.find_one_by_key("slug", "rustconf").unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(f.store.stats().selects, 0);
}

#[test]
fn test_loading_populates_key_cache() {
    let f = fixture();
    let events = f.events();
    let event = events.find(2).unwrap();
    event.get("title").unwrap();

    f.store.reset_stats();
    let found = events.find_one_by_key("slug", "eurorust").unwrap();
    assert!(found.ptr_eq(&event));
    assert_eq!(f.store.stats().selects, 0);
}

#[test]
fn test_find_one_by_key_validation() {
    let f = fixture();
    let events = f.events();
    assert!(matches!(
        events.find_one_by_key("", "x"),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        events.find_one_by_key("title", "RustConf"),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        events.find_one_by_key("slug", ""),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_find_one_by_key_without_match_is_not_found() {
    let f = fixture();
    assert!(f
        .events()
        .find_one_by_key("slug", "nothing")
        .unwrap_err()
        .is_not_found());
    assert!(f
        .events()
        .find_one_by_key("slug", "gone")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_compound_key_hit_needs_no_fetch() {
    let f = fixture();
    let events = f.events();
    let key = [("title", Value::from("RustConf")), ("pid", Value::from(5))];
    let first = events.find_one_by_compound_key(key.clone()).unwrap();
    assert_eq!(first.id(), Some(1));

    f.store.reset_stats();
    let second = events.find_one_by_compound_key(key).unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(f.store.stats().selects, 0);
}

#[test]
fn test_partial_compound_key_is_never_cached() {
    let f = fixture();
    let events = f.events();
    let no_page = events.find(6).unwrap();
    no_page.get("title").unwrap();

    f.store.reset_stats();
    let err = events
        .find_one_by_compound_key([("title", Value::from("NoPage")), ("pid", Value::from(0))])
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(f.store.stats().selects, 1);
}

#[test]
fn test_compound_key_validation() {
    let f = fixture();
    let events = f.events();
    assert!(matches!(
        events.find_one_by_compound_key(Vec::<(&str, Value)>::new()),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        events.find_one_by_compound_key([("title", "RustConf")]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        events.find_one_by_compound_key([("title", "RustConf"), ("slug", "rustconf")]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        events.find_one_by_compound_key([("title", "RustConf"), ("pid", "")]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        f.places().find_one_by_compound_key([("title", "Berlin")]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_find_all_uses_table_default_order() {
    let f = fixture();
    let all = f.events().find_all(None).unwrap();
    assert_eq!(all.ids(), vec![2, 4, 5, 6, 1]);

    let by_slug = f.events().find_all(Some("slug DESC, title")).unwrap();
    assert_eq!(by_slug.ids(), vec![1, 6, 4, 2, 5]);
}

#[test]
fn test_find_all_rejects_malformed_sort() {
    let f = fixture();
    assert!(matches!(
        f.events().find_all(Some("title; DROP TABLE events")),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_find_by_page_uid() {
    let f = fixture();
    let events = f.events();
    assert_eq!(events.find_by_page_uid(&[5], None).unwrap().ids(), vec![2, 1]);
    assert_eq!(
        events.find_by_page_uid(&[5], Some("title DESC")).unwrap().ids(),
        vec![1, 2]
    );
    assert_eq!(events.find_by_page_uid(&[5, 6], None).unwrap().len(), 4);
    assert_eq!(events.find_by_page_uid(&[0], None).unwrap().len(), 5);
    assert_eq!(events.find_by_page_uid(&[], None).unwrap().len(), 5);
}

#[test]
fn test_count_by_page_uid_skips_deleted_rows() {
    let f = fixture();
    let events = f.events();
    assert_eq!(events.count_by_page_uid(&[6]).unwrap(), 2);
    assert_eq!(events.count_by_page_uid(&[]).unwrap(), 5);
}

#[test]
fn test_find_all_by_relation_honours_ignore_list() {
    let f = fixture();
    let event = f.events().find(1).unwrap();
    let sessions = f.sessions();

    let all = sessions.find_all_by_relation(&event, "event", None).unwrap();
    assert_eq!(all.len(), 2);

    let ignore = Collection::from_models([sessions.find(2).unwrap()]);
    let rest = sessions
        .find_all_by_relation(&event, "event", Some(&ignore))
        .unwrap();
    assert_eq!(rest.ids(), vec![1]);
}

#[test]
fn test_find_all_by_relation_validation() {
    let f = fixture();
    let sessions = f.sessions();
    assert!(matches!(
        sessions.find_all_by_relation(&Model::new(), "event", None),
        Err(Error::InvalidArgument(_))
    ));
    let event = f.events().find(1).unwrap();
    assert!(matches!(
        sessions.find_all_by_relation(&event, "", None),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_find_by_filter() {
    let f = fixture();
    let found = f
        .speakers()
        .find_by_filter(Filter::new().eq("name", "Ada"), &OrderBy::none())
        .unwrap();
    assert_eq!(found.ids(), vec![1]);
}
