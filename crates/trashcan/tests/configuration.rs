//! Trash field resolution and event wiring on registered tables.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use asupersync::runtime::RuntimeBuilder;
use common::{NOW, articles_schema, session_over, store, stored_trash, unwrap_outcome};
use trashcan::{
    Cx, Error, EventBinding, EventsConfig, Finder, ModelEvent, OperationOptions, Select,
    SupportsTrash, Table, TrashConfig, TrashHandler, Value,
};

#[test]
fn field_resolution() {
    let users = common::users_schema();

    let configured = Table::new("Users", users.clone())
        .with_trash(TrashConfig::new().field("deleted"))
        .unwrap();
    assert_eq!(configured.trash_field(true).unwrap(), "Users.deleted");
    assert_eq!(configured.trash_field(false).unwrap(), "deleted");

    let detected = Table::new("Articles", articles_schema())
        .with_trash(TrashConfig::new().field(""))
        .unwrap();
    assert_eq!(detected.trash_field(true).unwrap(), "Articles.trashed");
    assert_eq!(
        detected.trash_behavior().and_then(|b| b.resolved_field()),
        Some("trashed")
    );

    let unresolved = Table::new("Users", users)
        .with_trash(TrashConfig::new())
        .unwrap();
    assert!(matches!(
        unresolved.trash_field(true),
        Err(Error::MissingFieldConfig { table }) if table == "Users"
    ));
}

#[test]
fn implemented_events() {
    let bindings = |config: TrashConfig| -> Vec<(ModelEvent, i32)> {
        Table::new("Articles", articles_schema())
            .with_trash(config)
            .unwrap()
            .trash_behavior()
            .unwrap()
            .implemented_events()
            .iter()
            .map(|b| (b.event, b.priority))
            .collect()
    };

    assert_eq!(
        bindings(TrashConfig::new()),
        [(ModelEvent::BeforeDelete, 10), (ModelEvent::BeforeFind, 10)]
    );
    assert_eq!(
        bindings(TrashConfig::new().priority(1)),
        [(ModelEvent::BeforeDelete, 1), (ModelEvent::BeforeFind, 1)]
    );
    assert_eq!(
        bindings(TrashConfig::new().events(EventsConfig::List(vec![
            EventBinding::parse("Model.beforeFind").unwrap(),
        ]))),
        [(ModelEvent::BeforeFind, 10)]
    );
    assert_eq!(
        bindings(TrashConfig::new().events(EventsConfig::List(vec![
            EventBinding::new(ModelEvent::BeforeDelete),
            EventBinding::new(ModelEvent::BeforeFind).priority(5),
        ]))),
        [(ModelEvent::BeforeDelete, 10), (ModelEvent::BeforeFind, 5)]
    );
    assert!(bindings(TrashConfig::new().events(EventsConfig::Disabled)).is_empty());

    let misbound = Table::new("Articles", articles_schema()).with_trash(
        TrashConfig::new().events(EventsConfig::List(vec![EventBinding::handler(
            ModelEvent::BeforeSave,
            TrashHandler::SoftDelete,
        )])),
    );
    assert!(matches!(misbound, Err(Error::InvalidEventConfig(_))));
    assert!(matches!(
        EventBinding::parse("Model.beforeTrash"),
        Err(Error::InvalidEventConfig(_))
    ));
}

#[test]
fn find_only_binding_deletes_physically() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let articles = Table::new("Articles", articles_schema())
        .with_trash(TrashConfig::new().events(EventsConfig::List(vec![EventBinding::new(
            ModelEvent::BeforeFind,
        )])))
        .unwrap();
    let (session, _) = session_over(store(), articles);

    rt.block_on(async {
        let mut article = unwrap_outcome(session.get(&cx, "Articles", &[Value::from(1)]).await);
        assert!(unwrap_outcome(
            session
                .delete(&cx, "Articles", &mut article, &OperationOptions::default())
                .await
        ));
        assert_eq!(session.store().rows("articles").unwrap().len(), 2);
    });
}

#[test]
fn disabled_events_still_allow_direct_trash() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let articles = Table::new("Articles", articles_schema())
        .with_trash(TrashConfig::new().events(EventsConfig::Disabled))
        .unwrap();
    let (session, _) = session_over(store(), articles);

    rt.block_on(async {
        assert_eq!(unwrap_outcome(session.count(&cx, Select::new("Articles")).await), 3);
        let only = unwrap_outcome(
            session
                .count(&cx, Select::new("Articles").find(Finder::OnlyTrashed))
                .await,
        );
        assert_eq!(only, 2);

        let mut article = unwrap_outcome(session.get(&cx, "Articles", &[Value::from(1)]).await);
        assert!(unwrap_outcome(
            session
                .trash(&cx, "Articles", &mut article, &OperationOptions::default())
                .await
        ));
        assert_eq!(
            stored_trash(session.store(), "articles", "id", 1),
            Value::Timestamp(NOW)
        );
    });
}

#[test]
fn callback_bindings_run_alongside_builtin_handlers() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let saves = Arc::new(AtomicUsize::new(0));
    let counter = saves.clone();
    let articles = Table::new("Articles", articles_schema())
        .with_trash(TrashConfig::new().events(EventsConfig::List(vec![
            EventBinding::new(ModelEvent::BeforeDelete),
            EventBinding::new(ModelEvent::BeforeFind),
            EventBinding::callback(ModelEvent::AfterSave, move |_event| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ])))
        .unwrap();
    let (session, _) = session_over(store(), articles);

    rt.block_on(async {
        let mut article = unwrap_outcome(session.get(&cx, "Articles", &[Value::from(1)]).await);
        assert!(unwrap_outcome(
            session
                .delete(&cx, "Articles", &mut article, &OperationOptions::default())
                .await
        ));
    });
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[test]
fn earlier_listener_can_veto_the_soft_delete() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let (mut session, _) = session_over(store(), common::articles_table());
    session
        .table_mut("Articles")
        .unwrap()
        .on_with_priority(ModelEvent::BeforeDelete, 5, |event| {
            event.halt(false);
            Ok(())
        });

    rt.block_on(async {
        let mut article = unwrap_outcome(session.get(&cx, "Articles", &[Value::from(1)]).await);
        assert!(!unwrap_outcome(
            session
                .delete(&cx, "Articles", &mut article, &OperationOptions::default())
                .await
        ));
        let store = session.store();
        assert_eq!(store.rows("articles").unwrap().len(), 3);
        assert_eq!(stored_trash(store, "articles", "id", 1), Value::Null);
        assert_eq!(stored_trash(store, "comments", "id", 1), Value::Null);
    });
}
