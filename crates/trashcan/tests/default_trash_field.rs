//! The process-wide fallback trash field.
//!
//! Kept in its own test binary: the default is global state.

use trashcan::defaults::{clear_default_trash_field, default_trash_field, set_default_trash_field};
use trashcan::{Column, SqlType, SupportsTrash, Table, TableSchema, TrashConfig};

fn users() -> TableSchema {
    TableSchema::new("users")
        .column(Column::new("id", SqlType::Integer))
        .column(Column::new("name", SqlType::Text))
}

#[test]
fn fallback_field_applies_after_configuration_and_schema() {
    set_default_trash_field("trashed");
    assert_eq!(default_trash_field().as_deref(), Some("trashed"));

    let users = Table::new("Users", users())
        .with_trash(TrashConfig::new())
        .unwrap();
    assert_eq!(users.trash_field(true).unwrap(), "Users.trashed");

    let configured = Table::new("Users", self::users())
        .with_trash(TrashConfig::new().field("removed"))
        .unwrap();
    assert_eq!(configured.trash_field(false).unwrap(), "removed");

    let detected = Table::new(
        "Comments",
        TableSchema::new("comments").column(Column::new("deleted", SqlType::DateTime)),
    )
    .with_trash(TrashConfig::new())
    .unwrap();
    assert_eq!(detected.trash_field(false).unwrap(), "deleted");

    set_default_trash_field("");
    assert_eq!(default_trash_field(), None);
    clear_default_trash_field();
    assert_eq!(default_trash_field(), None);

    // resolved fields are cached per behavior
    assert_eq!(users.trash_field(true).unwrap(), "Users.trashed");
}
