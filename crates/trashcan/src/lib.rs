//! Soft delete for table-oriented ORMs.
//!
//! `trashcan` is the table layer plus the trash behavior. Attach a
//! [`TrashBehavior`] to a [`Table`] and deletes on that table set a timestamp
//! instead of removing the row, reads exclude trashed rows by default, and
//! trash/restore operations cascade along dependent associations.
//!
//! # Architecture
//!
//! - [`Session`]: table registry over a [`RecordStore`]; runs the find, save
//!   and delete pipelines and dispatches table events
//! - [`Table`]: alias, schema, associations, rules, listeners, optional trash behavior
//! - [`behavior`]: field resolution, query filter, trash marker, cascade walker
//! - [`events`]: typed event names and the listener registry
//!
//! All operations are async, take a `Cx` and return an `Outcome`, like the
//! store calls they are built on.
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new(store);
//! session.add_table(
//!     Table::new("Articles", articles_schema)
//!         .association(
//!             Association::has_many("Articles", "Comments", ["article_id"])
//!                 .dependent(true)
//!                 .cascade_callbacks(true),
//!         )
//!         .with_trash(TrashConfig::new())?,
//! );
//!
//! // Trashes the article and its comments.
//! let mut article = session.get(&cx, "Articles", &[1.into()]).await?;
//! session.delete(&cx, "Articles", &mut article, &OperationOptions::default()).await?;
//!
//! // Trashed rows are only visible through the trash finders.
//! let trashed = session.find(&cx, Select::new("Articles").find(Finder::OnlyTrashed)).await?;
//! ```

pub mod behavior;
pub mod defaults;
pub mod events;
pub mod session;
pub mod table;

pub use behavior::{
    CascadeWalk, EventBinding, EventsConfig, ResolvedBinding, TrashBehavior, TrashConfig,
};
pub use events::{
    DEFAULT_PRIORITY, Event, EventCallback, EventManager, Handler, ModelEvent, Subject,
    TrashHandler,
};
pub use session::Session;
pub use table::{SupportsTrash, Table};

pub use trashcan_core::{
    Association, AssociationKind, Clock, Column, Cx, Error, FixedClock, JoinTable,
    OperationOptions, Outcome, Record, Result, Rule, SaveStrategy, SqlType, SystemClock,
    TableSchema, Value,
};
pub use trashcan_query::{Expr, Finder, OrderBy, RecordStore, Select};
