//! Association metadata between tables.
//!
//! An [`Association`] is a directed edge from an owner table to a target
//! table, identified by table aliases. The session uses it for eager loading,
//! nested saves and dependent deletes; the trash behavior walks the subset of
//! edges that [`Association::cascades_trash`] accepts.

use serde::{Deserialize, Serialize};

/// The kind of association between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationKind {
    /// Owner has at most one target row: `Users` has one `Profiles`.
    HasOne,
    /// Owner has many target rows: `Articles` has many `Comments`.
    HasMany,
    /// Owner row points at one target row: `Comments` belongs to `Articles`.
    BelongsTo,
    /// Many-to-many through a join table: `Users` and `Articles`.
    BelongsToMany,
}

/// How nested saves treat target rows no longer attached to the owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveStrategy {
    /// Only attached rows are saved; others are left alone.
    #[default]
    Append,
    /// Rows no longer attached are deleted (dependent) or unlinked.
    Replace,
}

/// Join table of a `BelongsToMany` association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    /// Alias of the join table
    pub table: String,
    /// Join-table columns referencing the owner's binding key
    pub foreign_key: Vec<String>,
    /// Join-table columns referencing the target's primary key
    pub target_foreign_key: Vec<String>,
}

impl JoinTable {
    pub fn new<I, J, S, T>(table: impl Into<String>, foreign_key: I, target_foreign_key: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            table: table.into(),
            foreign_key: foreign_key.into_iter().map(Into::into).collect(),
            target_foreign_key: target_foreign_key.into_iter().map(Into::into).collect(),
        }
    }
}

/// A directed association owner → target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Association name, used as the key of attached records
    pub name: String,
    pub kind: AssociationKind,
    /// Alias of the table declaring the association
    pub source: String,
    /// Alias of the associated table
    pub target: String,
    /// Foreign key fields: on the target for `HasOne`/`HasMany`, on the
    /// source for `BelongsTo`; unused for `BelongsToMany`.
    pub foreign_key: Vec<String>,
    /// Key fields the foreign key refers to. Empty means the primary key of
    /// the referenced table.
    pub binding_key: Vec<String>,
    pub dependent: bool,
    pub cascade_callbacks: bool,
    pub save_strategy: SaveStrategy,
    /// Sort applied when loading the association: `(field, ascending)`
    pub sort: Vec<(String, bool)>,
    pub through: Option<JoinTable>,
}

impl Association {
    fn with_kind<I, S>(
        kind: AssociationKind,
        source: impl Into<String>,
        target: impl Into<String>,
        foreign_key: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target = target.into();
        Self {
            name: target.clone(),
            kind,
            source: source.into(),
            target,
            foreign_key: foreign_key.into_iter().map(Into::into).collect(),
            binding_key: Vec::new(),
            dependent: false,
            cascade_callbacks: false,
            save_strategy: SaveStrategy::Append,
            sort: Vec::new(),
            through: None,
        }
    }

    pub fn has_one<I, S>(source: impl Into<String>, target: impl Into<String>, foreign_key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(AssociationKind::HasOne, source, target, foreign_key)
    }

    pub fn has_many<I, S>(source: impl Into<String>, target: impl Into<String>, foreign_key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(AssociationKind::HasMany, source, target, foreign_key)
    }

    pub fn belongs_to<I, S>(source: impl Into<String>, target: impl Into<String>, foreign_key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(AssociationKind::BelongsTo, source, target, foreign_key)
    }

    pub fn belongs_to_many(source: impl Into<String>, target: impl Into<String>, through: JoinTable) -> Self {
        let mut assoc = Self::with_kind(
            AssociationKind::BelongsToMany,
            source,
            target,
            Vec::<String>::new(),
        );
        assoc.through = Some(through);
        assoc
    }

    /// Override the association name (defaults to the target alias).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn binding_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binding_key = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn dependent(mut self, value: bool) -> Self {
        self.dependent = value;
        self
    }

    pub fn cascade_callbacks(mut self, value: bool) -> Self {
        self.cascade_callbacks = value;
        self
    }

    pub fn save_strategy(mut self, strategy: SaveStrategy) -> Self {
        self.save_strategy = strategy;
        self
    }

    pub fn sort(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort.push((field.into(), ascending));
        self
    }

    /// Whether `table` (an alias) is the owning side of this association.
    ///
    /// `HasOne`, `HasMany` and `BelongsToMany` are owned by their source;
    /// `BelongsTo` is owned by its target.
    pub fn is_owning_side(&self, table: &str) -> bool {
        match self.kind {
            AssociationKind::HasOne | AssociationKind::HasMany | AssociationKind::BelongsToMany => {
                self.source == table
            }
            AssociationKind::BelongsTo => self.target == table,
        }
    }

    /// Whether trash and restore operations propagate along this edge.
    ///
    /// Whether the target table supports trash is checked by the caller.
    pub fn cascades_trash(&self) -> bool {
        matches!(self.kind, AssociationKind::HasOne | AssociationKind::HasMany)
            && self.is_owning_side(&self.source)
            && self.dependent
            && self.cascade_callbacks
    }

    /// Whether one owner maps to a list of targets.
    pub fn is_collection(&self) -> bool {
        matches!(
            self.kind,
            AssociationKind::HasMany | AssociationKind::BelongsToMany
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owning_side_by_kind() {
        let has_many = Association::has_many("Articles", "Comments", ["article_id"]);
        assert!(has_many.is_owning_side("Articles"));
        assert!(!has_many.is_owning_side("Comments"));

        let belongs_to = Association::belongs_to("Comments", "Articles", ["article_id"]);
        assert!(belongs_to.is_owning_side("Articles"));
        assert!(!belongs_to.is_owning_side("Comments"));

        let btm = Association::belongs_to_many(
            "Users",
            "Articles",
            JoinTable::new("ArticlesUsers", ["user_id"], ["article_id"]),
        );
        assert!(btm.is_owning_side("Users"));
        assert!(btm.is_collection());
    }

    #[test]
    fn trash_cascade_requires_dependent_and_callbacks() {
        let base = Association::has_many("Articles", "Comments", ["article_id"]);
        assert!(!base.cascades_trash());
        assert!(!base.clone().dependent(true).cascades_trash());
        assert!(!base.clone().cascade_callbacks(true).cascades_trash());
        assert!(base.dependent(true).cascade_callbacks(true).cascades_trash());

        let belongs_to = Association::belongs_to("Comments", "Articles", ["article_id"])
            .dependent(true)
            .cascade_callbacks(true);
        assert!(!belongs_to.cascades_trash());
    }

    #[test]
    fn name_defaults_to_target() {
        let assoc = Association::has_one("Users", "Profiles", ["user_id"]);
        assert_eq!(assoc.name, "Profiles");
        assert_eq!(assoc.named("Profile").name, "Profile");
    }
}
