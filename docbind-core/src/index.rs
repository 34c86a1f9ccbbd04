//! Declarative index descriptions.
//!
//! Documents describe their indexes with [`IndexSpec`] values and the backend turns
//! them into native index definitions. Every index carries a name so that declaring
//! the same index twice is recognised by the store as the same index.
//!
//! # Example
//!
//! ```ignore
//! use docbind::index::IndexSpec;
//!
//! let indexes = vec![
//!     IndexSpec::unique("email"),
//!     IndexSpec::text("TextIndex")
//!         .field("lastName", 4)
//!         .field("firstName", 2)
//!         .field("email", 1),
//! ];
//! ```

/// Default name given to text indexes built from a document's searchable fields.
pub const DEFAULT_TEXT_INDEX: &str = "TextIndex";

/// The kind of index and the fields it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    /// Ascending single-field index.
    Field {
        field: String,
        unique: bool,
    },
    /// Full-text index across several fields, each with a relative weight.
    Text {
        fields: Vec<(String, i32)>,
    },
}

/// A named index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub kind: IndexKind,
}

impl IndexSpec {
    /// Ascending index on `field`, named `<field>_1`.
    pub fn ascending(field: impl Into<String>) -> Self {
        let field = field.into();

        Self {
            name: format!("{field}_1"),
            kind: IndexKind::Field { field, unique: false },
        }
    }

    /// Unique ascending index on `field`, named `<field>_1`.
    pub fn unique(field: impl Into<String>) -> Self {
        let field = field.into();

        Self {
            name: format!("{field}_1"),
            kind: IndexKind::Field { field, unique: true },
        }
    }

    /// Empty text index; add fields with [`IndexSpec::field`].
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Text { fields: Vec::new() },
        }
    }

    /// Text index over `fields`, every field weighted 1.
    pub fn text_over<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .fold(Self::text(name), |spec, field| spec.field(field, 1))
    }

    /// Adds a weighted field to a text index. Ignored for field indexes.
    pub fn field(mut self, field: impl Into<String>, weight: i32) -> Self {
        if let IndexKind::Text { fields } = &mut self.kind {
            fields.push((field.into(), weight));
        }
        self
    }

    /// Overrides the generated index name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, IndexKind::Text { .. })
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.kind, IndexKind::Field { unique: true, .. })
    }
}
