//! Core traits for documents and their two serialized forms.
//!
//! A document is any serde type implementing [`Document`]. The trait declares how the
//! type maps to its collection: the collection name, which fields are hidden from the
//! display form, which computed values are added to it, which fields are searchable and
//! which indexes the collection needs.
//!
//! [`DocumentExt`] is implemented for every document and provides:
//!
//! - the **storage form** ([`DocumentExt::to_storage_form`]): the complete BSON record,
//!   `_id` and hidden fields included, as written to the store;
//! - the **display form** ([`DocumentExt::to_display_form`]): a JSON object without the
//!   hidden fields, with the computed fields, for external consumption;
//! - hydration from a raw record ([`DocumentExt::from_storage_form`]);
//! - [`DocumentExt::save`].
//!
//! Nested sub-documents should be declared with [`lenient`] so that absent, null or
//! malformed nested data hydrates to an empty default instead of failing. Arrays of
//! sub-documents use [`lenient_items`], which drops only the malformed entries.
//!
//! # Example
//!
//! ```ignore
//! use docbind::document::{Document, lenient_items};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! pub struct Team {
//!     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//!     #[serde(default, deserialize_with = "lenient_items")]
//!     pub members: Vec<Member>,
//!     pub invite_code: String,
//! }
//!
//! impl Document for Team {
//!     fn id(&self) -> Option<&ObjectId> { self.id.as_ref() }
//!     fn set_id(&mut self, id: ObjectId) { self.id = Some(id) }
//!     fn collection_name() -> &'static str { "teams" }
//!     fn excluded_fields() -> &'static [&'static str] { &["invite_code"] }
//! }
//! ```

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, oid::ObjectId, ser::serialize_to_bson};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Value, to_value};

use crate::{
    backend::StoreConnector,
    collection::CollectionFactory,
    error::{DocumentStoreError, DocumentStoreResult},
    index::{DEFAULT_TEXT_INDEX, IndexSpec},
};

/// Name of the identifier field in both serialized forms.
pub const ID_FIELD: &str = "_id";

/// Core trait that every persisted entity implements.
///
/// The id is `None` until the document is first saved; the store assigns it and it never
/// changes afterwards. Map it with
/// `#[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]`.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the store-assigned identifier, if the document was saved.
    fn id(&self) -> Option<&ObjectId>;

    /// Records the identifier assigned by the store on first insert.
    fn set_id(&mut self, id: ObjectId);

    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;

    /// Fields stripped from the display form (secrets and the like).
    fn excluded_fields() -> &'static [&'static str] {
        &[]
    }

    /// Names of values computed at display time.
    ///
    /// Each name is resolved through [`Document::computed_field`].
    fn computed_fields() -> &'static [&'static str] {
        &[]
    }

    /// Computes the value of a field listed in [`Document::computed_fields`].
    ///
    /// Returning `None` emits `null` for that field.
    fn computed_field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Fields eligible for text search.
    fn searchable_fields() -> &'static [&'static str] {
        &[]
    }

    /// Fields returned by searches besides `_id`.
    fn search_projection() -> &'static [&'static str] {
        &[]
    }

    /// Indexes declared by [`CollectionFactory::create_indexes`].
    ///
    /// Defaults to a text index over [`Document::searchable_fields`] with equal weights.
    fn indexes() -> Vec<IndexSpec> {
        match Self::searchable_fields() {
            [] => Vec::new(),
            fields => vec![IndexSpec::text_over(DEFAULT_TEXT_INDEX, fields.iter().copied())],
        }
    }
}

/// Serialization, hydration and persistence helpers, implemented for every [`Document`].
#[async_trait]
pub trait DocumentExt: Document {
    /// Converts this document to its storage form.
    ///
    /// The result holds every serialized field, including excluded ones, and `_id` once
    /// the document has been saved.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if the type does not serialize to a
    /// BSON document.
    fn to_storage_form(&self) -> DocumentStoreResult<BsonDocument>;

    /// Converts this document to its display form.
    ///
    /// The result is a JSON object without the excluded fields, with every computed
    /// field, and with `_id` as a hex string once the document has been saved.
    fn to_display_form(&self) -> DocumentStoreResult<Value>;

    /// Hydrates a document from a raw record.
    ///
    /// Nested fields declared with [`lenient`] never fail; other fields must match
    /// their declared types.
    fn from_storage_form(raw: BsonDocument) -> DocumentStoreResult<Self>;

    /// Returns `true` when this document was saved with the given id.
    fn has_same_id(&self, id: &ObjectId) -> bool;

    /// Saves this document through `factory`: insert on first save, replace by id after.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::Persistence`] when the store rejects the write,
    /// [`DocumentStoreError::NotInitialized`] when disconnected.
    async fn save<C>(&mut self, factory: &CollectionFactory<'_, C, Self>) -> DocumentStoreResult<()>
    where
        C: StoreConnector;
}

#[async_trait]
impl<D: Document> DocumentExt for D {
    fn to_storage_form(&self) -> DocumentStoreResult<BsonDocument> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentStoreError::Serialization(format!(
                "expected {} to serialize to a document, got {:?}",
                D::collection_name(),
                other.element_type()
            ))),
        }
    }

    fn to_display_form(&self) -> DocumentStoreResult<Value> {
        let mut fields = match to_value(self)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(DocumentStoreError::Serialization(format!(
                    "expected {} to serialize to an object",
                    D::collection_name()
                )));
            }
        };

        match self.id() {
            Some(id) => fields.insert(ID_FIELD.to_string(), Value::String(id.to_hex())),
            None => fields.remove(ID_FIELD),
        };

        for name in D::computed_fields() {
            fields.insert(
                name.to_string(),
                self.computed_field(name).unwrap_or(Value::Null),
            );
        }

        for name in D::excluded_fields() {
            fields.remove(*name);
        }

        Ok(Value::Object(fields))
    }

    fn from_storage_form(raw: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(raw))?)
    }

    fn has_same_id(&self, id: &ObjectId) -> bool {
        self.id() == Some(id)
    }

    async fn save<C>(&mut self, factory: &CollectionFactory<'_, C, Self>) -> DocumentStoreResult<()>
    where
        C: StoreConnector,
    {
        factory.save(self).await
    }
}

/// Deserializes a nested value, falling back to `T::default()` when it is null or malformed.
///
/// Combine with `#[serde(default)]` so a missing field also hydrates to the default:
///
/// ```ignore
/// #[serde(default, deserialize_with = "docbind::document::lenient")]
/// pub colors: Vec<Color>,
/// ```
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Bson::deserialize(deserializer)?;

    Ok(deserialize_from_bson(raw).unwrap_or_default())
}

/// Deserializes an array of nested values one element at a time.
///
/// Elements that do not match `T` are dropped and the rest are kept. Anything other
/// than an array (null included) hydrates to an empty vector.
///
/// ```ignore
/// #[serde(default, deserialize_with = "docbind::document::lenient_items")]
/// pub colors: Vec<Color>,
/// ```
pub fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Bson::deserialize(deserializer)? {
        Bson::Array(items) => Ok(
            items
                .into_iter()
                .filter_map(|item| deserialize_from_bson(item).ok())
                .collect()
        ),
        _ => Ok(Vec::new()),
    }
}
