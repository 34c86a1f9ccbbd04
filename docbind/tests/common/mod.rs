#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use async_trait::async_trait;
use docbind::{
    bson::oid::ObjectId,
    memory::{InMemoryConnector, InMemoryStore},
    prelude::*,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub name: String,
    pub hex: String,
}

impl Color {
    pub fn new(name: &str, hex: &str) -> Self {
        Self { name: name.to_string(), hex: hex.to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    password: String,
    #[serde(default, deserialize_with = "lenient_items")]
    pub colors: Vec<Color>,
}

impl Document for User {
    fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }

    fn collection_name() -> &'static str {
        "users"
    }

    fn excluded_fields() -> &'static [&'static str] {
        &["password"]
    }

    fn computed_fields() -> &'static [&'static str] {
        &["fullName"]
    }

    fn computed_field(&self, name: &str) -> Option<Value> {
        match name {
            "fullName" => Some(Value::String(self.full_name())),
            _ => None,
        }
    }

    fn searchable_fields() -> &'static [&'static str] {
        &["firstName", "lastName", "email"]
    }

    fn search_projection() -> &'static [&'static str] {
        &["email"]
    }

    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::unique("email"),
            IndexSpec::text("TextIndex")
                .field("firstName", 2)
                .field("lastName", 4)
                .field("email", 1),
        ]
    }
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn password_hash(&self) -> &str {
        &self.password
    }

    /// Fills in a new user and saves it. A random password is used when none is given.
    #[allow(clippy::too_many_arguments)]
    pub async fn create<C: StoreConnector>(
        &mut self,
        first_name: &str,
        last_name: &str,
        email: &str,
        role: &str,
        password: Option<&str>,
        colors: Vec<Color>,
        users: &CollectionFactory<'_, C, User>,
    ) -> DocumentStoreResult<()> {
        self.first_name = first_name.to_string();
        self.last_name = last_name.to_string();
        self.email = email.to_string();
        self.role = role.to_string();

        let generated = uuid::Uuid::new_v4().to_string();
        self.password = hash_password(password.unwrap_or(&generated));
        self.colors.extend(colors);

        self.save(users).await
    }

    pub async fn reset_password<C: StoreConnector>(
        &mut self,
        new_password: &str,
        users: &CollectionFactory<'_, C, User>,
    ) -> DocumentStoreResult<()> {
        self.password = hash_password(new_password);
        self.save(users).await
    }

    pub fn compare_password(&self, password: &str) -> bool {
        PasswordHash::new(&self.password)
            .map(|hash| Argon2::default().verify_password(password.as_bytes(), &hash).is_ok())
            .unwrap_or(false)
    }
}

fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("argon2 hashing with default parameters")
        .to_string()
}

/// Wraps an in-memory connector and refuses the first `failures` attempts.
pub struct FlakyConnector {
    inner: InMemoryConnector,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyConnector {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryConnector::new(),
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for FlakyConnector {
    type Backend = InMemoryStore;

    async fn connect(&self, uri: &str, options: &TransportOptions) -> DocumentStoreResult<InMemoryStore> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if call <= self.failures {
            return Err(DocumentStoreError::Initialization(format!("server selection timeout #{call}")));
        }

        self.inner.connect(uri, options).await
    }
}

pub const URI: &str = "memory://test";

pub fn config(wait: u64, attempts: i64) -> ConnectionConfig {
    ConnectionConfig::builder(URI)
        .retry_wait_seconds(wait)
        .retry_max_attempts(attempts)
        .build()
}

pub async fn connected() -> ConnectionManager<InMemoryConnector> {
    let manager = ConnectionManager::new(InMemoryConnector::new());
    manager.connect(&config(0, 1)).await.unwrap();
    manager
}
