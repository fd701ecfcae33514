use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Replacement text for secrets which are not exported.
pub const REMOVED_SECRET: &str = "removed";

/// Filesystem wide settings, stored as `Setting` in a dump.
///
/// Settings unknown to this version are kept in `extra` and written back
/// unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Format {
    pub name: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    pub storage: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub storage_class: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_token: String,
    pub block_size: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub compression: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub shards: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub hash_prefix: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub capacity: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub inodes: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub encrypt_key: String,
    pub trash_days: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub meta_version: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub min_client_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub max_client_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Format {
    /// Replace all configured secrets by a placeholder.
    pub fn remove_secret(&mut self) {
        for secret in [
            &mut self.secret_key,
            &mut self.session_token,
            &mut self.encrypt_key,
        ] {
            if !secret.is_empty() {
                *secret = REMOVED_SECRET.to_string();
            }
        }
    }
}
