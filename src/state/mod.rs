mod app_state;
pub mod credentials;

pub use app_state::{AppState, Resource, Selection, Session};
pub use credentials::{
    CredentialStore, FileStore, KeyValueStore, KeyringStore, StorageError, CREDENTIALS_FILE,
    KEY_TOKEN, KEY_USER, LEGACY_KEY_TOKEN,
};
