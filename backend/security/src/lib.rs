pub mod authorizer;
pub mod keygen;
pub mod keystore;

pub use authorizer::{Authorization, Authorizer, KeyLookup};
pub use keygen::{KEY_BYTES, generate_key};
pub use keystore::{ApiKeyRecord, KeyStore, KeyStoreError};
