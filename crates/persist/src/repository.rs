use realm_common::{AccountId, PlayerSnapshot};

/// Errors from character persistence.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("record for account {found:?} stored under {expected:?}")]
    AccountMismatch {
        expected: AccountId,
        found: AccountId,
    },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Load/save contract of the character database.
///
/// The character half (transform, velocity, health, movement mode) and the
/// ability half (hotbar) of a snapshot are saved by separate calls so each
/// can be retried on its own.
pub trait CharacterRepository {
    /// Stored snapshot for `account`, or `None` if the account has never been saved.
    fn load_snapshot(&mut self, account: AccountId) -> Result<Option<PlayerSnapshot>, PersistError>;

    fn save_character(&mut self, snapshot: &PlayerSnapshot) -> Result<(), PersistError>;

    fn save_ability_state(&mut self, snapshot: &PlayerSnapshot) -> Result<(), PersistError>;
}

impl<R: CharacterRepository + ?Sized> CharacterRepository for Box<R> {
    fn load_snapshot(&mut self, account: AccountId) -> Result<Option<PlayerSnapshot>, PersistError> {
        (**self).load_snapshot(account)
    }

    fn save_character(&mut self, snapshot: &PlayerSnapshot) -> Result<(), PersistError> {
        (**self).save_character(snapshot)
    }

    fn save_ability_state(&mut self, snapshot: &PlayerSnapshot) -> Result<(), PersistError> {
        (**self).save_ability_state(snapshot)
    }
}
