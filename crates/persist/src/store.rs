//! File-backed character persistence.
//!
//! Layout inside the store directory:
//! ```text
//! store.meta.json                                        - metadata and schema version
//! characters/
//!   00000000000000000042.<digest16>.char.cbor.zst        - CBOR+zstd character records
//! abilities/
//!   00000000000000000042.<digest16>.abil.cbor.zst        - CBOR+zstd loadout records
//! integrity/
//!   manifest.json                                        - current file and sha256 per record
//! ```
//!
//! Every version of a record gets its own file name, derived from its digest.
//! A save writes the new file, then atomically replaces the manifest, then
//! deletes the superseded file. The manifest rename is the commit point: a
//! crash before it leaves the previous version live and an unreferenced file
//! that the next `open` sweeps away. A record whose digest does not match the
//! manifest fails to load.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::repository::{CharacterRepository, PersistError};
use realm_common::{AccountId, Health, Hotbar, MovementMode, PlayerSnapshot, Transform};

/// Current schema version of record files.
pub const CHARACTER_SCHEMA_VERSION: u32 = 1;

/// Metadata stored in store.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_version: u32,
    pub character_saves: u64,
    pub ability_saves: u64,
}

/// The live file of one record and its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the store root.
    pub file: String,
    pub sha256: String,
}

/// Live version of every record, keyed by record name (`characters/<account>`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl IntegrityManifest {
    fn references(&self, rel: &str) -> bool {
        self.entries.values().any(|e| e.file == rel)
    }
}

/// Which kind of record a file holds.
#[derive(Debug, Clone, Copy)]
enum RecordKind {
    Character,
    Ability,
}

impl RecordKind {
    fn dir(self) -> &'static str {
        match self {
            Self::Character => "characters",
            Self::Ability => "abilities",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Character => "char.cbor.zst",
            Self::Ability => "abil.cbor.zst",
        }
    }

    fn key(self, account: AccountId) -> String {
        format!("{}/{:020}", self.dir(), account.0)
    }

    fn file(self, account: AccountId, sha256: &str) -> String {
        let digest = sha256.get(..16).unwrap_or(sha256);
        format!("{}.{digest}.{}", self.key(account), self.suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CharacterRecord {
    schema_version: u32,
    account_id: AccountId,
    transform: Transform,
    velocity: Vec3,
    health_current: f32,
    health_max: f32,
    movement_mode: MovementMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AbilityRecord {
    schema_version: u32,
    account_id: AccountId,
    hotbar: Hotbar,
}

/// Character store on the local filesystem with schema versioning and
/// integrity checking.
pub struct FileCharacterStore {
    root: PathBuf,
    meta: StoreMeta,
    manifest: IntegrityManifest,
}

impl FileCharacterStore {
    /// Open or create a store at the given path, removing record files left
    /// behind by saves that never committed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let store = Self::open_inspect(path)?;
        let swept = store.sweep_unreferenced();
        if swept > 0 {
            tracing::info!(swept, "removed uncommitted record files");
        }
        Ok(store)
    }

    /// Open without sweeping, so a store another process is writing can be
    /// read safely.
    pub fn open_inspect(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("characters"))?;
        std::fs::create_dir_all(root.join("abilities"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join("store.meta.json");
        let manifest_path = root.join("integrity").join("manifest.json");

        let (meta, manifest) = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.schema_version != CHARACTER_SCHEMA_VERSION {
                return Err(PersistError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: CHARACTER_SCHEMA_VERSION,
                });
            }
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = StoreMeta {
                schema_version: CHARACTER_SCHEMA_VERSION,
                character_saves: 0,
                ability_saves: 0,
            };
            let manifest = IntegrityManifest::default();
            write_json_atomic(&meta_path, &meta)?;
            write_json_atomic(&manifest_path, &manifest)?;
            (meta, manifest)
        };

        tracing::debug!(root = %root.display(), records = manifest.entries.len(), "character store opened");
        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    /// Delete record files the manifest does not point at: versions written
    /// by a save that never committed, and stray temp files.
    fn sweep_unreferenced(&self) -> usize {
        let mut swept = 0;
        for kind in [RecordKind::Character, RecordKind::Ability] {
            let Ok(dir) = std::fs::read_dir(self.root.join(kind.dir())) else {
                continue;
            };
            for entry in dir.filter_map(|e| e.ok()) {
                let name = entry.file_name();
                let rel = format!("{}/{}", kind.dir(), name.to_string_lossy());
                if self.manifest.references(&rel) {
                    continue;
                }
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => swept += 1,
                    Err(e) => tracing::warn!(file = %rel, error = %e, "could not remove unreferenced record"),
                }
            }
        }
        swept
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    /// Accounts with a stored character record, ascending.
    pub fn accounts(&self) -> Vec<AccountId> {
        self.manifest
            .entries
            .keys()
            .filter_map(|k| k.strip_prefix("characters/"))
            .filter_map(|f| f.split('.').next())
            .filter_map(|n| n.parse().ok())
            .map(AccountId)
            .collect()
    }

    /// Verify every record file against the manifest.
    pub fn verify_integrity(&self) -> Result<(), PersistError> {
        for entry in self.manifest.entries.values() {
            self.read_verified(entry)?;
        }
        Ok(())
    }

    fn read_verified(&self, entry: &ManifestEntry) -> Result<Vec<u8>, PersistError> {
        let data = std::fs::read(self.root.join(&entry.file))?;
        let actual = sha256_hex(&data);
        if actual != entry.sha256 {
            return Err(PersistError::IntegrityMismatch {
                file: entry.file.clone(),
                expected: entry.sha256.clone(),
                actual,
            });
        }
        Ok(data)
    }

    fn read_record<T: for<'de> Deserialize<'de>>(
        &self,
        kind: RecordKind,
        account: AccountId,
    ) -> Result<Option<T>, PersistError> {
        let Some(entry) = self.manifest.entries.get(&kind.key(account)) else {
            return Ok(None);
        };
        let compressed = self.read_verified(entry)?;
        let cbor_bytes = zstd_decompress(&compressed)?;
        cbor_deserialize(&cbor_bytes).map(Some)
    }

    /// Write a new version of a record and commit it by replacing the
    /// manifest. On error the previous version stays live, on disk and in
    /// memory.
    fn write_record<T: Serialize>(
        &mut self,
        kind: RecordKind,
        account: AccountId,
        record: &T,
    ) -> Result<(), PersistError> {
        let cbor_bytes = cbor_serialize(record)?;
        let compressed = zstd_compress(&cbor_bytes)?;
        let sha256 = sha256_hex(&compressed);
        let entry = ManifestEntry {
            file: kind.file(account, &sha256),
            sha256,
        };
        let key = kind.key(account);
        if self.manifest.entries.get(&key) == Some(&entry) {
            return Ok(());
        }

        write_atomic(&self.root.join(&entry.file), &compressed)?;

        let mut next = self.manifest.clone();
        let previous = next.entries.insert(key, entry.clone());
        if let Err(e) = write_json_atomic(&self.manifest_path(), &next) {
            if !self.manifest.references(&entry.file) {
                let _ = std::fs::remove_file(self.root.join(&entry.file));
            }
            return Err(e);
        }
        self.manifest = next;

        if let Some(old) = previous.filter(|old| old.file != entry.file) {
            if let Err(e) = std::fs::remove_file(self.root.join(&old.file)) {
                tracing::warn!(file = %old.file, error = %e, "could not remove superseded record");
            }
        }
        Ok(())
    }

    /// Save counters are informational; a failed write does not undo a
    /// committed record.
    fn bump_meta(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Character => self.meta.character_saves += 1,
            RecordKind::Ability => self.meta.ability_saves += 1,
        }
        if let Err(e) = write_json_atomic(&self.root.join("store.meta.json"), &self.meta) {
            tracing::warn!(error = %e, "could not update store metadata");
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("integrity").join("manifest.json")
    }
}

fn check_schema(version: u32) -> Result<(), PersistError> {
    if version == CHARACTER_SCHEMA_VERSION {
        Ok(())
    } else {
        Err(PersistError::SchemaMismatch {
            file_version: version,
            expected_version: CHARACTER_SCHEMA_VERSION,
        })
    }
}

fn check_account(expected: AccountId, found: AccountId) -> Result<(), PersistError> {
    if expected == found {
        Ok(())
    } else {
        Err(PersistError::AccountMismatch { expected, found })
    }
}

impl CharacterRepository for FileCharacterStore {
    fn load_snapshot(&mut self, account: AccountId) -> Result<Option<PlayerSnapshot>, PersistError> {
        let Some(character) = self.read_record::<CharacterRecord>(RecordKind::Character, account)?
        else {
            return Ok(None);
        };
        check_schema(character.schema_version)?;
        check_account(account, character.account_id)?;

        let hotbar = match self.read_record::<AbilityRecord>(RecordKind::Ability, account)? {
            Some(record) => {
                check_schema(record.schema_version)?;
                check_account(account, record.account_id)?;
                record.hotbar
            }
            None => Hotbar::default(),
        };

        Ok(Some(PlayerSnapshot {
            account_id: account,
            transform: character.transform,
            velocity: character.velocity,
            health: Health::from_parts(character.health_current, character.health_max),
            movement_mode: character.movement_mode,
            hotbar,
        }))
    }

    fn save_character(&mut self, snapshot: &PlayerSnapshot) -> Result<(), PersistError> {
        let record = CharacterRecord {
            schema_version: CHARACTER_SCHEMA_VERSION,
            account_id: snapshot.account_id,
            transform: snapshot.transform,
            velocity: snapshot.velocity,
            health_current: snapshot.health.current(),
            health_max: snapshot.health.max(),
            movement_mode: snapshot.movement_mode,
        };
        self.write_record(RecordKind::Character, snapshot.account_id, &record)?;
        self.bump_meta(RecordKind::Character);
        Ok(())
    }

    fn save_ability_state(&mut self, snapshot: &PlayerSnapshot) -> Result<(), PersistError> {
        let record = AbilityRecord {
            schema_version: CHARACTER_SCHEMA_VERSION,
            account_id: snapshot.account_id,
            hotbar: snapshot.hotbar,
        };
        self.write_record(RecordKind::Ability, snapshot.account_id, &record)?;
        self.bump_meta(RecordKind::Ability);
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PersistError> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, PersistError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| PersistError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, PersistError> {
    ciborium::from_reader(data).map_err(|e| PersistError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, PersistError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, PersistError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
