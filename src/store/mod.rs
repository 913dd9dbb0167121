//! Annotation persistence
//!
//! [`HighlightStore`] owns the record format; the bytes live behind a
//! [`RecordStorage`] collaborator. The legacy namespace is only touched by
//! [`LegacyMigrator`].

mod highlight_store;
mod keys;
mod legacy_file;
mod memory;
mod migration;
mod records;
mod schema;
mod sqlite;
mod storage;

pub use highlight_store::{migration_key, record_key, HighlightStore, Loaded};
pub use keys::{DocumentKeyer, UrlKeyer};
pub use legacy_file::JsonFileLegacyStorage;
pub use memory::{MemoryLegacyStorage, MemoryStorage};
pub use migration::{LegacyMigrator, MigrationReport};
pub use records::{Annotation, Color, ExportEntry, MigrationRecord, PersistedDocumentRecord};
pub use schema::{
    classify, gen0_to_gen1, gen1_to_gen2, upgrade_to_latest, Gen1Annotation, Gen1RangeInfo,
    Gen1Step, LegacyEntry, StoredShape,
};
pub use sqlite::SqliteStorage;
pub use storage::{LegacyStorage, RecordStorage};
