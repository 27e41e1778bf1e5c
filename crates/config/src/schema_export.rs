//! JSON Schema export for the indexer config file.

use crate::IndexerConfig;
use schemars::{Schema, schema_for};

/// JSON Schema for `IndexerConfig`.
#[must_use]
pub fn indexer_config_schema() -> Schema {
    schema_for!(IndexerConfig)
}
