//! Unified configuration system.
//!
//! Consolidates configuration from these tiers with field-by-field YAML merging:
//! 1. **Defaults** - Built into [`Config::default`]
//! 2. **Project** - `$CWD/skill-graph/config.yaml`
//! 3. **User** - `~/.skill-graph/config.yaml`
//! 4. **Environment** - `SKILL_GRAPH_*` variables
//!
//! ## Environment Variables
//! - `SKILL_GRAPH_CONFIG_PATH` - Explicit config file (replaces project and user tiers)
//! - `SKILL_GRAPH_DB_PATH` - Database path
//! - `SKILL_GRAPH_MODE` - `live` or `demo`
//! - `SKILL_GRAPH_STALE_HOURS` - Stale threshold in hours
//! - `SKILL_GRAPH_GAP_THRESHOLD` - Knowledge gap threshold
//! - `SKILL_GRAPH_USER_DIR` - User config dir (default: `~/.skill-graph`)
//! - `SKILL_GRAPH_PROJECT_DIR` - Project config dir (default: `./skill-graph`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{Layer, Merged, deep_merge, merge_layers};
pub use types::*;
