//! # tagengine
//!
//! Tag governance engine: scans an inventory, matches it against a rule set
//! and applies tag actions, with snapshot-based backup and restore.
//!
//! ## Pipeline
//!
//! ```text
//! Scanner ──▶ [Resource] ──▶ evaluate ──▶ MatchTable ──▶ Executor ──▶ [ActionExecutionRecord]
//!                                              │
//!                                              └──▶ BackupManager::snapshot ──▶ Backup
//! ```
//!
//! ## Example
//!
//! ```
//! use armkit::{CallContext, MemoryBackend};
//! use tagengine::{Executor, RuleSet, Scanner, evaluate};
//!
//! let backend = MemoryBackend::new();
//! let rules = RuleSet::from_json_str(
//!     r#"{"rules": [{"name": "untagged",
//!                    "conditions": [{"type": "noTags"}],
//!                    "actions": [{"type": "addTag", "tag": "env", "value": "prod"}]}]}"#,
//! )
//! .unwrap();
//!
//! let ctx = CallContext::new();
//! let outcome = Scanner::new(&backend).scan_all(&ctx).unwrap();
//! let table = evaluate(&rules.rules, &outcome.resources);
//! let records = Executor::new(&backend).execute(&ctx, &table, true).unwrap();
//! assert!(records.is_empty());
//! ```

#![warn(clippy::all)]

pub mod backup;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod routing;
pub mod rules;
pub mod scanner;

pub use backup::{Backup, BackupEntry, BackupManager, RestoreSummary};
pub use error::{Error, Result};
pub use executor::{ActionExecutionRecord, ExecutionFailure, Executor};
pub use matcher::{MatchEntry, MatchTable, evaluate, rule_matches};
pub use routing::{ApiVersions, TagWriter, UpdateRoutes, UpdateStrategy};
pub use rules::{Action, Condition, Params, Rule, RuleSet};
pub use scanner::{GroupScanFailure, NoObserver, ScanObserver, ScanOptions, ScanOutcome, Scanner};
