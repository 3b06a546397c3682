//! **refmark** - Keeps inline reference markers (`[1]`, `[2]`, ...) sequential
//!
//! When a marker is inserted between existing ones, every marker after the
//! insertion point is renumbered, the title mapping follows along and the whole
//! change runs as a transaction that rolls back on any failure.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Reindexing engine - detection, planning, rewriting, validation, recovery
pub mod core {
    /// Marker syntax and extraction
    pub mod marker;
    pub use marker::{Marker, extract_all_markers};

    /// Insertion classification and context detection
    pub mod classify;
    pub use classify::{InsertionContext, InsertionKind, detect_insertion_between_markers};

    /// Rename plans
    pub mod plan;
    pub use plan::{RenamePlan, RenamePlanEntry, plan_reindexing};

    /// Collision-free content rewriting
    pub mod rewrite;
    pub use rewrite::{ContentRewriter, RegexRewriter, rewrite_content};

    /// Sequence and post-reindex validation
    pub mod validate;
    pub use validate::{ValidationResult, validate_sequential_integrity};

    /// Bidirectional title/marker mapping
    pub mod mapping;
    pub use mapping::{ReferenceMapping, update_reference_mapping};

    /// Host editor capability
    pub mod editor;
    pub use editor::{BufferEditor, EditorAdapter, Viewport};

    /// Pre-change state snapshots
    pub mod backup;
    pub use backup::{RollbackReport, StateBackup};

    /// Duplicate and gap repairs
    pub mod repair;

    /// Pure reindexing pipeline
    pub mod reindex;
    pub use reindex::{ReindexOutcome, reindex_markers_after_insertion};

    /// Transactions, retries and fallback
    pub mod orchestrator;
    pub use orchestrator::{
        RecoveryOptions, Reindexer, RollbackableResult, execute_reindexing_with_full_error_handling,
        reindex_with_error_handling,
    };

    /// Error taxonomy
    pub mod error;
    pub use error::{EditorError, ReindexError};
}

/// Command handlers behind the `rmk` subcommands
pub mod cli_ext {
    pub mod insert_cmd;
    pub mod render;
    pub mod repair_cmd;
    pub mod scan_cmd;
    pub mod validate_cmd;
}

/// Infrastructure - Configuration, I/O and logging
pub mod infra {
    /// Layered configuration with TOML/YAML/JSON files and env overrides
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Text and mapping file I/O with atomic writes
    pub mod io;
    pub use io::{read_mapping, read_text, write_atomic, write_mapping};

    /// Tracing subscriber setup
    pub mod logging;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::{
    InsertionContext, Marker, ReferenceMapping, RenamePlan, RollbackableResult, ValidationResult,
};
