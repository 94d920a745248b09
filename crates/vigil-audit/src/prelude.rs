//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_audit::prelude::*;` to import all essential types.

pub use crate::{AuditCache, AuditError, AuditHistory, AuditParams, AuditResult, Auditor};
pub use crate::{AuditRecord, ErrorKind};

pub use vigil_sync::CancellationToken;
