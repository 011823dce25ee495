//! SQL for the relational backend, one module per area.

pub mod fingerprint_ops;
pub mod index_ops;
pub mod manifest_ops;
pub mod record_ops;
