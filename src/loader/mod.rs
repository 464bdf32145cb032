//! Source ingestion for machine descriptions.

pub mod machine;
