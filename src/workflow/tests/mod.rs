//! Unit tests for the issue workflow module.
//!
//! Domain values and pure transition planning are tested directly; the
//! service is exercised against the in-memory store with a mocked delivery
//! port. `PostgreSQL` row mappings are checked without a database.
