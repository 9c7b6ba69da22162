//! Integration tests driving the database through sessions and statements.
