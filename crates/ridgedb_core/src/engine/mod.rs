//! Sessions, statements and the cursors they hand out.
pub mod result;
pub mod savepoint;
pub mod session;
pub mod statement;
