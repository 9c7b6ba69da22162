use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ridgedb_error::{DbError, ErrorKind, Result};

use crate::command::QueryResult;
use crate::scalar::ScalarValue;
use crate::storage::Row;

/// Forward only cursor over a query result or generated keys.
///
/// Closed explicitly, by the next statement on the session, or when the
/// owning statement or session closes.
#[derive(Debug)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Row>,
    /// Index of the current row plus one, 0 before the first `next`.
    position: usize,
    open: Arc<AtomicBool>,
}

impl ResultSet {
    pub(crate) fn new(result: QueryResult, open: Arc<AtomicBool>) -> Self {
        ResultSet {
            columns: result.columns,
            rows: result.rows,
            position: 0,
            open,
        }
    }

    pub fn is_closed(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Flag shared with the owner that may close this cursor later.
    pub(crate) fn open_flag(&self) -> Arc<AtomicBool> {
        self.open.clone()
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DbError::new_kind(
                ErrorKind::ObjectClosed,
                "The result set is closed",
            ));
        }
        Ok(())
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Advance to the next row, false when exhausted.
    pub fn next(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.position < self.rows.len() {
            self.position += 1;
            Ok(true)
        } else {
            self.position = self.rows.len() + 1;
            Ok(false)
        }
    }

    /// Value of the zero based column in the current row.
    pub fn get(&self, column: usize) -> Result<&ScalarValue> {
        self.check_open()?;
        let row = self
            .position
            .checked_sub(1)
            .and_then(|idx| self.rows.get(idx))
            .ok_or_else(|| DbError::new_kind(ErrorKind::InvalidState, "No current row"))?;
        row.get(column).ok_or_else(|| {
            DbError::new_kind(ErrorKind::InvalidValue, "Column index out of range")
                .with_field("index", column)
                .with_field("columns", row.len())
        })
    }

    pub fn get_i64(&self, column: usize) -> Result<i64> {
        self.get(column)?.try_as_i64()
    }

    pub fn get_str(&self, column: usize) -> Result<&str> {
        self.get(column)?.try_as_str()
    }

    /// Rows after the current one.
    pub fn collect_rows(mut self) -> Result<Vec<Row>> {
        self.check_open()?;
        let start = self.position.min(self.rows.len());
        Ok(self.rows.split_off(start))
    }

    /// First column of the rows after the current one, as BIGINT.
    pub fn collect_i64(self) -> Result<Vec<i64>> {
        self.collect_rows()?
            .iter()
            .map(|row| match row.first() {
                Some(v) => v.try_as_i64(),
                None => Err(DbError::new_kind(ErrorKind::InvalidValue, "Row has no columns")),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_set() -> ResultSet {
        ResultSet::new(
            QueryResult {
                columns: vec!["ID".to_string()],
                rows: vec![vec![1_i64.into()], vec![2_i64.into()]],
            },
            Arc::new(AtomicBool::new(true)),
        )
    }

    #[test]
    fn iterate() {
        let mut rs = result_set();
        assert_eq!(ErrorKind::InvalidState, rs.get(0).unwrap_err().kind());
        assert!(rs.next().unwrap());
        assert_eq!(1, rs.get_i64(0).unwrap());
        assert_eq!(ErrorKind::InvalidValue, rs.get(1).unwrap_err().kind());
        assert!(rs.next().unwrap());
        assert!(!rs.next().unwrap());
        assert!(!rs.next().unwrap());
    }

    #[test]
    fn closed_cursor() {
        let mut rs = result_set();
        rs.close();
        assert_eq!(ErrorKind::ObjectClosed, rs.next().unwrap_err().kind());
    }

    #[test]
    fn collect_skips_visited_rows() {
        assert_eq!(vec![1, 2], result_set().collect_i64().unwrap());

        let mut rs = result_set();
        rs.next().unwrap();
        assert_eq!(vec![2], rs.collect_i64().unwrap());
    }
}
