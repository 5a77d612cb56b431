//! Requests sent on a connection and the responses they produce.

use bytes::Bytes;

/// Transaction control statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlStatement {
    /// `START TRANSACTION`
    StartTransaction,
    /// `COMMIT`
    Commit,
    /// `ROLLBACK`
    Rollback,
}

impl ControlStatement {
    /// Get the SQL text of this statement.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::StartTransaction => "START TRANSACTION",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
        }
    }
}

/// A single request on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Request {
    /// Ordinary query text.
    Query(String),
    /// Transaction control statement.
    Control(ControlStatement),
    /// Marks the connection as non-reusable. Carries no payload and is
    /// never written to the server as SQL.
    Poison,
}

impl Request {
    /// Create a query request.
    pub fn query(sql: impl Into<String>) -> Self {
        Self::Query(sql.into())
    }

    /// SQL text carried by this request, `None` for the poison marker.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Query(sql) => Some(sql),
            Self::Control(statement) => Some(statement.as_sql()),
            Self::Poison => None,
        }
    }

    /// Check if this is the poison marker.
    #[must_use]
    pub fn is_poison(&self) -> bool {
        matches!(self, Self::Poison)
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sql() {
            Some(sql) => f.write_str(sql),
            None => f.write_str("<poison>"),
        }
    }
}

impl From<ControlStatement> for Request {
    fn from(statement: ControlStatement) -> Self {
        Self::Control(statement)
    }
}

/// OK packet contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OkPacket {
    /// Rows changed by the statement.
    pub affected_rows: u64,
    /// Last `AUTO_INCREMENT` value generated.
    pub last_insert_id: u64,
    /// Warning count.
    pub warnings: u16,
}

/// Text-protocol result set.
///
/// Cells are kept as the raw bytes the server sent; `None` is SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    /// Column names.
    pub columns: Vec<String>,
    /// Row values in column order.
    pub rows: Vec<Vec<Option<Bytes>>>,
}

impl ResultSet {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result set has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Successful answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Statement executed without a result set.
    Ok(OkPacket),
    /// Statement produced rows.
    ResultSet(ResultSet),
    /// Acknowledgement of [`Request::Poison`].
    Poisoned,
}

impl Response {
    /// Rows affected, for OK responses.
    #[must_use]
    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            Self::Ok(ok) => Some(ok.affected_rows),
            _ => None,
        }
    }

    /// Borrow the result set, if any.
    #[must_use]
    pub fn result_set(&self) -> Option<&ResultSet> {
        match self {
            Self::ResultSet(rs) => Some(rs),
            _ => None,
        }
    }
}
