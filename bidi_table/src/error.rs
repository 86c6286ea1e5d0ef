use std::fmt;

/// Rejection reasons for [`Cursor`](crate::Cursor) operations.
///
/// None of these leave the table in a modified state. `StaleCursor` means
/// the table changed behind the cursor's back and the traversal must be
/// restarted; the others are misuses of the cursor itself.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CursorError {
    /// The table was structurally modified since the cursor's last
    /// checkpoint.
    StaleCursor,
    /// `next` was called with no pairings left to visit.
    Exhausted,
    /// `remove` was called before any successful `next`.
    NothingYielded,
    /// `remove` was called twice for the same pairing.
    AlreadyRemoved,
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            CursorError::StaleCursor => "table was modified during cursor traversal",
            CursorError::Exhausted => "no next pairing to visit",
            CursorError::NothingYielded => "nothing yielded yet, nothing to remove",
            CursorError::AlreadyRemoved => "pairing was already removed",
        };
        f.write_str(message)
    }
}

impl std::error::Error for CursorError {}
