//! Change detection against the stored snapshot.

/// How transformed content relates to the stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Nothing stored yet for this resource
    New,
    /// Byte-equal to the stored content
    Unchanged,
    /// At least one byte differs
    Changed,
}

/// Compare `current` with the `previous` snapshot entry.
pub fn detect_change(previous: Option<&[u8]>, current: &[u8]) -> Change {
    match previous {
        None => Change::New,
        Some(previous) if previous == current => Change::Unchanged,
        Some(_) => Change::Changed,
    }
}
