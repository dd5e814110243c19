//! Chunking for `IN (...)` lists so bulk operations stay under SQLite's
//! parameter limit.

/// Ids bound per `IN (...)` list.
///
/// Older SQLite builds cap a statement at 999 bound parameters
/// (`SQLITE_MAX_VARIABLE_NUMBER`); 500 leaves room for the account filter and
/// the other predicates sharing the statement.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Splits `items` into slices of at most `SQLITE_MAX_PARAMS_CHUNK`.
///
/// # Example
///
/// ```ignore
/// for chunk in chunk_for_sqlite(&remote_transaction_ids) {
///     existing.extend(load_remote_ids(conn, account_id, chunk)?);
/// }
/// ```
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        let items: Vec<i32> = vec![];
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_lists_stay_whole() {
        let items: Vec<String> = (0..100).map(|i| format!("tx-{i}")).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 100);
    }

    #[test]
    fn long_lists_split_at_the_limit() {
        let items: Vec<i32> = (0..1200).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), SQLITE_MAX_PARAMS_CHUNK);
        assert_eq!(chunks[2].len(), 200);
    }
}
