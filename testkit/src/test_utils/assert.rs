use testkit_postgres::error::NodeError;

/// Asserts that a query error originated from the server with exactly
/// `expected` as its primary message.
pub fn assert_pg_error_message(error: &NodeError, expected: &str) {
    let db_error = db_error(error);
    assert_eq!(db_error.message(), expected);
}

/// Asserts the primary message and the attached hint of a server error.
pub fn assert_pg_error_with_hint(error: &NodeError, expected: &str, expected_hint: &str) {
    let db_error = db_error(error);
    assert_eq!(db_error.message(), expected);
    assert_eq!(db_error.hint(), Some(expected_hint));
}

fn db_error(error: &NodeError) -> &tokio_postgres::error::DbError {
    let NodeError::Query(query_error) = error else {
        panic!("expected a query error, got: {error}");
    };

    query_error
        .as_db_error()
        .expect("error did not originate from the server")
}
