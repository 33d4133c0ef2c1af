use std::future::Future;
use std::panic;

use testkit_postgres::client::PgClient;
use tokio::task::JoinHandle;
use tokio_postgres::SimpleQueryRow;

use crate::error::{ErrorKind, TestkitResult};
use crate::testkit_error;

/// Handle to a unit of work running concurrently with the test.
///
/// The work produces a result-or-error; [`BackgroundTask::join`] makes
/// waiting for it synchronous again, re-raising a captured error in the
/// caller. The caller never observes an outcome before the background work
/// has fully returned.
pub struct BackgroundTask<T> {
    handle: JoinHandle<TestkitResult<T>>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Spawns `work` onto the runtime.
    pub fn spawn<F>(work: F) -> BackgroundTask<T>
    where
        F: Future<Output = TestkitResult<T>> + Send + 'static,
    {
        BackgroundTask {
            handle: tokio::spawn(work),
        }
    }

    /// Waits for the background work to finish and returns its outcome.
    ///
    /// An error captured in the task is returned here as if the caller had
    /// run the work itself; a panic in the task resumes in the caller.
    pub async fn join(self) -> TestkitResult<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                panic::resume_unwind(join_error.into_panic())
            }
            Err(join_error) => Err(testkit_error!(
                ErrorKind::BackgroundTaskFailed,
                "Background task was cancelled before completing",
                source: join_error
            )),
        }
    }
}

/// Executes `sql` in the background on the session behind `client`.
///
/// The statement runs on the same backend as other queries issued through
/// `client`, so a lock it blocks on belongs to a session the test still
/// controls. Used to park one connection on a blocking statement while the
/// test issues concurrent commands from others.
pub fn spawn_query(client: &PgClient, sql: impl Into<String>) -> BackgroundTask<Vec<SimpleQueryRow>> {
    let client = client.clone();
    let sql = sql.into();

    BackgroundTask::spawn(async move {
        let rows = client.simple_query(&sql).await?;
        Ok(rows)
    })
}
