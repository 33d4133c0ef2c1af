use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use testkit::concurrency::BackgroundTask;
use testkit::error::ErrorKind;
use testkit::testkit_error;

#[tokio::test(flavor = "multi_thread")]
async fn join_returns_the_background_result() {
    let task = BackgroundTask::spawn(async { Ok(42) });

    assert_eq!(task.join().await.unwrap(), 42);
}

#[tokio::test(flavor = "multi_thread")]
async fn join_reraises_a_captured_error() {
    let task: BackgroundTask<()> = BackgroundTask::spawn(async {
        Err(testkit_error!(
            ErrorKind::SourceQueryFailed,
            "Statement failed in the background"
        ))
    });

    let error = task.join().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SourceQueryFailed);
}

#[tokio::test(flavor = "multi_thread")]
#[should_panic(expected = "background boom")]
async fn join_resumes_a_captured_panic() {
    let task: BackgroundTask<()> = BackgroundTask::spawn(async {
        panic!("background boom");
    });

    let _ = task.join().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn join_never_observes_a_result_before_the_work_returned() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();

    let task = BackgroundTask::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        flag.store(true, Ordering::SeqCst);
        Ok(7)
    });

    let value = task.join().await.unwrap();
    assert_eq!(value, 7);
    assert!(finished.load(Ordering::SeqCst));
}
