use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

#[derive(Debug, PartialEq)]
struct NotFoundError {
    name: String,
}

#[tokio::test(start_paused = true)]
async fn test_operation_invoked_once_at_creation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let resource: Resource<String, NotFoundError> = Resource::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("pikachu".to_string())
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for _ in 0..5 {
        assert!(resource.read().is_pending());
    }

    resource.settled().await.unwrap();

    for _ in 0..5 {
        assert_eq!(*resource.try_read().unwrap(), "pikachu");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(resource.status(), ResourceStatus::Success);
}

#[tokio::test]
async fn test_pending_reads_share_suspension() {
    let (resource, settle) = Resource::<u32, String>::deferred();
    let clone = resource.clone();

    let Read::Pending(first) = resource.read() else {
        panic!("expected pending read");
    };
    let Read::Pending(second) = clone.read() else {
        panic!("expected pending read");
    };

    assert_eq!(first, second);
    assert_eq!(first.resource(), resource.id());
    assert!(!first.is_resolved());

    settle.resolve(25);

    first.wait().await.unwrap();
    assert!(second.is_resolved());
    assert_eq!(*clone.try_read().unwrap(), 25);
}

#[tokio::test]
async fn test_rejection_returns_same_error_object() {
    let resource: Resource<String, NotFoundError> = Resource::new(|| async {
        Err(NotFoundError { name: "missingno".to_string() })
    });

    resource.settled().await.unwrap();

    let first = match resource.read() {
        Read::Failed(error) => error,
        other => panic!("expected failure, got {other:?}"),
    };

    for _ in 0..3 {
        match resource.try_read() {
            Err(ReadError::OperationFailed(error)) => assert!(Arc::ptr_eq(&first, &error)),
            Err(ReadError::Suspended(_)) => panic!("rejection must not read as suspended"),
            Ok(value) => panic!("unexpected value {value}"),
        }
    }

    assert_eq!(first.name, "missingno");
    assert_eq!(resource.status(), ResourceStatus::Error);
}

#[tokio::test]
async fn test_success_returns_same_value_object() {
    let resource = Resource::<Vec<u8>, String>::ready(vec![1, 2, 3]);

    let a = resource.try_read().unwrap();
    let b = resource.try_read().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(resource.is_settled());
}

#[tokio::test]
async fn test_dropped_settle_abandons_resource() {
    let (resource, settle) = Resource::<u32, String>::deferred();
    let Read::Pending(suspension) = resource.read() else {
        panic!("expected pending read");
    };

    drop(settle);

    assert!(resource.is_abandoned());
    assert_eq!(suspension.wait().await, Err(SuspensorError::Abandoned(resource.id())));
    assert_eq!(resource.status(), ResourceStatus::Pending);
}

#[tokio::test]
async fn test_panicking_operation_abandons_resource() {
    let explode = true;
    let resource: Resource<u32, String> = Resource::new(move || async move {
        tokio::task::yield_now().await;
        assert!(!explode, "operation blew up");
        Ok(7)
    });

    let result = resource.settled().await;
    assert_eq!(result, Err(SuspensorError::Abandoned(resource.id())));
}

#[test]
fn test_resource_ids_are_unique() {
    let a = Resource::<u8, ()>::ready(1);
    let b = Resource::<u8, ()>::ready(1);

    assert_ne!(a.id(), b.id());
    assert!(a.ptr_eq(&a.clone()));
    assert!(!a.ptr_eq(&b));
    assert!(a.id().to_string().starts_with("resource_"));
}

#[tokio::test(start_paused = true)]
async fn test_age_follows_runtime_clock() {
    let (resource, settle) = Resource::<u8, String>::deferred();

    tokio::time::sleep(Duration::from_millis(250)).await;
    settle.resolve(1);

    assert_eq!(resource.age(), Duration::from_millis(250));
}

#[test]
fn test_settle_listeners_run_at_settlement() {
    let (resource, settle) = Resource::<u8, String>::deferred();
    let Read::Pending(suspension) = resource.read() else {
        panic!("expected pending read");
    };

    let seen = Arc::new(AtomicUsize::new(0));
    let observer = Arc::clone(&seen);
    let observed = resource.clone();
    suspension.on_settle(move |state| {
        assert_eq!(state, SignalState::Settled);
        assert_eq!(observed.status(), ResourceStatus::Success);
        observer.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    settle.resolve(9);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    let late = Arc::clone(&seen);
    suspension.on_settle(move |_| {
        late.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}
