//! Ephemeral interaction handlers driven by the runtime's scheduler.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cinder::prelude::*;
use parking_lot::Mutex;
use tokio::time::sleep;

/// A button that disables itself when nobody clicks it in time.
struct Button {
    id: String,
    disabled: Arc<AtomicUsize>,
}

impl Button {
    fn token(&self) -> Token {
        Token::new(format!("button:{}", self.id))
    }

    fn attach(&self, runtime: &CinderRuntime, lifetime: Duration) {
        let disabled = Arc::clone(&self.disabled);
        runtime
            .register_timeout_after(self.token(), lifetime, move || async move {
                disabled.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    fn click(&self, registry: &TimeoutRegistry, lifetime: Duration) -> bool {
        registry.reset_after(self.token(), lifetime).unwrap()
    }

    fn complete(&self, registry: &TimeoutRegistry) -> bool {
        registry.cancel(self.token())
    }
}

fn button(id: &str) -> Button {
    Button {
        id: id.to_string(),
        disabled: Arc::new(AtomicUsize::new(0)),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unused_button_expires_once() {
    let runtime = CinderRuntime::from_config(&CinderConfig::default());
    runtime.start().await.unwrap();

    let ok = button("ok");
    ok.attach(&runtime, Duration::from_secs(30));

    sleep(Duration::from_secs(29)).await;
    assert_eq!(ok.disabled.load(Ordering::SeqCst), 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(ok.disabled.load(Ordering::SeqCst), 1);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(ok.disabled.load(Ordering::SeqCst), 1);
    assert!(!ok.complete(runtime.timeouts()));

    runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_completed_interaction_never_expires() {
    let runtime = CinderRuntime::from_config(&CinderConfig::default());
    runtime.start().await.unwrap();

    let confirm = button("confirm");
    confirm.attach(&runtime, Duration::from_millis(100));

    sleep(Duration::from_millis(10)).await;
    assert!(confirm.complete(runtime.timeouts()));
    assert!(!confirm.complete(runtime.timeouts()));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(confirm.disabled.load(Ordering::SeqCst), 0);

    runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_use_extends_lifetime() {
    let runtime = CinderRuntime::from_config(&CinderConfig::default());
    runtime.start().await.unwrap();

    let page = button("next_page");
    page.attach(&runtime, Duration::from_secs(60));

    for _ in 0..3 {
        sleep(Duration::from_secs(45)).await;
        assert!(page.click(runtime.timeouts(), Duration::from_secs(60)));
    }
    assert_eq!(page.disabled.load(Ordering::SeqCst), 0);

    sleep(Duration::from_secs(61)).await;
    assert_eq!(page.disabled.load(Ordering::SeqCst), 1);
    assert!(!page.click(runtime.timeouts(), Duration::from_secs(60)));

    runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_token_keeps_first_handler() {
    let runtime = CinderRuntime::from_config(&CinderConfig::default());
    runtime.start().await.unwrap();

    let first = button("dup");
    first.attach(&runtime, Duration::from_secs(5));

    let second = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&second);
    let err = runtime
        .register_timeout_after(first.token(), Duration::from_secs(1), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Timeout(TimeoutError::DuplicateToken(_))
    ));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(first.disabled.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);

    runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failing_handler_is_reported_and_others_still_fire() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let runtime = CinderRuntime::builder()
        .without_env()
        .on_timeout_error(move |token, error| {
            sink.lock().push((token.to_string(), error.to_string()));
        })
        .build()
        .unwrap();
    runtime.start().await.unwrap();

    runtime
        .register_timeout_after("broken", Duration::from_secs(1), || async {
            Err::<(), _>("message was deleted")
        })
        .unwrap();
    let healthy = button("healthy");
    healthy.attach(&runtime, Duration::from_secs(1));

    sleep(Duration::from_secs(2)).await;
    assert_eq!(healthy.disabled.load(Ordering::SeqCst), 1);

    let reported = reported.lock();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].0, "broken");
    assert!(reported[0].1.contains("message was deleted"));
    drop(reported);

    runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_equal_deadlines_fire_in_registration_order() {
    let runtime = CinderRuntime::from_config(&CinderConfig::default());
    runtime.start().await.unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let deadline = runtime.timeouts().clock().now() + Duration::from_millis(500);
    for name in ["t3", "t4", "t5"] {
        let log = Arc::clone(&order);
        runtime
            .timeouts()
            .register(name, deadline, move || async move {
                log.lock().push(name);
            })
            .unwrap();
    }

    sleep(Duration::from_secs(1)).await;
    assert_eq!(*order.lock(), vec!["t3", "t4", "t5"]);

    runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stuck_handler_does_not_block_others_or_shutdown() {
    let runtime = CinderRuntime::from_config(&CinderConfig::default());
    runtime.start().await.unwrap();

    runtime
        .register_timeout_after("stuck", Duration::from_millis(100), || {
            std::future::pending::<()>()
        })
        .unwrap();
    let later = button("later");
    later.attach(&runtime, Duration::from_millis(200));

    sleep(Duration::from_secs(5)).await;
    assert_eq!(later.disabled.load(Ordering::SeqCst), 1);

    let stopped = tokio::time::timeout(Duration::from_secs(1), runtime.stop()).await;
    assert!(matches!(stopped, Ok(Ok(()))));
}
