//! Effects performed on a real `FuturesRuntime`: pool threads, timer thread
//! and application performers written as futures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use effect_core::{
    parallel, ConstantIntent, Delay, Effect, ErrorInfo, FailurePolicy, MessageError,
    ParallelConfig, ParallelFailure, TypeDispatcher, Value,
};
use effect_futures::{future_performer, FuturesConfig, FuturesRuntime};
use futures::channel::oneshot;

#[derive(Debug)]
struct Fetch {
    url: String,
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn runtime(config: FuturesConfig) -> FuturesRuntime {
    let runtime = FuturesRuntime::from_config(&config).expect("runtime");
    let fetch = future_performer(runtime.spawner(), |_, intent: Arc<Fetch>| async move {
        if intent.url.starts_with("https://") {
            Ok(Value::from(format!("body of {}", intent.url)))
        } else {
            Err(ErrorInfo::new(MessageError(format!("refusing {}", intent.url))))
        }
    });
    runtime.with_dispatcher(TypeDispatcher::new().with::<Fetch>(fetch).into_ref())
}

fn fetch(url: &str) -> Effect {
    Effect::new(Fetch { url: url.into() })
}

#[test]
fn test_fetches_in_parallel_in_input_order() {
    init_logging();
    let runtime = runtime(FuturesConfig {
        pool_size: Some(2),
        ..FuturesConfig::default()
    });
    let urls = ["https://a", "https://b", "https://c"];
    let effect = parallel(urls.iter().map(|url| fetch(url)));
    let value = runtime.block_on(effect).expect("fetched");
    let bodies: Vec<&str> = value
        .as_list()
        .expect("list")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(bodies, vec!["body of https://a", "body of https://b", "body of https://c"]);
}

#[test]
fn test_delay_uses_the_timer_thread() {
    let runtime = runtime(FuturesConfig::default());
    let started = Instant::now();
    let effect = Effect::new(Delay::new(Duration::from_millis(30)))
        .on_success(|_| Ok(Value::Effect(fetch("https://after-delay"))));
    let value = runtime.block_on(effect).expect("delayed fetch");
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(value.as_str(), Some("body of https://after-delay"));
}

#[test]
fn test_application_failure_reaches_error_handler_across_threads() {
    let runtime = runtime(FuturesConfig::default());
    let effect = fetch("http://insecure").on_error(|error| {
        Ok(Value::from(format!("recovered: {error}")))
    });
    let value = runtime.block_on(effect).expect("recovered");
    assert_eq!(value.as_str(), Some("recovered: refusing http://insecure"));
}

#[test]
fn test_wait_all_policy_from_config() {
    let runtime = runtime(FuturesConfig {
        parallel: ParallelConfig {
            failure_policy: FailurePolicy::WaitAll,
        },
        ..FuturesConfig::default()
    });
    let slow_failure = Effect::new(Delay::new(Duration::from_millis(20)))
        .on_success(|_| Ok(Value::Effect(fetch("ftp://slow"))));
    let effect = parallel(vec![
        Effect::new(ConstantIntent::new(1i64)),
        slow_failure,
        fetch("ftp://fast"),
    ]);
    let err = runtime.block_on(effect).unwrap_err();
    let failure = err
        .as_failure()
        .and_then(|e| e.downcast_ref::<ParallelFailure>())
        .expect("parallel failure");
    assert_eq!(failure.index, 1);
    assert_eq!(failure.cause.to_string(), "refusing ftp://slow");
}

#[test]
fn test_handlers_may_await_nothing_and_still_run_on_pool() {
    let runtime = runtime(FuturesConfig::default());
    let (tx, rx) = oneshot::channel();
    let tx = parking_lot::Mutex::new(Some(tx));
    let effect = fetch("https://thread").on_success(move |value| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        }
        Ok(value)
    });
    let future = runtime.perform(effect);
    let thread_name = futures::executor::block_on(rx).expect("handler ran");
    assert!(thread_name.is_some_and(|name| name.starts_with("effect-pool-")));
    assert!(futures::executor::block_on(future).is_ok());
}

#[test]
fn test_unknown_intent_is_reported_without_waiting() {
    #[derive(Debug)]
    struct Unknown;

    let runtime = runtime(FuturesConfig::default());
    let err = runtime.block_on(Effect::new(Unknown)).unwrap_err();
    assert!(err.is_no_performer());
}
