/// Lifecycle tests for the scoped engine against an in-memory service
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uw_engine::config::Environment;
use uw_engine::errors::UnderwritingError;
use uw_engine::insure_service::{EndpointResponse, InsureService};
use uw_engine::underwriting::{UW_ENDPOINT, UW_MEDIA_TYPE};
use uw_engine::{acquire_underwriting_engine, with_underwriting_engine, RatingRequest, Tenant};

/// Records lifecycle calls and answers the `uw` endpoint with a fixed response.
struct FakeService {
    up: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    completed_stops: AtomicUsize,
    stop_delay: Duration,
    fail_start: bool,
    status: u16,
    body: String,
    calls: Mutex<Vec<(String, Vec<(String, String)>, String)>>,
}

impl FakeService {
    fn new(up: bool, status: u16, body: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            up: AtomicBool::new(up),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            completed_stops: AtomicUsize::new(0),
            stop_delay: Duration::ZERO,
            fail_start: false,
            status,
            body: body.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing_start() -> Arc<Self> {
        Arc::new(Self {
            up: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            completed_stops: AtomicUsize::new(0),
            stop_delay: Duration::ZERO,
            fail_start: true,
            status: 200,
            body: "{}".to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn slow_stop(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            up: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            completed_stops: AtomicUsize::new(0),
            stop_delay: delay,
            fail_start: false,
            status: 200,
            body: "{}".to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InsureService for FakeService {
    fn environment(&self) -> Environment {
        Environment::Dev
    }

    async fn is_up(&self) -> Result<bool, UnderwritingError> {
        Ok(self.up.load(Ordering::SeqCst))
    }

    async fn start(&self) -> Result<(), UnderwritingError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(UnderwritingError::ServiceUnavailable(
                "simulated start failure".to_string(),
            ));
        }
        self.up.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), UnderwritingError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        self.up.store(false, Ordering::SeqCst);
        self.completed_stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn call_endpoint(
        &self,
        endpoint: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<EndpointResponse, UnderwritingError> {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), headers, body));
        Ok(EndpointResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

fn rating_request() -> RatingRequest {
    serde_json::from_value(json!({
        "version": "3.0",
        "quote": {"quoteId": "Q-1"},
        "commercialBOPPolicy": {
            "effectiveDate": "2024-01-01",
            "insuredAddress": {
                "addressLine1": "5 Elm St",
                "city": "Salem",
                "state": "MA",
                "zip": "01970"
            },
            "insuredName": "Salem Books",
            "insuredLocations": [{
                "locationAddress": {
                    "addressLine1": "5 Elm St",
                    "city": "Salem",
                    "state": "MA",
                    "zip": "01970"
                },
                "numberOfStories": 2
            }]
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_up_service_not_stopped_even_with_kill_on_exit() {
    let fake = FakeService::new(true, 200, json!({}));

    let guard = acquire_underwriting_engine(fake.clone(), true).await.unwrap();
    guard.release().await.unwrap();

    assert_eq!(fake.starts(), 0);
    assert_eq!(fake.stops(), 0);
}

#[tokio::test]
async fn test_down_service_started_and_stopped_with_kill_on_exit() {
    let fake = FakeService::new(false, 200, json!({}));

    let guard = acquire_underwriting_engine(fake.clone(), true).await.unwrap();
    assert_eq!(fake.starts(), 1);
    guard.release().await.unwrap();

    assert_eq!(fake.stops(), 1);
}

#[tokio::test]
async fn test_down_service_left_running_without_kill_on_exit() {
    let fake = FakeService::new(false, 200, json!({}));

    let guard = acquire_underwriting_engine(fake.clone(), false).await.unwrap();
    guard.release().await.unwrap();

    assert_eq!(fake.starts(), 1);
    assert_eq!(fake.stops(), 0);
}

#[tokio::test]
async fn test_start_failure_propagates_and_cleans_up() {
    let fake = FakeService::failing_start();

    let result = acquire_underwriting_engine(fake.clone(), true).await;

    assert!(matches!(
        result,
        Err(UnderwritingError::ServiceUnavailable(_))
    ));
    assert_eq!(fake.stops(), 1);
}

#[tokio::test]
async fn test_scoped_work_dispatches_once_with_vendor_headers() {
    let fake = FakeService::new(false, 200, json!({"decision": "approved"}));
    let request = rating_request();

    let log_line = with_underwriting_engine(fake.clone(), true, |engine| async move {
        engine.underwrite_policy(&request, Tenant::Attune).await
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(log_line.response, json!({"decision": "approved"}));
    assert_eq!(
        log_line.request.underwriting_data().get("numberOfStories"),
        Some(&json!(2))
    );
    assert_eq!(fake.stops(), 1);

    let calls = fake.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (endpoint, headers, body) = &calls[0];
    assert_eq!(endpoint, UW_ENDPOINT);
    assert!(headers.contains(&("Accept".to_string(), UW_MEDIA_TYPE.to_string())));
    assert!(headers.contains(&("Content-Type".to_string(), UW_MEDIA_TYPE.to_string())));
    let sent: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(sent, serde_json::to_value(&log_line.request).unwrap());
}

#[tokio::test]
async fn test_scoped_work_failure_status_yields_none() {
    let fake = FakeService::new(true, 503, json!({"error": "overloaded"}));
    let request = rating_request();

    let outcome = with_underwriting_engine(fake.clone(), true, |engine| async move {
        engine.underwrite_policy(&request, Tenant::Blackboard).await
    })
    .await
    .unwrap();

    assert!(outcome.is_none());
    assert_eq!(fake.stops(), 0);
}

#[tokio::test]
async fn test_scoped_work_error_still_releases() {
    let fake = FakeService::new(false, 200, json!({}));

    let result: Result<(), UnderwritingError> =
        with_underwriting_engine(fake.clone(), true, |_engine| async {
            Err(UnderwritingError::InvalidInput("bad request".to_string()))
        })
        .await;

    assert!(matches!(result, Err(UnderwritingError::InvalidInput(_))));
    assert_eq!(fake.stops(), 1);
}

#[tokio::test]
async fn test_dropped_guard_stops_service_in_background() {
    let fake = FakeService::new(false, 200, json!({}));

    let guard = acquire_underwriting_engine(fake.clone(), true).await.unwrap();
    drop(guard);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fake.stops(), 1);
}

#[tokio::test]
async fn test_panicking_work_still_stops_service() {
    let fake = FakeService::new(false, 200, json!({}));
    let service = fake.clone();

    let handle = tokio::spawn(async move {
        with_underwriting_engine(service, true, |_engine| async {
            if true {
                panic!("work blew up");
            }
            Ok::<(), UnderwritingError>(())
        })
        .await
    });

    assert!(handle.await.unwrap_err().is_panic());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fake.stops(), 1);
}

#[tokio::test]
async fn test_cancelled_release_still_stops_service() {
    let fake = FakeService::slow_stop(Duration::from_millis(50));

    let guard = acquire_underwriting_engine(fake.clone(), true).await.unwrap();
    let cancelled = tokio::time::timeout(Duration::from_millis(10), guard.release()).await;
    assert!(cancelled.is_err());
    assert_eq!(fake.completed_stops.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fake.completed_stops.load(Ordering::SeqCst), 1);
    assert!(!fake.up.load(Ordering::SeqCst));
}
