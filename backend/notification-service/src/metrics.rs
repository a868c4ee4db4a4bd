use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, TextEncoder,
};
use std::rc::Rc;
use std::time::{Duration, Instant};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_http_requests_total",
            "Total HTTP requests handled by notification-service, labelled by route pattern",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create notification_service_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "notification_service_http_request_duration_seconds",
            "HTTP request latency for notification-service",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["method", "path", "status"],
    )
    .expect("failed to create notification_service_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register notification_service_http_request_duration_seconds");
    histogram
});

static WS_ACTIVE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "notification_service_ws_active_connections",
        "Live WebSocket connections held in the registry",
    )
    .expect("failed to create notification_service_ws_active_connections");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register notification_service_ws_active_connections");
    gauge
});

static WS_CONNECTED_USERS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "notification_service_ws_connected_users",
        "Distinct users with at least one live WebSocket connection",
    )
    .expect("failed to create notification_service_ws_connected_users");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register notification_service_ws_connected_users");
    gauge
});

static NOTIFICATIONS_DISPATCHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_notifications_dispatched_total",
            "Notifications created by the dispatcher",
        ),
        &["type"],
    )
    .expect("failed to create notification_service_notifications_dispatched_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_notifications_dispatched_total");
    counter
});

static WS_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_ws_events_total",
            "WebSocket lifecycle events (deliveries, rejections, heartbeat terminations, malformed frames)",
        ),
        &["event"],
    )
    .expect("failed to create notification_service_ws_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_ws_events_total");
    counter
});

pub fn set_connection_gauges(total_connections: usize, connected_users: usize) {
    WS_ACTIVE_CONNECTIONS.set(total_connections as i64);
    WS_CONNECTED_USERS.set(connected_users as i64);
}

pub fn record_dispatch(notification_type: &str, deliveries: usize) {
    NOTIFICATIONS_DISPATCHED_TOTAL
        .with_label_values(&[notification_type])
        .inc();
    WS_EVENTS_TOTAL
        .with_label_values(&["delivery"])
        .inc_by(deliveries as u64);
}

pub fn record_rejected_connection() {
    WS_EVENTS_TOTAL.with_label_values(&["rejected"]).inc();
}

pub fn record_heartbeat_termination() {
    WS_EVENTS_TOTAL
        .with_label_values(&["heartbeat_termination"])
        .inc();
}

pub fn record_malformed_frame() {
    WS_EVENTS_TOTAL.with_label_values(&["malformed_frame"]).inc();
}

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

/// Records request count and latency per route pattern
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        // Label by pattern so path parameters stay out of the label set
        let route = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());
        let method = req.method().to_string();
        let started = Instant::now();

        Box::pin(async move {
            let result = service.call(req).await;
            let status = result
                .as_ref()
                .map(|response| response.status().as_u16())
                .unwrap_or(500);
            observe_http_request(&method, &route, status, started.elapsed());
            result
        })
    }
}
