use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    Error,
};
use tracing::Span;
use tracing_actix_web::root_span;

/// Request spans that carry the response status and, for failures, the error chain
pub(crate) struct RootSpanBuilder;

impl tracing_actix_web::RootSpanBuilder for RootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        root_span!(level = tracing::Level::INFO, request)
    }

    fn on_request_end<B>(span: Span, outcome: &Result<ServiceResponse<B>, Error>) {
        match outcome {
            Ok(response) => {
                if let Some(error) = response.response().error() {
                    record_error(&span, error)
                } else {
                    span.record("http.status_code", response.response().status().as_u16());
                    span.record("otel.status_code", "OK");
                }
            }
            Err(error) => record_error(&span, error),
        }
    }
}

fn record_error(span: &Span, error: &Error) {
    let response_error = error.as_response_error();

    span.record(
        "exception.message",
        tracing::field::display(response_error),
    );
    span.record(
        "exception.details",
        tracing::field::debug(response_error),
    );

    let status_code = response_error.status_code();
    span.record("http.status_code", status_code.as_u16());

    // rejected requests are the caller's fault, not an outage
    if status_code.is_client_error() {
        span.record("otel.status_code", "OK");
    } else {
        span.record("otel.status_code", "ERROR");
    }
}
