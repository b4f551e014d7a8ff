//! Transactional API handlers, one message or a bulk batch per request.

use super::format::{ApiBody, ApiMessage};
use super::{Handler, HandlerState, Outgoing, Progress};
use crate::config::ApiConfig;
use crate::mailer::Backend;
use crate::models::Status;
use crate::transport::{ApiTransport, TransportError, TransportResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SANDBOX_LABEL: &str = " SANDBOX";

fn error_text(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Post `body` and record the outcome. `detailed` adds the API error code
/// and message to a rejection.
fn post(
    transport: &dyn ApiTransport,
    body: &Value,
    sandbox: bool,
    detailed: bool,
    status: &mut Status,
) {
    match transport.post(body) {
        Ok(TransportResponse {
            success: true,
            body: data,
            ..
        }) => {
            status.success = true;
            if sandbox {
                status.push_debug(data.to_string());
            }
            info!("Message accepted by the API");
        }
        Ok(TransportResponse {
            body: data, reason, ..
        }) => {
            status.success = false;
            if detailed {
                status.code = error_text(&data, "ErrorCode");
                status.message = format!("{} | {}", reason, error_text(&data, "ErrorMessage"));
            } else {
                status.message = reason;
            }
            status.trace = data.to_string();
            warn!(code = %status.code, message = %status.message, "Message rejected by the API");
        }
        Err(e) => {
            warn!(error = %e, "API transport failed");
            status.set_failure(e.to_string());
        }
    }
}

fn to_value(body: &ApiBody) -> Result<Value, String> {
    serde_json::to_value(body).map_err(|e| format!("Could not encode API body: {}", e))
}

/// Single message handler (`Messages: [message]`).
pub struct ApiHandler {
    sandbox: bool,
    transport: Option<Arc<dyn ApiTransport>>,
    body: Option<Value>,
    progress: Progress,
}

impl ApiHandler {
    pub fn new(
        config: &ApiConfig,
        transport: Result<Arc<dyn ApiTransport>, TransportError>,
    ) -> Self {
        let (transport, progress) = Progress::start(transport);
        Self {
            sandbox: config.sandbox,
            transport,
            body: None,
            progress,
        }
    }

    /// Prepared request body.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

impl Handler for ApiHandler {
    fn backend(&self) -> Backend {
        Backend::Api
    }

    fn prepare(&mut self, message: Outgoing<'_>) {
        let Outgoing::Single(param) = message else {
            self.progress.fail("The API handler sends a single message.");
            return;
        };
        if self.sandbox {
            param.append_via(SANDBOX_LABEL);
        }
        if self.progress.is_failed() {
            return;
        }

        let body = ApiBody {
            globals: None,
            messages: vec![ApiMessage::from_param(param)],
            sandbox_mode: self.sandbox,
        };
        match to_value(&body) {
            Ok(value) => {
                self.body = Some(value);
                self.progress.prepared();
                debug!(sandbox = self.sandbox, "API message prepared");
            }
            Err(e) => self.progress.fail(e),
        }
    }

    fn send(&mut self) {
        if self.progress.is_failed() {
            return;
        }
        let Some(transport) = self.transport.as_deref() else {
            return;
        };
        self.progress.begin_send();
        let body = self.body.clone().unwrap_or_else(|| json!({}));
        post(transport, &body, self.sandbox, true, &mut self.progress.status);
        self.progress.state = HandlerState::Sent;
    }

    fn status(&self) -> &Status {
        &self.progress.status
    }

    fn state(&self) -> HandlerState {
        self.progress.state
    }
}

/// Bulk handler (`Globals` + `Messages`).
pub struct ApiBulkHandler {
    sandbox: bool,
    transport: Option<Arc<dyn ApiTransport>>,
    body: Option<Value>,
    progress: Progress,
}

impl ApiBulkHandler {
    pub fn new(
        config: &ApiConfig,
        transport: Result<Arc<dyn ApiTransport>, TransportError>,
    ) -> Self {
        let (transport, progress) = Progress::start(transport);
        Self {
            sandbox: config.sandbox,
            transport,
            body: None,
            progress,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

impl Handler for ApiBulkHandler {
    fn backend(&self) -> Backend {
        Backend::ApiBulk
    }

    fn prepare(&mut self, message: Outgoing<'_>) {
        let Outgoing::Bulk(bulk) = message else {
            self.progress.fail("The bulk API handler sends a bulk of messages.");
            return;
        };
        if self.sandbox {
            if let Some(global) = bulk.global_mut() {
                global.append_via(SANDBOX_LABEL);
            }
        }
        if self.progress.is_failed() {
            return;
        }

        let body = ApiBody {
            globals: bulk.global().map(ApiMessage::from_param),
            messages: bulk.items().iter().map(ApiMessage::from_param).collect(),
            sandbox_mode: self.sandbox,
        };
        match to_value(&body) {
            Ok(value) => {
                self.body = Some(value);
                self.progress.prepared();
                debug!(messages = bulk.items().len(), sandbox = self.sandbox, "API bulk prepared");
            }
            Err(e) => self.progress.fail(e),
        }
    }

    fn send(&mut self) {
        if self.progress.is_failed() {
            return;
        }
        let Some(transport) = self.transport.as_deref() else {
            return;
        };
        self.progress.begin_send();
        let body = self.body.clone().unwrap_or_else(|| json!({}));
        post(transport, &body, self.sandbox, false, &mut self.progress.status);
        self.progress.state = HandlerState::Sent;
    }

    fn status(&self) -> &Status {
        &self.progress.status
    }

    fn state(&self) -> HandlerState {
        self.progress.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bulk, Param};
    use crate::transport::MockApiTransport;

    fn config(sandbox: bool) -> ApiConfig {
        ApiConfig {
            public_key: "pub".to_string(),
            private_key: "priv".to_string(),
            sandbox,
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_prepare_and_send_single() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post()
            .withf(|body| body["Messages"][0]["Subject"] == "Hello" && body["SandboxMode"] == true)
            .times(1)
            .returning(|_| Ok(TransportResponse::accepted(json!({"Messages": []}), "OK")));

        let mut handler = ApiHandler::new(&config(true), Ok(Arc::new(transport)));
        let mut param = Param::new().with_recipient("a@x.com", "").with_subject("Hello");
        param.set_via("API");
        handler.prepare(Outgoing::Single(&mut param));
        assert_eq!(handler.state(), HandlerState::Prepared);
        assert_eq!(param.via(), "API SANDBOX");

        handler.send();
        assert!(handler.status().success);
        assert_eq!(handler.status().debug, vec![r#"{"Messages":[]}"#.to_string()]);
        assert_eq!(handler.state(), HandlerState::Sent);
    }

    #[test]
    fn test_rejection_details() {
        let mut transport = MockApiTransport::new();
        transport.expect_post().times(1).returning(|_| {
            Ok(TransportResponse::rejected(
                json!({"ErrorCode": "mj-0003", "ErrorMessage": "Missing field"}),
                "Bad Request",
            ))
        });

        let mut handler = ApiHandler::new(&config(false), Ok(Arc::new(transport)));
        handler.prepare(Outgoing::Single(&mut Param::new()));
        handler.send();

        let status = handler.status();
        assert!(!status.success);
        assert_eq!(status.code, "mj-0003");
        assert_eq!(status.message, "Bad Request | Missing field");
        assert!(status.trace.contains("mj-0003"));
        assert!(status.debug.is_empty());
    }

    #[test]
    fn test_send_before_prepare_posts_empty_body() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post()
            .withf(|body| *body == json!({}))
            .times(1)
            .returning(|_| Ok(TransportResponse::rejected(json!({}), "Bad Request")));

        let mut handler = ApiHandler::new(&config(false), Ok(Arc::new(transport)));
        handler.send();
        assert!(!handler.status().success);
    }

    #[test]
    fn test_failed_construction_never_posts() {
        let mut handler = ApiHandler::new(
            &config(false),
            Err(TransportError::Config("API public and private keys are required".to_string())),
        );
        handler.prepare(Outgoing::Single(&mut Param::new()));
        handler.send();
        assert_eq!(handler.state(), HandlerState::Failed);
        assert!(handler.status().message.contains("keys are required"));
    }

    #[test]
    fn test_transport_error_becomes_status() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post()
            .returning(|_| Err(TransportError::Http("timed out".to_string())));

        let mut handler = ApiHandler::new(&config(false), Ok(Arc::new(transport)));
        handler.prepare(Outgoing::Single(&mut Param::new()));
        handler.send();
        assert!(!handler.status().success);
        assert!(handler.status().message.contains("timed out"));
    }

    #[test]
    fn test_bulk_body_and_reason_only_rejection() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post()
            .withf(|body| {
                body["Globals"]["Subject"] == "Shared"
                    && body["Messages"].as_array().map(Vec::len) == Some(2)
            })
            .times(1)
            .returning(|_| {
                Ok(TransportResponse::rejected(
                    json!({"ErrorCode": "x", "ErrorMessage": "y"}),
                    "Bad Request",
                ))
            });

        let mut bulk = Bulk::new();
        bulk.set_global(Param::new().with_subject("Shared"));
        bulk.add_item(Param::new().with_recipient("a@x.com", ""));
        bulk.add_item(Param::new().with_recipient("b@x.com", ""));

        let mut handler = ApiBulkHandler::new(&config(true), Ok(Arc::new(transport)));
        handler.prepare(Outgoing::Bulk(&mut bulk));
        assert!(bulk.global().unwrap().via().ends_with(" SANDBOX"));
        handler.send();

        let status = handler.status();
        assert_eq!(status.message, "Bad Request");
        assert_eq!(status.code, "");
        assert!(status.trace.contains("ErrorCode"));
    }

    #[test]
    fn test_wrong_shape_fails() {
        let transport = MockApiTransport::new();
        let mut handler = ApiBulkHandler::new(&config(false), Ok(Arc::new(transport)));
        handler.prepare(Outgoing::Single(&mut Param::new()));
        handler.send();
        assert_eq!(handler.state(), HandlerState::Failed);
    }
}
