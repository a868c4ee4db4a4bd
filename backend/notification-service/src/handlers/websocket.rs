/// WebSocket handler for real-time notifications
///
/// Implements HTTP endpoints for connection status and targeted delivery.
/// Real-time WebSocket connections are handled via the gateway at `/ws`.

use actix_web::{web, HttpResponse};
use notification_protocol::{NotificationData, NotificationType};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::services::Dispatcher;
use crate::websocket::ConnectionRegistry;

/// Body of a targeted notification request
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl NotifyRequest {
    fn payload(&self) -> Result<NotificationData> {
        let notification_type: NotificationType = self.notification_type.parse()?;
        if notification_type == NotificationType::System {
            return Err(AppError::BadRequest(
                "system notifications are server-originated".into(),
            ));
        }
        let data = if self.data.is_null() {
            json!({})
        } else {
            self.data.clone()
        };
        Ok(NotificationData::from_parts(notification_type, data)?)
    }
}

/// Get WebSocket connection status for a user
///
/// Endpoint: GET /api/v1/ws/status/{user_id}
pub async fn ws_status(
    path: web::Path<String>,
    registry: web::Data<ConnectionRegistry>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let connection_count = registry.connection_count(&user_id);

    Ok(HttpResponse::Ok().json(json!({
        "user_id": user_id,
        "connected": connection_count > 0,
        "connection_count": connection_count
    })))
}

/// Get connection metrics
///
/// Endpoint: GET /api/v1/ws/metrics
pub async fn ws_metrics(registry: web::Data<ConnectionRegistry>) -> Result<HttpResponse> {
    let total_connections = registry.total_connections();
    let connected_users = registry.connected_users_count();

    Ok(HttpResponse::Ok().json(json!({
        "total_connections": total_connections,
        "connected_users": connected_users,
        "average_connections_per_user": if connected_users > 0 {
            total_connections as f64 / connected_users as f64
        } else {
            0.0
        }
    })))
}

/// Send targeted notification to specific user
///
/// Endpoint: POST /api/v1/ws/notify/{user_id}
pub async fn send_user_notification(
    path: web::Path<String>,
    dispatcher: web::Data<Dispatcher>,
    body: web::Json<NotifyRequest>,
) -> Result<HttpResponse> {
    let recipient_id = path.into_inner();
    if recipient_id.trim().is_empty() {
        return Err(AppError::BadRequest("user id must not be empty".into()));
    }

    let data = body.payload()?;
    let notification = dispatcher.create_notification(
        &recipient_id,
        body.title.clone(),
        body.message.clone(),
        data,
    );
    let delivered = dispatcher.send_to_user(&recipient_id, &notification);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "notification": notification,
        "delivered": delivered
    })))
}

/// Get list of all connected user IDs
///
/// Endpoint: GET /api/v1/ws/users
pub async fn list_connected_users(
    registry: web::Data<ConnectionRegistry>,
) -> Result<HttpResponse> {
    let user_ids = registry.connected_user_ids();

    Ok(HttpResponse::Ok().json(json!({
        "count": user_ids.len(),
        "users": user_ids
    })))
}

/// Register WebSocket routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into());

    cfg.service(
        web::scope("/api/v1/ws")
            .app_data(json_config)
            .route("/status/{user_id}", web::get().to(ws_status))
            .route("/metrics", web::get().to(ws_metrics))
            .route("/notify/{user_id}", web::post().to(send_user_notification))
            .route("/users", web::get().to(list_connected_users)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: &str, data: serde_json::Value) -> NotifyRequest {
        NotifyRequest {
            title: "t".into(),
            message: "m".into(),
            notification_type: kind.into(),
            data,
        }
    }

    #[test]
    fn test_payload_matches_type() {
        let req = request(
            "club_announcement",
            json!({ "clubId": "c1", "clubName": "Chess", "announcement": "Meetup" }),
        );
        assert_eq!(
            req.payload().unwrap().notification_type(),
            NotificationType::ClubAnnouncement
        );
    }

    #[test]
    fn test_payload_rejects_mismatched_data() {
        let req = request("thread_reply", json!({ "clubId": "c1" }));
        assert!(matches!(req.payload(), Err(AppError::Protocol(_))));
    }

    #[test]
    fn test_payload_rejects_unknown_and_system_types() {
        assert!(matches!(
            request("party_invite", json!({})).payload(),
            Err(AppError::Protocol(_))
        ));
        assert!(matches!(
            request("system", json!({})).payload(),
            Err(AppError::BadRequest(_))
        ));
    }
}
