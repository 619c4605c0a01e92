//! HTTP ハンドラ
//!
//! 認証が必要なエンドポイントは、ボディを読む前に credential を検証する。

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use super::error::ApiError;
use crate::app::Gateway;
use crate::domain::{DeviceClass, GatewayError};

pub const API_KEY_HEADER: &str = "x-api-key";

pub type GatewayState = Arc<Gateway>;

fn credential(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

pub async fn ingest_telemetry(
    State(gateway): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    gateway.auth.require(credential(&headers), DeviceClass::Sensor)?;

    let id = gateway.telemetry_ingest.ingest_json(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Data saved",
            "id": id.to_string(),
        })),
    ))
}

pub async fn latest_telemetry(State(gateway): State<GatewayState>) -> Result<Json<Value>, ApiError> {
    let records = gateway.telemetry_query.latest(gateway.latest_limit).await?;
    Ok(Json(json!({
        "status": "success",
        "count": records.len(),
        "data": records,
    })))
}

pub async fn aggregate_telemetry(
    State(gateway): State<GatewayState>,
) -> Result<Json<Value>, ApiError> {
    let aggregate = gateway.telemetry_query.aggregate().await?;
    Ok(Json(json!({
        "status": "success",
        "data": aggregate,
    })))
}

/// 認証 → レート制限 → ボディ読み取り → 取り込み
pub async fn upload_media(
    State(gateway): State<GatewayState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    gateway.auth.require(credential(&headers), DeviceClass::Camera)?;

    // 接続情報が無い場合（テストなど）は全クライアントで 1 つのウィンドウを共有する
    let client = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    gateway.upload_limiter.check(client)?;

    let raw = read_image(&headers, request, &gateway).await?;
    let asset = gateway.media_ingest.ingest(raw).await?;

    Ok(Json(json!({
        "status": "success",
        "filename": asset.filename,
        "size": asset.size_label(),
        "message": "Image received and saved",
    })))
}

/// アップロードの読み取り失敗はサイズ超過も含めて 400
fn upload_rejection(status: StatusCode, message: String) -> ApiError {
    let status = if status == StatusCode::PAYLOAD_TOO_LARGE {
        StatusCode::BAD_REQUEST
    } else {
        status
    };
    ApiError::rejected(status, message)
}

/// multipart なら `image` フィールド、それ以外は生のボディ
async fn read_image(
    headers: &HeaderMap,
    request: Request,
    gateway: &GatewayState,
) -> Result<Vec<u8>, ApiError> {
    let is_multipart = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let body = Bytes::from_request(request, gateway)
            .await
            .map_err(|e| upload_rejection(e.status(), e.body_text()))?;
        return Ok(body.to_vec());
    }

    let mut multipart = Multipart::from_request(request, gateway)
        .await
        .map_err(|e| upload_rejection(e.status(), e.body_text()))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_rejection(e.status(), e.body_text()))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| upload_rejection(e.status(), e.body_text()))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(GatewayError::Validation("No image data received".to_string()).into())
}

pub async fn latest_media(State(gateway): State<GatewayState>) -> Result<Json<Value>, ApiError> {
    let latest = gateway.media_query.latest().await?;
    Ok(Json(json!({
        "status": "success",
        "filename": latest.filename,
        "image_data": STANDARD.encode(&latest.bytes),
        "timestamp": latest.timestamp(),
    })))
}

pub async fn cleanup_media(
    State(gateway): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    gateway.auth.require(credential(&headers), DeviceClass::Camera)?;

    let report = gateway.media_cleanup.purge().await?;
    Ok(Json(json!({
        "status": "success",
        "count": report.count(),
        "deleted": report.deleted,
    })))
}
