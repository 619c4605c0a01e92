//! roomsense-core
//!
//! Core building blocks for the RoomSense IoT gateway: sensor telemetry
//! ingestion and camera image handling for classroom monitoring devices.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, device, telemetry, media, errors）
//! - **ports**: 抽象化レイヤー（TelemetryStore, MediaDirectory, Clock, IdGenerator）
//! - **impls**: 実装（InMemory / JSON Lines / ローカルファイルシステム）
//! - **app**: アプリケーションロジック（認証、取り込み、容量管理、構築）
//! - **http**: axum のルーターとハンドラ
//! - **config**: figment による設定
//! - **observability**: tracing の初期化

pub mod domain;
pub mod ports;
pub mod impls;
pub mod app;
pub mod http;
pub mod config;
pub mod observability;

#[cfg(test)]
pub(crate) mod testing;
