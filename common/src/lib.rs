//! consul-hosts 共通ライブラリ
//!
//! 設定、エラー型、カタログ応答の型定義

#![warn(missing_docs)]

/// 設定管理（設定ファイル読み込み）
pub mod config;

/// エラー型定義
pub mod error;

/// カタログ応答の型定義
pub mod types;
