//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// カタログ応答の形式エラー
///
/// いずれの場合もキャッシュ済みのスナップショットは変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// JSONのオブジェクトでも配列でもない
    #[error("response was not parseable JSON-like structure")]
    NotStructured,

    /// 配列ではない
    #[error("response was not an array")]
    NotArray,

    /// 必須フィールドが欠落または空
    #[error("response entry {index} has no usable {field}")]
    InvalidEntry {
        /// 応答配列内の位置
        index: usize,
        /// 欠落していたフィールド名
        field: &'static str,
    },
}

/// consul-hosts error type
#[derive(Debug, Error)]
pub enum HostsError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// HTTP client error (catalog unreachable, TLS failure, non-2xx status)
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Malformed catalog response
    #[error("Invalid catalog response: {0}")]
    Shape(#[from] ShapeError),

    /// Service discovery failed
    #[error("Service discovery failed: {0}")]
    Discovery(String),

    /// Service is not being watched
    #[error("Service not watched: {0}")]
    UnknownService(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HostsError {
    /// 起動を継続できない設定系のエラーかどうか
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostsError::Common(_) | HostsError::Discovery(_) | HostsError::Internal(_)
        )
    }
}

/// consul-hosts result type
pub type HostsResult<T> = Result<T, HostsError>;
