//! カタログ応答の型定義
//!
//! `/v1/catalog/service/:name` と `/v1/catalog/services` の応答を検証・変換する

use crate::error::ShapeError;
use serde_json::Value;

/// サービスを提供する1エンドポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// ノード名（`Node`）
    pub node: String,
    /// アドレス（`Address`）
    pub address: String,
    /// サービスポート（`ServicePort`）
    pub service_port: String,
}

impl CatalogEntry {
    /// 応答配列の1要素から生成する
    ///
    /// 3フィールドのどれかが欠落・空・0の場合は欠落したフィールド名を返す。
    pub fn from_value(value: &Value) -> Result<Self, &'static str> {
        let node = field_text(value, "Node").ok_or("Node")?;
        let address = field_text(value, "Address").ok_or("Address")?;
        let service_port = field_text(value, "ServicePort").ok_or("ServicePort")?;
        Ok(Self {
            node,
            address,
            service_port,
        })
    }

    /// `node:address:port` 形式の1行（改行なし）
    pub fn line(&self) -> String {
        format!("{}:{}:{}", self.node, self.address, self.service_port)
    }
}

fn field_text(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(number_text(n)),
        _ => None,
    }
}

/// 整数値の浮動小数（`8080.0`）は小数部なしで表す
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// サービスノード一覧の応答を検証する
///
/// 1要素でも不正なら全体を拒否する（部分更新はしない）。
pub fn parse_service_nodes(body: &Value) -> Result<Vec<CatalogEntry>, ShapeError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(_) => return Err(ShapeError::NotArray),
        _ => return Err(ShapeError::NotStructured),
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            CatalogEntry::from_value(item).map_err(|field| ShapeError::InvalidEntry { index, field })
        })
        .collect()
}

/// エンドポイント一覧を配信用テキストに整形する
///
/// 応答順を保持し、各行は改行で終わる。
pub fn render_snapshot(entries: &[CatalogEntry]) -> String {
    entries.iter().fold(String::new(), |mut out, entry| {
        out.push_str(&entry.line());
        out.push('\n');
        out
    })
}

/// サービス一覧（`/v1/catalog/services`）の応答からサービス名を取り出す
///
/// 名前順に並べて返す。オブジェクト以外の応答は `None`。
pub fn parse_service_directory(body: &Value) -> Option<Vec<String>> {
    let mut names: Vec<String> = body.as_object()?.keys().cloned().collect();
    names.sort();
    Some(names)
}
