//! カタログポーリング
//!
//! サービスごとに独立したタイマーでカタログを定期取得する。
//! 初回取得は起動時にばらつかせ、カタログへの同時アクセスを避ける。

pub mod scheduler;

pub use scheduler::{initial_delay, poll_once, PollScheduler, WatchHandle, WatchPhase};
