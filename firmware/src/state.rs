//! グローバル共有状態管理
//!
//! タスク間で共有される状態を管理します。

use core::sync::atomic::AtomicBool;

use dfoc_node::{Response, SetpointCell};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// 最新の目標値
/// リンク・コンソールタスクが書き込み、制御ループが消費する
pub static SETPOINT: SetpointCell<CriticalSectionRawMutex> = SetpointCell::new();

/// リンク送信待ちの応答
pub static RESPONSES: Channel<CriticalSectionRawMutex, Response, 4> = Channel::new();

/// BLEモジュールの接続状態ピン
pub static PEER_CONNECTED: AtomicBool = AtomicBool::new(false);
