//! タスクモジュール

pub mod console;
pub mod link;
pub mod motor_control;

pub use console::console_task;
pub use link::{heartbeat_task, link_rx_task, link_tx_task};
pub use motor_control::motor_control_task;
