//! シリアルコンソールタスク
//!
//! USART2から1行ごとにシャフト角度 [rad] を受け付け、受理した値をエコーします。

use core::fmt::Write;

use dfoc_node::console::Console;
use embassy_stm32::{mode::Async, usart::Uart};
use heapless::{String, Vec};

use crate::state::SETPOINT;

const LINE_CAPACITY: usize = 32;

#[embassy_executor::task]
pub async fn console_task(uart: Uart<'static, Async>) {
    info!("Console task started");

    let (mut tx, mut rx) = uart.split();
    let mut console = Console::<LINE_CAPACITY>::new();
    let mut buf = [0u8; LINE_CAPACITY];

    loop {
        let n = match rx.read_until_idle(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Console RX error: {}", e);
                continue;
            }
        };

        let mut accepted: Vec<f32, 4> = Vec::new();
        console.feed(&buf[..n], &SETPOINT, |value| {
            let _ = accepted.push(value);
        });

        for value in accepted {
            let mut line: String<LINE_CAPACITY> = String::new();
            if write!(line, "target {:.4}\r\n", value).is_ok() {
                if let Err(e) = tx.write(line.as_bytes()).await {
                    warn!("Console TX error: {}", e);
                }
            }
        }
    }
}
