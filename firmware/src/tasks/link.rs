//! BLEリンクタスク
//!
//! BLEモジュールは透過モードでUSART1に接続されています。
//! アイドルで区切られたバイト列を1フレームとして扱います。
//! STATEピンはセントラル接続中にHighになります。

use core::sync::atomic::Ordering;

use dfoc_node::{CommandDecoder, DecodeOutcome, HeartbeatTimer, ResponseEmitter};
use embassy_stm32::{
    gpio::Input,
    mode::Async,
    usart::{UartRx, UartTx},
};
use embassy_time::{Duration, Instant, Ticker};

use crate::state::{PEER_CONNECTED, RESPONSES, SETPOINT};

/// 最長フレーム（マーカー付きレガシーMULTI）
const FRAME_BUFFER: usize = 64;

/// 受信フレームを目標値に反映し、応答をキューに積む
#[embassy_executor::task]
pub async fn link_rx_task(mut rx: UartRx<'static, Async>, mut decoder: CommandDecoder) {
    info!("Link RX task started: device id {}", decoder.device_id());

    let mut buf = [0u8; FRAME_BUFFER];
    loop {
        let n = match rx.read_until_idle(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Link RX error: {}", e);
                continue;
            }
        };
        if n == 0 {
            continue;
        }

        let response = match decoder.handle_frame(&buf[..n], &SETPOINT) {
            Ok(DecodeOutcome::Accepted { response, .. }) => Some(response),
            Ok(DecodeOutcome::NotAddressed) => None,
            Err(e) => decoder.error_response(&e),
        };

        if let Some(response) = response {
            if RESPONSES.try_send(response).is_err() {
                warn!("Response queue full, dropping {}", response);
            }
        }
    }
}

/// 接続中のみキューの応答を送信
#[embassy_executor::task]
pub async fn link_tx_task(mut tx: UartTx<'static, Async>) {
    let mut emitter = ResponseEmitter::new();

    loop {
        let response = RESPONSES.receive().await;
        let connected = PEER_CONNECTED.load(Ordering::Relaxed);
        let Some(text) = emitter.render(&response, connected) else {
            continue;
        };

        if let Err(e) = tx.write(text.as_bytes()).await {
            warn!("Link TX error: {}", e);
        }
        trace!("Sent {} responses, dropped {}", emitter.sent(), emitter.dropped());
    }
}

/// 接続ピンを監視し、接続中はハートビートを送信
#[embassy_executor::task]
pub async fn heartbeat_task(state_pin: Input<'static>, mut timer: HeartbeatTimer) {
    let mut ticker = Ticker::every(Duration::from_millis(100));
    let mut was_connected = false;

    loop {
        ticker.next().await;

        let connected = state_pin.is_high();
        PEER_CONNECTED.store(connected, Ordering::Relaxed);
        if connected != was_connected {
            info!("Peer {}", if connected { "connected" } else { "disconnected" });
            was_connected = connected;
        }

        if let Some(beat) = timer.poll(Instant::now().as_millis(), connected) {
            if RESPONSES.try_send(beat).is_err() {
                warn!("Response queue full, dropping heartbeat");
            }
        }
    }
}
