//! Text responses sent back over the wireless link.
//!
//! Responses are short ASCII lines rendered into a fixed-size buffer. Nothing
//! is queued: a response produced while no peer is connected is dropped.

use core::fmt::Write;

use heapless::String;

use crate::ble_protocol::PacketType;

/// Maximum rendered response length in bytes.
pub const RESPONSE_CAPACITY: usize = 32;

pub type ResponseText = String<RESPONSE_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// `"<id>:<TYPE>:<value>"` with the stored setpoint to two decimals.
    Ack {
        device_id: u8,
        packet_type: PacketType,
        value: f32,
    },
    /// `"<id>:ERROR:UNKNOWN_PACKET"`
    UnknownPacket { device_id: u8 },
    /// `"<id>:HEARTBEAT"`
    Heartbeat { device_id: u8 },
}

impl Response {
    /// Render the response text
    ///
    /// # Returns
    /// * `None` if the text does not fit into [`RESPONSE_CAPACITY`] bytes
    pub fn render(&self) -> Option<ResponseText> {
        let mut text = ResponseText::new();
        let written = match *self {
            Response::Ack {
                device_id,
                packet_type,
                value,
            } => write!(text, "{}:{}:{:.2}", device_id, packet_type.label(), value),
            Response::UnknownPacket { device_id } => {
                write!(text, "{}:ERROR:UNKNOWN_PACKET", device_id)
            }
            Response::Heartbeat { device_id } => write!(text, "{}:HEARTBEAT", device_id),
        };
        written.ok().map(|_| text)
    }
}

/// Gate between produced responses and the link.
#[derive(Debug, Default)]
pub struct ResponseEmitter {
    sent: u32,
    dropped: u32,
}

impl ResponseEmitter {
    pub const fn new() -> Self {
        Self {
            sent: 0,
            dropped: 0,
        }
    }

    /// Render `response` for transmission
    ///
    /// # Returns
    /// * `Some(text)` when a peer is connected
    /// * `None` when no peer is connected or the text does not fit
    pub fn render(&mut self, response: &Response, peer_connected: bool) -> Option<ResponseText> {
        if !peer_connected {
            self.dropped = self.dropped.wrapping_add(1);
            debug!("Response dropped: no peer connected");
            return None;
        }

        match response.render() {
            Some(text) => {
                self.sent = self.sent.wrapping_add(1);
                Some(text)
            }
            None => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("Response does not fit into {} bytes", RESPONSE_CAPACITY);
                None
            }
        }
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// Periodic liveness message while a peer is connected.
#[derive(Debug)]
pub struct HeartbeatTimer {
    device_id: u8,
    interval_ms: u64,
    last_ms: Option<u64>,
}

impl HeartbeatTimer {
    pub const fn new(device_id: u8, interval_ms: u64) -> Self {
        Self {
            device_id,
            interval_ms,
            last_ms: None,
        }
    }

    /// Check whether a heartbeat is due
    ///
    /// The interval restarts whenever the peer (re)connects.
    pub fn poll(&mut self, now_ms: u64, peer_connected: bool) -> Option<Response> {
        if !peer_connected {
            self.last_ms = None;
            return None;
        }

        match self.last_ms {
            None => {
                self.last_ms = Some(now_ms);
                None
            }
            Some(last) if now_ms.saturating_sub(last) >= self.interval_ms => {
                self.last_ms = Some(now_ms);
                Some(Response::Heartbeat {
                    device_id: self.device_id,
                })
            }
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_ack() {
        let ack = Response::Ack {
            device_id: 6,
            packet_type: PacketType::Single,
            value: 10.0,
        };
        assert_eq!(ack.render().unwrap().as_str(), "6:SINGLE:10.00");

        let ack = Response::Ack {
            device_id: 12,
            packet_type: PacketType::MultiStruct,
            value: -3.456,
        };
        assert_eq!(ack.render().unwrap().as_str(), "12:MULTI_STRUCT:-3.46");
    }

    #[test]
    fn test_render_error_and_heartbeat() {
        let unknown = Response::UnknownPacket { device_id: 6 };
        assert_eq!(unknown.render().unwrap().as_str(), "6:ERROR:UNKNOWN_PACKET");
        let hb = Response::Heartbeat { device_id: 6 };
        assert_eq!(hb.render().unwrap().as_str(), "6:HEARTBEAT");
    }

    #[test]
    fn test_render_widest_ack_fits() {
        let ack = Response::Ack {
            device_id: 20,
            packet_type: PacketType::MultiStruct,
            value: -32768.0,
        };
        assert_eq!(ack.render().unwrap().as_str(), "20:MULTI_STRUCT:-32768.00");
    }

    #[test]
    fn test_emitter_drops_without_peer() {
        let mut emitter = ResponseEmitter::new();
        let hb = Response::Heartbeat { device_id: 1 };
        assert!(emitter.render(&hb, false).is_none());
        assert!(emitter.render(&hb, true).is_some());
        assert_eq!(emitter.sent(), 1);
        assert_eq!(emitter.dropped(), 1);
    }

    #[test]
    fn test_heartbeat_interval() {
        let mut timer = HeartbeatTimer::new(6, 5_000);
        assert_eq!(timer.poll(0, true), None);
        assert_eq!(timer.poll(4_999, true), None);
        assert_eq!(timer.poll(5_000, true), Some(Response::Heartbeat { device_id: 6 }));
        assert_eq!(timer.poll(6_000, true), None);
        assert_eq!(timer.poll(10_000, true), Some(Response::Heartbeat { device_id: 6 }));
    }

    #[test]
    fn test_heartbeat_only_while_connected() {
        let mut timer = HeartbeatTimer::new(6, 5_000);
        timer.poll(0, true);
        assert_eq!(timer.poll(6_000, false), None);
        // Reconnect restarts the interval
        assert_eq!(timer.poll(7_000, true), None);
        assert_eq!(timer.poll(11_999, true), None);
        assert!(timer.poll(12_000, true).is_some());
    }
}
