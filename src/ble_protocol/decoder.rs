//! Command frame decoder.
//!
//! Every offset is checked before it is read and a frame either yields one
//! value for this device or changes nothing.

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::codec::{
    int16_to_float, read_i16_be, DataType, Framing, PacketType, LEGACY_MULTI_VALUES,
};
use crate::config::params::protocol::MAX_DEVICES;
use crate::setpoint::{Offer, SetpointCell};
use crate::telemetry::Response;

const MIN_FRAME_LEN: usize = 3;

/// Reasons a frame is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Shorter than the minimum for its packet type
    TooShort { len: usize, min: usize },
    /// Length matches none of the accepted layouts
    LengthMismatch { len: usize },
    /// A computed field offset lies beyond the frame
    OffsetOutOfRange { offset: usize, len: usize },
    /// Packet type byte is not SINGLE, MULTI or MULTI_STRUCT
    UnknownPacketType(u8),
}

/// The value addressed to this device in one frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceCommandFrame {
    /// Device the value was addressed to
    pub device_id: u8,
    pub framing: Framing,
    pub packet_type: PacketType,
    pub data_type: DataType,
    pub raw_value: i16,
    /// `raw_value / scale`
    pub value: f32,
}

/// Last MULTI_STRUCT entry addressed to this device
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LastStructuredCommand {
    pub packet_type: PacketType,
    pub device_id: u8,
    /// Data type byte as received
    pub data_type: u8,
    pub raw_value: i16,
    pub scaled_value: f32,
    /// Number of entries in the frame
    pub count: u8,
}

/// Result of decoding one frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decoded {
    /// The frame carries a value for this device
    Addressed(DeviceCommandFrame),
    /// Well-formed, but nothing in it is for this device
    NotAddressed,
}

/// Result of [`CommandDecoder::handle_frame`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeOutcome {
    /// Setpoint offered; `response` acknowledges the stored value
    Accepted {
        frame: DeviceCommandFrame,
        offer: Offer,
        response: Response,
    },
    /// Addressing miss, no response
    NotAddressed,
}

/// Location of this device's value within a MULTI frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    At(usize),
    Absent,
}

/// Verdict of one MULTI layout candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeMatch {
    Match(Slot),
    NoMatch,
    Reject(DecodeError),
}

type ShapeValidator = fn(data: &[u8], base: usize, own_id: u8) -> ShapeMatch;

/// MULTI layouts in the order they are tried
const MULTI_SHAPES: [ShapeValidator; 2] = [multi_slice_shape, multi_legacy_shape];

/// `type, dt, start, count, values…` with `len == base + 4 + 2·count`
fn multi_slice_shape(data: &[u8], base: usize, own_id: u8) -> ShapeMatch {
    let (Some(&start), Some(&count)) = (data.get(base + 2), data.get(base + 3)) else {
        return ShapeMatch::NoMatch;
    };

    let ids_ok = (1..=MAX_DEVICES).contains(&start) && count >= 1;
    let values_at = base + 4;
    if !ids_ok || data.len() != values_at + 2 * count as usize {
        return ShapeMatch::NoMatch;
    }

    if own_id < start || own_id - start >= count {
        return ShapeMatch::Match(Slot::Absent);
    }

    let offset = values_at + 2 * (own_id - start) as usize;
    if offset + 2 > data.len() {
        return ShapeMatch::Reject(DecodeError::OffsetOutOfRange {
            offset,
            len: data.len(),
        });
    }
    ShapeMatch::Match(Slot::At(offset))
}

/// `type, dt, v1..v10` with `len == base + 22`
fn multi_legacy_shape(data: &[u8], base: usize, own_id: u8) -> ShapeMatch {
    let values_at = base + 2;
    if data.len() != values_at + 2 * LEGACY_MULTI_VALUES {
        return ShapeMatch::NoMatch;
    }

    if own_id == 0 || own_id as usize > LEGACY_MULTI_VALUES {
        return ShapeMatch::Match(Slot::Absent);
    }
    ShapeMatch::Match(Slot::At(values_at + 2 * (own_id as usize - 1)))
}

fn value_frame(
    data: &[u8],
    device_id: u8,
    framing: Framing,
    packet_type: PacketType,
    data_type: DataType,
    offset: usize,
) -> Result<DeviceCommandFrame, DecodeError> {
    let raw_value = read_i16_be(data, offset).ok_or(DecodeError::OffsetOutOfRange {
        offset,
        len: data.len(),
    })?;
    Ok(DeviceCommandFrame {
        device_id,
        framing,
        packet_type,
        data_type,
        raw_value,
        value: int16_to_float(raw_value, data_type.scale()),
    })
}

fn field(data: &[u8], offset: usize) -> Result<u8, DecodeError> {
    data.get(offset).copied().ok_or(DecodeError::TooShort {
        len: data.len(),
        min: offset + 1,
    })
}

/// Stateful decoder for one device id
pub struct CommandDecoder {
    device_id: u8,
    last_structured: Option<LastStructuredCommand>,
}

impl CommandDecoder {
    pub const fn new(device_id: u8) -> Self {
        Self {
            device_id,
            last_structured: None,
        }
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    pub fn last_structured(&self) -> Option<LastStructuredCommand> {
        self.last_structured
    }

    /// Decode one frame without touching any setpoint
    pub fn decode(&mut self, data: &[u8]) -> Result<Decoded, DecodeError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(DecodeError::TooShort {
                len: data.len(),
                min: MIN_FRAME_LEN,
            });
        }

        let framing = Framing::detect(data);
        let base = framing.base();
        let type_byte = data[base];
        let packet_type =
            PacketType::from_byte(type_byte).ok_or(DecodeError::UnknownPacketType(type_byte))?;

        match packet_type {
            PacketType::Single => self.decode_single(data, framing),
            PacketType::Multi => self.decode_multi(data, framing),
            PacketType::MultiStruct => self.decode_multi_struct(data, framing),
        }
    }

    fn decode_single(&self, data: &[u8], framing: Framing) -> Result<Decoded, DecodeError> {
        let min = match framing {
            Framing::Framed => 7,
            Framing::Unframed => 6,
        };
        if data.len() < min {
            return Err(DecodeError::TooShort {
                len: data.len(),
                min,
            });
        }

        let base = framing.base();
        let data_type = DataType::from_byte(field(data, base + 1)?);
        let id = field(data, base + 2)?;
        if id != self.device_id {
            trace!("SINGLE for device {}, not {}", id, self.device_id);
            return Ok(Decoded::NotAddressed);
        }

        value_frame(data, id, framing, PacketType::Single, data_type, base + 3).map(Decoded::Addressed)
    }

    fn decode_multi(&self, data: &[u8], framing: Framing) -> Result<Decoded, DecodeError> {
        let base = framing.base();
        let data_type = DataType::from_byte(field(data, base + 1)?);

        for shape in MULTI_SHAPES {
            match shape(data, base, self.device_id) {
                ShapeMatch::NoMatch => continue,
                ShapeMatch::Reject(e) => return Err(e),
                ShapeMatch::Match(Slot::Absent) => {
                    trace!("MULTI without a value for device {}", self.device_id);
                    return Ok(Decoded::NotAddressed);
                }
                ShapeMatch::Match(Slot::At(offset)) => {
                    return value_frame(data, self.device_id, framing, PacketType::Multi, data_type, offset)
                        .map(Decoded::Addressed);
                }
            }
        }

        Err(DecodeError::LengthMismatch { len: data.len() })
    }

    fn decode_multi_struct(&mut self, data: &[u8], framing: Framing) -> Result<Decoded, DecodeError> {
        let base = framing.base();
        let items_at = base + 3;
        if data.len() < items_at {
            return Err(DecodeError::TooShort {
                len: data.len(),
                min: items_at,
            });
        }

        let data_byte = data[base + 1];
        let data_type = DataType::from_byte(data_byte);
        let count = data[base + 2];
        let expected = items_at + 3 * count as usize;
        if data.len() < expected {
            return Err(DecodeError::TooShort {
                len: data.len(),
                min: expected,
            });
        }

        let items = data[items_at..expected].chunks_exact(3);
        for (i, item) in items.enumerate() {
            if item[0] != self.device_id {
                continue;
            }

            let at = items_at + 3 * i + 1;
            let frame = value_frame(data, item[0], framing, PacketType::MultiStruct, data_type, at)?;
            self.last_structured = Some(LastStructuredCommand {
                packet_type: PacketType::MultiStruct,
                device_id: self.device_id,
                data_type: data_byte,
                raw_value: frame.raw_value,
                scaled_value: frame.value,
                count,
            });
            return Ok(Decoded::Addressed(frame));
        }

        trace!("MULTI_STRUCT has no entry for device {}", self.device_id);
        Ok(Decoded::NotAddressed)
    }

    /// Decode a frame and offer its value to `setpoint`
    ///
    /// # Returns
    /// * `Ok(Accepted)` with the acknowledgement to send
    /// * `Ok(NotAddressed)` for addressing misses, nothing to send
    /// * `Err(e)` for malformed frames; see [`CommandDecoder::error_response`]
    pub fn handle_frame<M: RawMutex>(
        &mut self,
        data: &[u8],
        setpoint: &SetpointCell<M>,
    ) -> Result<DecodeOutcome, DecodeError> {
        let frame = match self.decode(data) {
            Ok(Decoded::Addressed(frame)) => frame,
            Ok(Decoded::NotAddressed) => return Ok(DecodeOutcome::NotAddressed),
            Err(e) => {
                warn!("Frame dropped ({} bytes): {}", data.len(), e);
                return Err(e);
            }
        };

        let offer = setpoint.offer(frame.value, frame.data_type.unit());
        match offer {
            Offer::Updated(sp) => debug!("Setpoint updated: {}", sp.value),
            Offer::Unchanged(sp) => trace!("Setpoint unchanged: {}", sp.value),
        }

        Ok(DecodeOutcome::Accepted {
            frame,
            offer,
            response: Response::Ack {
                device_id: self.device_id,
                packet_type: frame.packet_type,
                value: offer.stored().value,
            },
        })
    }

    /// Response owed for a dropped frame, if any
    pub fn error_response(&self, error: &DecodeError) -> Option<Response> {
        match error {
            DecodeError::UnknownPacketType(_) => Some(Response::UnknownPacket {
                device_id: self.device_id,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble_protocol::codec::{
        encode_multi_legacy, encode_multi_slice, encode_multi_struct, encode_single,
    };
    use crate::setpoint::SetpointUnit;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type TestCell = SetpointCell<CriticalSectionRawMutex>;

    fn addressed(result: Result<Decoded, DecodeError>) -> DeviceCommandFrame {
        match result {
            Ok(Decoded::Addressed(frame)) => frame,
            other => panic!("expected addressed frame, got {:?}", other),
        }
    }

    #[test]
    fn test_framed_single_scenario() {
        let cell = TestCell::new();
        let mut decoder = CommandDecoder::new(6);
        let outcome = decoder
            .handle_frame(&[0xAA, 0x55, 0x01, 0x00, 0x06, 0x00, 0x64], &cell)
            .unwrap();

        let DecodeOutcome::Accepted { frame, response, .. } = outcome else {
            panic!("not accepted");
        };
        assert_eq!(frame.device_id, 6);
        assert_eq!(frame.framing, Framing::Framed);
        assert_eq!(frame.value, 10.0);
        assert_eq!(response.render().unwrap().as_str(), "6:SINGLE:10.00");
        assert_eq!(cell.take().map(|s| s.value), Some(10.0));
    }

    #[test]
    fn test_unframed_single() {
        let mut decoder = CommandDecoder::new(6);
        let frame = addressed(decoder.decode(&[0x01, 0x02, 0x06, 0xFA, 0x24, 0x00]));
        assert_eq!(frame.framing, Framing::Unframed);
        assert_eq!(frame.data_type, DataType::Current);
        assert!((frame.value + 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_too_short() {
        let mut decoder = CommandDecoder::new(6);
        assert_eq!(
            decoder.decode(&[0xAA, 0x55, 0x01, 0x00, 0x06, 0x00]),
            Err(DecodeError::TooShort { len: 6, min: 7 })
        );
        assert_eq!(
            decoder.decode(&[0x01, 0x00, 0x06, 0x00, 0x64]),
            Err(DecodeError::TooShort { len: 5, min: 6 })
        );
        assert_eq!(
            decoder.decode(&[0xAA, 0x55]),
            Err(DecodeError::TooShort { len: 2, min: 3 })
        );
    }

    #[test]
    fn test_single_other_device_is_silent() {
        let cell = TestCell::new();
        let mut decoder = CommandDecoder::new(6);
        let outcome = decoder.handle_frame(&[0xAA, 0x55, 0x01, 0x00, 0x07, 0x00, 0x64], &cell);
        assert_eq!(outcome, Ok(DecodeOutcome::NotAddressed));
        assert!(!cell.is_dirty());
    }

    #[test]
    fn test_multi_slice() {
        let mut buf = [0u8; 64];
        let n = encode_multi_slice(&mut buf, true, DataType::Angle, 4, &[1.0, 2.0, 3.0, 4.0]).unwrap();

        let mut decoder = CommandDecoder::new(6);
        let frame = addressed(decoder.decode(&buf[..n]));
        assert_eq!(frame.packet_type, PacketType::Multi);
        assert_eq!(frame.device_id, 6);
        assert_eq!(frame.value, 3.0);

        let mut outside = CommandDecoder::new(8);
        assert_eq!(outside.decode(&buf[..n]), Ok(Decoded::NotAddressed));
        let mut below = CommandDecoder::new(3);
        assert_eq!(below.decode(&buf[..n]), Ok(Decoded::NotAddressed));
    }

    #[test]
    fn test_unframed_legacy_velocity_scenario() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let mut buf = [0u8; 64];
        let n = encode_multi_legacy(&mut buf, false, DataType::Velocity, &values).unwrap();
        assert_eq!(n, 22);

        let mut decoder = CommandDecoder::new(3);
        let frame = addressed(decoder.decode(&buf[..n]));
        assert_eq!(frame.data_type, DataType::Velocity);
        assert_eq!(frame.device_id, 3);
        assert_eq!(frame.value, 3.0);

        let cell = TestCell::new();
        let mut eleven = CommandDecoder::new(11);
        assert_eq!(eleven.handle_frame(&buf[..n], &cell), Ok(DecodeOutcome::NotAddressed));
        assert!(!cell.is_dirty());
    }

    #[test]
    fn test_framed_legacy() {
        let values = [0.5; 10];
        let mut buf = [0u8; 64];
        let n = encode_multi_legacy(&mut buf, true, DataType::Angle, &values).unwrap();
        assert_eq!(n, 24);
        let mut decoder = CommandDecoder::new(10);
        assert_eq!(addressed(decoder.decode(&buf[..n])).value, 0.5);
    }

    #[test]
    fn test_multi_no_layout() {
        let mut decoder = CommandDecoder::new(6);
        // Slice header claims 3 values but carries 2
        let data = [0xAA, 0x55, 0x02, 0x00, 0x05, 0x03, 0x00, 0x01, 0x00, 0x02];
        assert_eq!(decoder.decode(&data), Err(DecodeError::LengthMismatch { len: 10 }));
    }

    #[test]
    fn test_multi_struct_first_match_wins() {
        let mut buf = [0u8; 64];
        let items = [(2, 1.0), (6, 2.5), (6, 9.0)];
        let n = encode_multi_struct(&mut buf, true, DataType::Angle, &items).unwrap();

        let cell = TestCell::new();
        let mut decoder = CommandDecoder::new(6);
        let outcome = decoder.handle_frame(&buf[..n], &cell).unwrap();
        let DecodeOutcome::Accepted { frame, response, .. } = outcome else {
            panic!("not accepted");
        };
        assert_eq!(frame.device_id, 6);
        assert_eq!(response.render().unwrap().as_str(), "6:MULTI_STRUCT:2.50");

        let last = decoder.last_structured().unwrap();
        assert_eq!(last.raw_value, 25);
        assert_eq!(last.scaled_value, 2.5);
        assert_eq!(last.count, 3);
        assert_eq!(last.data_type, 0x00);
    }

    #[test]
    fn test_multi_struct_trailing_bytes_and_truncation() {
        let mut decoder = CommandDecoder::new(1);
        // count 1 with a trailing byte
        let data = [0x03, 0x00, 0x01, 0x01, 0x00, 0x0A, 0xFF];
        assert_eq!(addressed(decoder.decode(&data)).value, 1.0);

        // count 2 but only one entry present
        let data = [0x03, 0x00, 0x02, 0x01, 0x00, 0x0A];
        assert_eq!(decoder.decode(&data), Err(DecodeError::TooShort { len: 6, min: 9 }));
        assert_eq!(decoder.last_structured().map(|l| l.count), Some(1));
    }

    #[test]
    fn test_multi_struct_miss_is_silent() {
        let mut decoder = CommandDecoder::new(9);
        let data = [0x03, 0x00, 0x01, 0x01, 0x00, 0x0A];
        assert_eq!(decoder.decode(&data), Ok(Decoded::NotAddressed));
        assert!(decoder.last_structured().is_none());
    }

    #[test]
    fn test_unknown_packet_type() {
        let cell = TestCell::new();
        let mut decoder = CommandDecoder::new(6);
        let err = decoder.handle_frame(&[0x7E, 0x00, 0x06, 0x00], &cell).unwrap_err();
        assert_eq!(err, DecodeError::UnknownPacketType(0x7E));
        let response = decoder.error_response(&err).unwrap();
        assert_eq!(response.render().unwrap().as_str(), "6:ERROR:UNKNOWN_PACKET");

        // Marker with an unknown type falls back to byte 0 as the type
        let err = decoder.handle_frame(&[0xAA, 0x55, 0x09, 0x00], &cell).unwrap_err();
        assert_eq!(err, DecodeError::UnknownPacketType(0xAA));
        assert!(decoder.error_response(&DecodeError::LengthMismatch { len: 4 }).is_none());
    }

    #[test]
    fn test_repeat_is_acked_without_rearming() {
        let cell = TestCell::new();
        let mut decoder = CommandDecoder::new(6);
        let mut buf = [0u8; 8];
        let n = encode_single(&mut buf, true, DataType::Angle, 6, 10.0).unwrap();

        decoder.handle_frame(&buf[..n], &cell).unwrap();
        assert!(cell.take().is_some());

        let outcome = decoder.handle_frame(&buf[..n], &cell).unwrap();
        let DecodeOutcome::Accepted { offer, response, .. } = outcome else {
            panic!("not accepted");
        };
        assert!(matches!(offer, Offer::Unchanged(_)));
        assert_eq!(response.render().unwrap().as_str(), "6:SINGLE:10.00");
        assert!(!cell.is_dirty());
    }

    #[test]
    fn test_unit_follows_data_type() {
        let cell = TestCell::new();
        let mut decoder = CommandDecoder::new(6);
        let mut buf = [0u8; 8];
        let n = encode_single(&mut buf, true, DataType::Current, 6, 1.25).unwrap();
        decoder.handle_frame(&buf[..n], &cell).unwrap();
        assert_eq!(cell.current().unit, SetpointUnit::Current);
        assert!((cell.current().value - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_arbitrary_bytes_never_panic() {
        let cell = TestCell::new();
        let mut decoder = CommandDecoder::new(6);
        let mut seed: u32 = 0x1234_5678;
        let mut buf = [0u8; 40];
        for round in 0..5_000 {
            let len = round % buf.len();
            for b in buf.iter_mut().take(len) {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                *b = (seed >> 24) as u8;
            }
            // Bias toward valid headers
            if len > 3 && round % 3 == 0 {
                buf[0] = 0xAA;
                buf[1] = 0x55;
                buf[2] = (round % 4) as u8;
            }
            let _ = decoder.handle_frame(&buf[..len], &cell);
        }
    }
}
