// Wire constants and fixed-point codec for the wireless command protocol

use crate::config::params::protocol::{ANGLE_SCALE, CURRENT_SCALE, MAX_DEVICES, VELOCITY_SCALE};
use crate::setpoint::SetpointUnit;

/// Optional two-byte frame marker
pub const FRAME_MARKER: [u8; 2] = [0xAA, 0x55];

/// Number of values in the legacy fixed-size MULTI packet
pub const LEGACY_MULTI_VALUES: usize = 10;

/// Raw packet type bytes
pub mod packet_ids {
    pub const SINGLE: u8 = 0x01;
    pub const MULTI: u8 = 0x02;
    pub const MULTI_STRUCT: u8 = 0x03;
}

/// Raw data type bytes
pub mod data_ids {
    pub const ANGLE: u8 = 0x00;
    pub const VELOCITY: u8 = 0x01;
    pub const CURRENT: u8 = 0x02;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketType {
    Single,
    Multi,
    MultiStruct,
}

impl PacketType {
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            packet_ids::SINGLE => Some(PacketType::Single),
            packet_ids::MULTI => Some(PacketType::Multi),
            packet_ids::MULTI_STRUCT => Some(PacketType::MultiStruct),
            _ => None,
        }
    }

    pub const fn to_byte(self) -> u8 {
        match self {
            PacketType::Single => packet_ids::SINGLE,
            PacketType::Multi => packet_ids::MULTI,
            PacketType::MultiStruct => packet_ids::MULTI_STRUCT,
        }
    }

    /// Name used in acknowledgements
    pub const fn label(self) -> &'static str {
        match self {
            PacketType::Single => "SINGLE",
            PacketType::Multi => "MULTI",
            PacketType::MultiStruct => "MULTI_STRUCT",
        }
    }
}

/// Interpretation of a packed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataType {
    Angle,
    Velocity,
    Current,
}

impl DataType {
    /// Unrecognized tags fall back to angle
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            data_ids::VELOCITY => DataType::Velocity,
            data_ids::CURRENT => DataType::Current,
            _ => DataType::Angle,
        }
    }

    pub const fn to_byte(self) -> u8 {
        match self {
            DataType::Angle => data_ids::ANGLE,
            DataType::Velocity => data_ids::VELOCITY,
            DataType::Current => data_ids::CURRENT,
        }
    }

    /// Fixed-point divisor of the packed value
    pub const fn scale(self) -> f32 {
        match self {
            DataType::Angle => ANGLE_SCALE,
            DataType::Velocity => VELOCITY_SCALE,
            DataType::Current => CURRENT_SCALE,
        }
    }

    /// Setpoint unit of a decoded value
    pub const fn unit(self) -> SetpointUnit {
        match self {
            DataType::Angle => SetpointUnit::LinkAngle,
            DataType::Velocity => SetpointUnit::Velocity,
            DataType::Current => SetpointUnit::Current,
        }
    }
}

/// Whether a frame starts with [`FRAME_MARKER`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Framing {
    Framed,
    Unframed,
}

impl Framing {
    /// Detect framing
    ///
    /// A frame is framed only when the marker is followed by a known packet
    /// type; anything else is parsed from byte 0.
    pub fn detect(data: &[u8]) -> Self {
        match data {
            [0xAA, 0x55, t, ..] if PacketType::from_byte(*t).is_some() => Framing::Framed,
            _ => Framing::Unframed,
        }
    }

    /// Offset of the packet type byte
    pub const fn base(self) -> usize {
        match self {
            Framing::Framed => 2,
            Framing::Unframed => 0,
        }
    }
}

/// Read a big-endian i16 at `offset`
pub fn read_i16_be(data: &[u8], offset: usize) -> Option<i16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(i16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Unpack a fixed-point value
pub fn int16_to_float(raw: i16, scale: f32) -> f32 {
    raw as f32 / scale
}

/// Pack a value as fixed point, truncating toward zero and saturating at the
/// i16 range
pub fn float_to_int16(value: f32, scale: f32) -> i16 {
    (value * scale) as i16
}

/// Error returned by the encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Output buffer too small
    BufferTooSmall,
    /// Slice start outside `1..=MAX_DEVICES`, empty slice or too many entries
    InvalidLayout,
}

struct Writer<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let end = self.len + bytes.len();
        let slot = self
            .buf
            .get_mut(self.len..end)
            .ok_or(EncodeError::BufferTooSmall)?;
        slot.copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    fn header(&mut self, framed: bool, packet: PacketType, data: DataType) -> Result<(), EncodeError> {
        if framed {
            self.push(&FRAME_MARKER)?;
        }
        self.push(&[packet.to_byte(), data.to_byte()])
    }

    fn value(&mut self, value: f32, data: DataType) -> Result<(), EncodeError> {
        self.push(&float_to_int16(value, data.scale()).to_be_bytes())
    }
}

/// Encode a SINGLE packet: `[AA 55] 01 DT ID VH VL`
///
/// Unframed packets get a trailing pad byte to reach the minimum length.
///
/// # Returns
/// Number of bytes written
pub fn encode_single(
    buf: &mut [u8],
    framed: bool,
    data: DataType,
    device_id: u8,
    value: f32,
) -> Result<usize, EncodeError> {
    let mut w = Writer::new(buf);
    w.header(framed, PacketType::Single, data)?;
    w.push(&[device_id])?;
    w.value(value, data)?;
    if !framed {
        w.push(&[0x00])?;
    }
    Ok(w.len)
}

/// Encode a MULTI slice packet: `[AA 55] 02 DT START COUNT V(start)..`
pub fn encode_multi_slice(
    buf: &mut [u8],
    framed: bool,
    data: DataType,
    start_id: u8,
    values: &[f32],
) -> Result<usize, EncodeError> {
    if !(1..=MAX_DEVICES).contains(&start_id) || values.is_empty() || values.len() > u8::MAX as usize {
        return Err(EncodeError::InvalidLayout);
    }
    let mut w = Writer::new(buf);
    w.header(framed, PacketType::Multi, data)?;
    w.push(&[start_id, values.len() as u8])?;
    for &v in values {
        w.value(v, data)?;
    }
    Ok(w.len)
}

/// Encode a legacy MULTI packet: `[AA 55] 02 DT V1..V10`
pub fn encode_multi_legacy(
    buf: &mut [u8],
    framed: bool,
    data: DataType,
    values: &[f32; LEGACY_MULTI_VALUES],
) -> Result<usize, EncodeError> {
    let mut w = Writer::new(buf);
    w.header(framed, PacketType::Multi, data)?;
    for &v in values {
        w.value(v, data)?;
    }
    Ok(w.len)
}

/// Encode a MULTI_STRUCT packet: `[AA 55] 03 DT COUNT (ID VH VL)×COUNT`
pub fn encode_multi_struct(
    buf: &mut [u8],
    framed: bool,
    data: DataType,
    items: &[(u8, f32)],
) -> Result<usize, EncodeError> {
    if items.len() > u8::MAX as usize {
        return Err(EncodeError::InvalidLayout);
    }
    let mut w = Writer::new(buf);
    w.header(framed, PacketType::MultiStruct, data)?;
    w.push(&[items.len() as u8])?;
    for &(id, v) in items {
        w.push(&[id])?;
        w.value(v, data)?;
    }
    Ok(w.len)
}
