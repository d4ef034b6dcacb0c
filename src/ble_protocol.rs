//! Wireless command protocol.
//!
//! Nodes share one broadcast link. A frame optionally starts with the `AA 55`
//! marker, followed by the packet type byte and a layout that depends on it:
//!
//! | Type | Layout (after the optional marker) |
//! | ---- | ---------------------------------- |
//! | `01` SINGLE | `01 DT ID VH VL` (unframed: plus one pad byte) |
//! | `02` MULTI slice | `02 DT START COUNT V(start)..V(start+count-1)` |
//! | `02` MULTI legacy | `02 DT V1..V10` |
//! | `03` MULTI_STRUCT | `03 DT COUNT (ID VH VL)×COUNT` |
//!
//! Values are big-endian `i16` fixed point, divided by the scale of the data
//! type `DT` (angle 10, velocity 1, current 1000).

pub mod codec;
pub mod decoder;

pub use codec::{
    encode_multi_legacy, encode_multi_slice, encode_multi_struct, encode_single, float_to_int16,
    int16_to_float, DataType, EncodeError, Framing, PacketType,
};
pub use decoder::{
    CommandDecoder, DecodeError, DecodeOutcome, Decoded, DeviceCommandFrame,
    LastStructuredCommand,
};
