//! NetSDR Control Messages
//! ----------------------
//!
//! Builds and parses the fixed-layout binary messages sent over the TCP
//! control channel.
//!
//! ```text
//! offset  size  field
//! 0       2     total message length, little-endian (13 bits) + message type (3 bits)
//! 2       1     control item code
//! 3       1     sub-code, always 0x00
//! 4..N    var   item specific payload
//! ```
//!
//! The device answers an accepted "set" with a byte-for-byte echo of the
//! request, and a rejected one with a bare `[0x02, 0x00]` header.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, CodecError};

pub const HEADER_LEN: usize = 4;
pub const SUB_CODE: u8 = 0x00;
pub const NAK_SENTINEL: [u8; 2] = [0x02, 0x00];
/// Lower 13 bits of the first header word hold the length.
pub const LENGTH_MASK: u16 = 0x1FFF;

const FREQUENCY_BYTES: usize = 5;

pub const NAK_MESSAGE: &str = "Received NAK: Control item not supported.";

/// A device-addressable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlItem {
    ReceiverState = 0x18,
    ReceiverFrequency = 0x20,
}

impl ControlItem {
    pub const ALL: [ControlItem; 2] = [ControlItem::ReceiverState, ControlItem::ReceiverFrequency];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn payload_len(self) -> usize {
        match self {
            ControlItem::ReceiverState => 4,
            ControlItem::ReceiverFrequency => 1 + FREQUENCY_BYTES,
        }
    }

    pub const fn message_len(self) -> usize {
        HEADER_LEN + self.payload_len()
    }

    /// Message used when the device answers with something that is neither
    /// an echo nor a NAK.
    pub const fn failure_message(self) -> &'static str {
        match self {
            ControlItem::ReceiverState => "Failed to set receiver state.",
            ControlItem::ReceiverFrequency => "Failed to set frequency.",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|item| item.code() == code)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ReceiverState {
    #[default]
    Stop = 0x01,
    Run = 0x02,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DataMode {
    /// Real A/D samples
    #[default]
    AD = 0x00,
    /// Complex I/Q samples
    IQ = 0x80,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CaptureMode {
    #[default]
    Contiguous16Bit = 0x00,
    Contiguous24Bit = 0x80,
    Fifo16Bit = 0x01,
    HardwareTriggered16Bit = 0x03,
    HardwareTriggered24Bit = 0x83,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ChannelId {
    #[default]
    Channel1 = 0x00,
    Channel2 = 0x02,
    All = 0xFF,
}

macro_rules! impl_from_byte {
    ($ty:ident, $field:literal, [$($variant:ident),+ $(,)?]) => {
        impl TryFrom<u8> for $ty {
            type Error = CodecError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                $(
                    if value == $ty::$variant as u8 {
                        return Ok($ty::$variant);
                    }
                )+
                Err(CodecError::InvalidValue { field: $field, value })
            }
        }
    };
}

impl_from_byte!(ReceiverState, "receiver state", [Stop, Run]);
impl_from_byte!(DataMode, "data mode", [AD, IQ]);
impl_from_byte!(
    CaptureMode,
    "capture mode",
    [Contiguous16Bit, Contiguous24Bit, Fifo16Bit, HardwareTriggered16Bit, HardwareTriggered24Bit]
);
impl_from_byte!(ChannelId, "channel id", [Channel1, Channel2, All]);

impl FromStr for ReceiverState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stop" | "idle" => Ok(ReceiverState::Stop),
            "run" | "start" => Ok(ReceiverState::Run),
            other => Err(format!("unknown receiver state '{other}' (expected stop or run)")),
        }
    }
}

impl FromStr for DataMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ad" => Ok(DataMode::AD),
            "iq" => Ok(DataMode::IQ),
            other => Err(format!("unknown data mode '{other}' (expected ad or iq)")),
        }
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "contiguous16" => Ok(CaptureMode::Contiguous16Bit),
            "contiguous24" => Ok(CaptureMode::Contiguous24Bit),
            "fifo16" => Ok(CaptureMode::Fifo16Bit),
            "triggered16" => Ok(CaptureMode::HardwareTriggered16Bit),
            "triggered24" => Ok(CaptureMode::HardwareTriggered24Bit),
            other => Err(format!(
                "unknown capture mode '{other}' (expected contiguous16, contiguous24, fifo16, triggered16 or triggered24)"
            )),
        }
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "ch1" => Ok(ChannelId::Channel1),
            "2" | "ch2" => Ok(ChannelId::Channel2),
            "all" => Ok(ChannelId::All),
            other => Err(format!("unknown channel '{other}' (expected 1, 2 or all)")),
        }
    }
}

/// Tuned frequency in Hz; nonzero and representable in 40 bits.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u64", into = "u64")]
pub struct FrequencyHz(u64);

impl FrequencyHz {
    pub const MAX: u64 = 0xFF_FFFF_FFFF;

    pub fn new(hz: u64) -> Result<Self, ClientError> {
        if hz == 0 || hz > Self::MAX {
            return Err(ClientError::FrequencyOutOfRange(hz));
        }
        Ok(FrequencyHz(hz))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for FrequencyHz {
    type Error = ClientError;

    fn try_from(hz: u64) -> Result<Self, Self::Error> {
        FrequencyHz::new(hz)
    }
}

impl From<FrequencyHz> for u64 {
    fn from(value: FrequencyHz) -> Self {
        value.0
    }
}

impl fmt::Display for FrequencyHz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

/// A fully encoded control message, ready to be written to the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    item: ControlItem,
    bytes: Vec<u8>,
}

impl ControlMessage {
    fn new(item: ControlItem, payload: &[u8]) -> Self {
        debug_assert_eq!(payload.len(), item.payload_len());
        let length = (HEADER_LEN + payload.len()) as u16;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&length.to_le_bytes());
        bytes.push(item.code());
        bytes.push(SUB_CODE);
        bytes.extend_from_slice(payload);
        ControlMessage { item, bytes }
    }

    /// Parses raw bytes back into a message, checking the header against the
    /// control item table.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the buffer is too short, the length field
    /// disagrees with the byte count, or the item code is unknown.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::TooShort {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let declared = (LittleEndian::read_u16(&bytes[0..2]) & LENGTH_MASK) as usize;
        if declared != bytes.len() {
            return Err(CodecError::LengthMismatch {
                declared,
                actual: bytes.len(),
            });
        }
        let item = ControlItem::from_code(bytes[2]).ok_or(CodecError::UnknownItem(bytes[2]))?;
        if bytes[3] != SUB_CODE {
            return Err(CodecError::InvalidValue {
                field: "sub-code",
                value: bytes[3],
            });
        }
        if bytes.len() != item.message_len() {
            return Err(CodecError::LengthMismatch {
                declared: item.message_len(),
                actual: bytes.len(),
            });
        }
        Ok(ControlMessage {
            item,
            bytes: bytes.to_vec(),
        })
    }

    pub fn item(&self) -> ControlItem {
        self.item
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Typed view of every control item this client knows how to set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSetting {
    ReceiverState {
        state: ReceiverState,
        data_mode: DataMode,
        capture_mode: CaptureMode,
        fifo_sample_count: u8,
    },
    Frequency {
        channel: ChannelId,
        frequency: FrequencyHz,
    },
}

impl ControlSetting {
    /// Builds a receiver state setting. A stopped receiver does not take mode
    /// parameters, so they are reset to their defaults.
    pub fn receiver_state(state: ReceiverState, data_mode: DataMode, capture_mode: CaptureMode, fifo_sample_count: u8) -> Self {
        match state {
            ReceiverState::Stop => ControlSetting::ReceiverState {
                state,
                data_mode: DataMode::default(),
                capture_mode: CaptureMode::default(),
                fifo_sample_count: 0,
            },
            ReceiverState::Run => ControlSetting::ReceiverState {
                state,
                data_mode,
                capture_mode,
                fifo_sample_count,
            },
        }
    }

    pub fn item(&self) -> ControlItem {
        match self {
            ControlSetting::ReceiverState { .. } => ControlItem::ReceiverState,
            ControlSetting::Frequency { .. } => ControlItem::ReceiverFrequency,
        }
    }

    pub fn encode(&self) -> ControlMessage {
        match *self {
            ControlSetting::ReceiverState {
                state,
                data_mode,
                capture_mode,
                fifo_sample_count,
            } => ControlMessage::new(
                ControlItem::ReceiverState,
                &[data_mode as u8, state as u8, capture_mode as u8, fifo_sample_count],
            ),
            ControlSetting::Frequency { channel, frequency } => {
                let mut payload = [0u8; 1 + FREQUENCY_BYTES];
                payload[0] = channel as u8;
                LittleEndian::write_uint(&mut payload[1..], frequency.get(), FREQUENCY_BYTES);
                ControlMessage::new(ControlItem::ReceiverFrequency, &payload)
            }
        }
    }

    /// # Errors
    ///
    /// Returns a [`CodecError::InvalidValue`] if a payload byte has no
    /// matching enum variant, or a zero frequency.
    pub fn decode(msg: &ControlMessage) -> Result<Self, CodecError> {
        let payload = msg.payload();
        match msg.item() {
            ControlItem::ReceiverState => Ok(ControlSetting::ReceiverState {
                data_mode: DataMode::try_from(payload[0])?,
                state: ReceiverState::try_from(payload[1])?,
                capture_mode: CaptureMode::try_from(payload[2])?,
                fifo_sample_count: payload[3],
            }),
            ControlItem::ReceiverFrequency => {
                let channel = ChannelId::try_from(payload[0])?;
                let hz = LittleEndian::read_uint(&payload[1..], FREQUENCY_BYTES);
                let frequency = FrequencyHz::new(hz).map_err(|_| CodecError::InvalidValue {
                    field: "frequency",
                    value: 0,
                })?;
                Ok(ControlSetting::Frequency { channel, frequency })
            }
        }
    }
}

pub fn encode_set_receiver_state(state: ReceiverState, data_mode: DataMode, capture_mode: CaptureMode, fifo_sample_count: u8) -> ControlMessage {
    ControlSetting::receiver_state(state, data_mode, capture_mode, fifo_sample_count).encode()
}

pub fn encode_set_frequency(channel: ChannelId, frequency: FrequencyHz) -> ControlMessage {
    ControlSetting::Frequency { channel, frequency }.encode()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Acknowledged,
    NegativeAcknowledged,
    Malformed,
}

impl ResponseKind {
    /// Error text for a failed exchange, `None` when the device accepted it.
    pub fn error_message(self, item: ControlItem) -> Option<&'static str> {
        match self {
            ResponseKind::Acknowledged => None,
            ResponseKind::NegativeAcknowledged => Some(NAK_MESSAGE),
            ResponseKind::Malformed => Some(item.failure_message()),
        }
    }
}

/// Classifies what the device sent back for `request`.
pub fn classify_response(request: &ControlMessage, response: Option<&[u8]>) -> ResponseKind {
    match response {
        Some(bytes) if bytes == request.as_bytes() => ResponseKind::Acknowledged,
        Some(bytes) if bytes.starts_with(&NAK_SENTINEL) => ResponseKind::NegativeAcknowledged,
        _ => ResponseKind::Malformed,
    }
}
