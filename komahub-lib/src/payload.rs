//! # Command payload records
//!
//! Every opcode that takes parameters is followed on the wire by one of the
//! fixed-size records in this module. The records carry no opcode of their
//! own, have no optional or variable-length fields and are never padded.
//!
//! Each record is read and written field by field through [`bytes::Buf`] and
//! [`bytes::BufMut`], so the wire layout never depends on how the compiler
//! lays out the struct in memory. Multi-byte fields are little-endian, the
//! byte order of the hub's microcontroller and the order in which the host
//! software reassembles 16-bit values.
//!
//! Nothing here validates field values. An `output_number` past the last
//! output or a `duty` above [`MAX_DUTY`] encodes and decodes like any other
//! value; rejecting them is up to whoever consumes the record.

use crate::constants::{CONFIGURE_OUTPUT_SIZE, FACTORY_RESET_SIZE, MAX_DUTY, OUTPUT_NAME_LEN};
use crate::error::KomaError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed-size parameter block that follows an opcode.
pub trait Payload: Sized {
    /// Exact number of bytes the record occupies on the wire.
    const SIZE: usize;

    /// Append the record to `buf`, writing exactly [`Self::SIZE`] bytes.
    fn encode<B: BufMut>(&self, buf: &mut B);

    /// Read the record from the front of `buf`, consuming exactly
    /// [`Self::SIZE`] bytes. Fails without consuming anything when fewer
    /// bytes are available.
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError>;

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    fn from_slice(mut bytes: &[u8]) -> Result<Self, KomaError> {
        Self::decode(&mut bytes)
    }
}

pub(crate) fn ensure_remaining<B: Buf>(buf: &B, expected: usize) -> Result<(), KomaError> {
    let actual = buf.remaining();
    if actual < expected {
        return Err(KomaError::InsufficientData { expected, actual });
    }
    Ok(())
}

/// Name of an output as stored by the hub: exactly 16 bytes.
///
/// The buffer is not a string. A NUL byte ends the printable part, but all 16
/// bytes may be non-NUL, in which case there is no terminator at all. The raw
/// bytes are always kept as they are; only [`OutputName::text`] interprets
/// them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "OutputNameRepr", try_from = "OutputNameRepr"))]
pub struct OutputName([u8; OUTPUT_NAME_LEN]);

impl OutputName {
    pub const fn new(bytes: [u8; OUTPUT_NAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a name the way the host software does: take at most 16 bytes of
    /// the UTF-8 encoding and zero-fill the rest. The cut is moved back to a
    /// character boundary so the stored bytes stay valid UTF-8.
    pub fn truncating(name: &str) -> Self {
        let mut end = name.len().min(OUTPUT_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; OUTPUT_NAME_LEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; OUTPUT_NAME_LEN] {
        &self.0
    }

    /// True when the buffer holds a NUL terminator somewhere.
    pub fn is_terminated(&self) -> bool {
        self.0.contains(&0)
    }

    /// The printable part: everything before the first NUL, or all 16 bytes.
    pub fn text(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(OUTPUT_NAME_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl TryFrom<&str> for OutputName {
    type Error = KomaError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        if name.len() > OUTPUT_NAME_LEN {
            return Err(KomaError::NameTooLong { len: name.len() });
        }
        Ok(Self::truncating(name))
    }
}

impl TryFrom<&[u8]> for OutputName {
    type Error = KomaError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(bytes.try_into()?))
    }
}

/// Serialized form of an [`OutputName`]. `text` is for reading only; the
/// name is rebuilt from the 16 bytes in `bytes`.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct OutputNameRepr {
    #[serde(default)]
    text: String,
    bytes: String,
}

#[cfg(feature = "serde")]
impl From<OutputName> for OutputNameRepr {
    fn from(name: OutputName) -> Self {
        Self {
            text: name.text(),
            bytes: hex::encode(name.0),
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<OutputNameRepr> for OutputName {
    type Error = KomaError;

    fn try_from(repr: OutputNameRepr) -> Result<Self, Self::Error> {
        let bytes = hex::decode(&repr.bytes)?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Debug for OutputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputName({:?}, {})", self.text(), hex::encode(self.0))
    }
}

impl fmt::Display for OutputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// FACTORYRESET parameters (6 bytes).
///
/// | Offset | Field     | Type   |
/// |--------|-----------|--------|
/// | 0      | `serial`  | u16 LE |
/// | 2      | `r6_ohms` | u16 LE |
/// | 4      | `r7_ohms` | u16 LE |
///
/// `r6_ohms` and `r7_ohms` are the calibrated resistances of the board's R6
/// and R7 measurement resistors, written at the factory with the serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactoryResetCommand {
    pub serial: u16,
    pub r6_ohms: u16,
    pub r7_ohms: u16,
}

impl Payload for FactoryResetCommand {
    const SIZE: usize = FACTORY_RESET_SIZE;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16_le(self.serial);
        buf.put_u16_le(self.r6_ohms);
        buf.put_u16_le(self.r7_ohms);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError> {
        ensure_remaining(buf, Self::SIZE)?;
        Ok(Self {
            serial: buf.get_u16_le(),
            r6_ohms: buf.get_u16_le(),
            r7_ohms: buf.get_u16_le(),
        })
    }
}

/// GETOUTPUTSETTINGS parameters (1 byte): the zero-based output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GetOutputSettingsCommand {
    pub output_number: u8,
}

impl Payload for GetOutputSettingsCommand {
    const SIZE: usize = 1;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.output_number);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError> {
        ensure_remaining(buf, Self::SIZE)?;
        Ok(Self {
            output_number: buf.get_u8(),
        })
    }
}

/// Hub-wide settings update (3 bytes).
///
/// | Offset | Field            | Type |
/// |--------|------------------|------|
/// | 0      | `features`       | u8   |
/// | 1      | `sqm_zero_point` | u8   |
/// | 2      | `fuse_speed`     | u8   |
///
/// `features` is a bitfield whose bit assignments are defined by the
/// firmware. No opcode is assigned to this record, so it is not part of
/// [`crate::command::Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UpdateSettingsCommand {
    pub features: u8,
    pub sqm_zero_point: u8,
    pub fuse_speed: u8,
}

impl Payload for UpdateSettingsCommand {
    const SIZE: usize = 3;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.features);
        buf.put_u8(self.sqm_zero_point);
        buf.put_u8(self.fuse_speed);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError> {
        ensure_remaining(buf, Self::SIZE)?;
        Ok(Self {
            features: buf.get_u8(),
            sqm_zero_point: buf.get_u8(),
            fuse_speed: buf.get_u8(),
        })
    }
}

/// SETRELAY parameters (2 bytes): output index, then 0 for off and any
/// non-zero value for on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SetRelayCommand {
    pub output_number: u8,
    pub enabled: u8,
}

impl SetRelayCommand {
    pub fn new(output_number: u8, enabled: bool) -> Self {
        Self {
            output_number,
            enabled: enabled as u8,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled != 0
    }
}

impl Payload for SetRelayCommand {
    const SIZE: usize = 2;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.output_number);
        buf.put_u8(self.enabled);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError> {
        ensure_remaining(buf, Self::SIZE)?;
        Ok(Self {
            output_number: buf.get_u8(),
            enabled: buf.get_u8(),
        })
    }
}

/// SETPWMDUTY parameters (2 bytes): output index, then duty in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SetPwmDutyCommand {
    pub output_number: u8,
    pub duty: u8,
}

impl SetPwmDutyCommand {
    /// Whether `duty` lies in `0..=MAX_DUTY`. The record itself carries any
    /// byte; this only reports the contract.
    pub fn is_within_contract(&self) -> bool {
        self.duty <= MAX_DUTY
    }
}

impl Payload for SetPwmDutyCommand {
    const SIZE: usize = 2;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.output_number);
        buf.put_u8(self.duty);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError> {
        ensure_remaining(buf, Self::SIZE)?;
        Ok(Self {
            output_number: buf.get_u8(),
            duty: buf.get_u8(),
        })
    }
}

/// RESETFUSE parameters (1 byte): the output whose tripped fuse to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResetFuseCommand {
    pub output_number: u8,
}

impl Payload for ResetFuseCommand {
    const SIZE: usize = 1;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.output_number);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError> {
        ensure_remaining(buf, Self::SIZE)?;
        Ok(Self {
            output_number: buf.get_u8(),
        })
    }
}

/// CONFIGUREOUTPUT parameters (19 bytes).
///
/// | Offset | Field           | Type     |
/// |--------|-----------------|----------|
/// | 0      | `output_number` | u8       |
/// | 1      | `output_type`   | u8       |
/// | 2      | `fuse_current`  | u8       |
/// | 3      | `name`          | [u8; 16] |
///
/// `fuse_current` is in tenths of an ampere. `output_type` values are
/// defined by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConfigureOutputCommand {
    pub output_number: u8,
    pub output_type: u8,
    pub fuse_current: u8,
    pub name: OutputName,
}

impl ConfigureOutputCommand {
    pub fn fuse_current_a(&self) -> f32 {
        self.fuse_current as f32 / 10.0
    }
}

impl Payload for ConfigureOutputCommand {
    const SIZE: usize = CONFIGURE_OUTPUT_SIZE;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.output_number);
        buf.put_u8(self.output_type);
        buf.put_u8(self.fuse_current);
        buf.put_slice(self.name.as_bytes());
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError> {
        ensure_remaining(buf, Self::SIZE)?;
        let output_number = buf.get_u8();
        let output_type = buf.get_u8();
        let fuse_current = buf.get_u8();
        let mut name = [0u8; OUTPUT_NAME_LEN];
        buf.copy_to_slice(&mut name);
        Ok(Self {
            output_number,
            output_type,
            fuse_current,
            name: OutputName::new(name),
        })
    }
}
