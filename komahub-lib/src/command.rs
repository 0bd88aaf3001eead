//! # KomaHub command vocabulary
//!
//! A command on the wire is one opcode byte followed by the payload record
//! for that opcode (see [`crate::payload`]). Parameterless opcodes are a
//! single byte.
//!
//! ### Core Types
//!
//! - **`CommandCode`**: the closed set of opcodes. Converting a byte that is
//!   not in the table fails.
//! - **`Command`**: one variant per opcode carrying its payload record, plus
//!   `Unrecognized` for a byte outside the table so captures can still be
//!   inspected. [`UnrecognizedCommand::new`] refuses opcodes that are in the
//!   table. Dispatch code should go through the strict decoders
//!   ([`Command::try_from`] and [`decode_sequence`]), which turn
//!   `Unrecognized` into [`KomaError::UnknownCommand`].
//!
//! `END` (0x00) terminates a command sequence. A zero-padded buffer therefore
//! ends itself, and `END` never gets confused with a command whose payload
//! happens to be all zeros, since every such command starts with its own
//! non-zero opcode.

use crate::error::KomaError;
use crate::payload::{
    ConfigureOutputCommand, FactoryResetCommand, GetOutputSettingsCommand, Payload, ResetFuseCommand,
    SetPwmDutyCommand, SetRelayCommand, ensure_remaining,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive, TryFromPrimitiveError};
use std::fmt;
use strum_macros::Display;
use tracing::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
#[repr(u8)]
pub enum CommandCode {
    // 0x00..=0x04: queries
    #[strum(to_string = "END")]
    End = 0x00,
    #[strum(to_string = "IDENTIFY")]
    Identify = 0x01,
    #[strum(to_string = "GETFACTORYSETTINGS")]
    GetFactorySettings = 0x02,
    #[strum(to_string = "GETOUTPUTSETTINGS")]
    GetOutputSettings = 0x03,
    #[strum(to_string = "GETSTATUS")]
    GetStatus = 0x04,

    // 0x10..=0x13: output control
    #[strum(to_string = "SETRELAY")]
    SetRelay = 0x10,
    #[strum(to_string = "SETPWMDUTY")]
    SetPwmDuty = 0x11,
    #[strum(to_string = "RESETFUSE")]
    ResetFuse = 0x12,
    #[strum(to_string = "CONFIGUREOUTPUT")]
    ConfigureOutput = 0x13,

    // 0xF0..: diagnostics and factory
    #[strum(to_string = "DUMPFACTORY")]
    DumpFactory = 0xF0,
    #[strum(to_string = "DUMPOUTPUTS")]
    DumpOutputs = 0xF1,
    #[strum(to_string = "DUMPSTATE")]
    DumpState = 0xF2,
    #[strum(to_string = "FACTORYRESET")]
    FactoryReset = 0xFA,
}

/// Informal grouping of opcodes by value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum CommandClass {
    Query,
    Control,
    Diagnostic,
}

impl CommandCode {
    pub const ALL: [CommandCode; 13] = [
        CommandCode::End,
        CommandCode::Identify,
        CommandCode::GetFactorySettings,
        CommandCode::GetOutputSettings,
        CommandCode::GetStatus,
        CommandCode::SetRelay,
        CommandCode::SetPwmDuty,
        CommandCode::ResetFuse,
        CommandCode::ConfigureOutput,
        CommandCode::DumpFactory,
        CommandCode::DumpOutputs,
        CommandCode::DumpState,
        CommandCode::FactoryReset,
    ];

    pub fn class(&self) -> CommandClass {
        match self {
            CommandCode::End
            | CommandCode::Identify
            | CommandCode::GetFactorySettings
            | CommandCode::GetOutputSettings
            | CommandCode::GetStatus => CommandClass::Query,
            CommandCode::SetRelay | CommandCode::SetPwmDuty | CommandCode::ResetFuse | CommandCode::ConfigureOutput => {
                CommandClass::Control
            }
            CommandCode::DumpFactory | CommandCode::DumpOutputs | CommandCode::DumpState | CommandCode::FactoryReset => {
                CommandClass::Diagnostic
            }
        }
    }

    /// Wipes the hub's stored settings.
    pub fn is_destructive(&self) -> bool {
        matches!(self, CommandCode::FactoryReset)
    }

    /// Number of payload bytes following the opcode.
    pub fn payload_len(&self) -> usize {
        match self {
            CommandCode::GetOutputSettings => GetOutputSettingsCommand::SIZE,
            CommandCode::SetRelay => SetRelayCommand::SIZE,
            CommandCode::SetPwmDuty => SetPwmDutyCommand::SIZE,
            CommandCode::ResetFuse => ResetFuseCommand::SIZE,
            CommandCode::ConfigureOutput => ConfigureOutputCommand::SIZE,
            CommandCode::FactoryReset => FactoryResetCommand::SIZE,
            CommandCode::End
            | CommandCode::Identify
            | CommandCode::GetFactorySettings
            | CommandCode::GetStatus
            | CommandCode::DumpFactory
            | CommandCode::DumpOutputs
            | CommandCode::DumpState => 0,
        }
    }

    /// Opcodes the hub answers with a reply block (see [`crate::response`]).
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            CommandCode::GetFactorySettings | CommandCode::GetOutputSettings | CommandCode::GetStatus
        )
    }
}

impl From<TryFromPrimitiveError<CommandCode>> for KomaError {
    fn from(err: TryFromPrimitiveError<CommandCode>) -> Self {
        KomaError::UnknownCommand(err.number)
    }
}

/// An opcode byte outside the table and every byte that followed it.
///
/// The payload length of an unknown opcode is unknown, so `rest` runs to the
/// end of the buffer it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct UnrecognizedCommand {
    code: u8,
    rest: Bytes,
}

impl UnrecognizedCommand {
    /// Fails with [`KomaError::KnownCommand`] when `code` is in the opcode
    /// table, since those bytes would decode as that command.
    pub fn new(code: u8, rest: Bytes) -> Result<Self, KomaError> {
        if CommandCode::try_from(code).is_ok() {
            return Err(KomaError::KnownCommand(code));
        }
        Ok(Self { code, rest })
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn rest(&self) -> &Bytes {
        &self.rest
    }
}

/// JSON tags are the opcode names (`SETPWMDUTY`, `CONFIGUREOUTPUT`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "command", rename_all = "UPPERCASE"))]
pub enum Command {
    End,
    Identify,
    GetFactorySettings,
    GetOutputSettings(GetOutputSettingsCommand),
    GetStatus,
    SetRelay(SetRelayCommand),
    SetPwmDuty(SetPwmDutyCommand),
    ResetFuse(ResetFuseCommand),
    ConfigureOutput(ConfigureOutputCommand),
    DumpFactory,
    DumpOutputs,
    DumpState,
    FactoryReset(FactoryResetCommand),
    Unrecognized(UnrecognizedCommand),
}

impl Command {
    pub fn code(&self) -> Option<CommandCode> {
        let code = match self {
            Command::End => CommandCode::End,
            Command::Identify => CommandCode::Identify,
            Command::GetFactorySettings => CommandCode::GetFactorySettings,
            Command::GetOutputSettings(_) => CommandCode::GetOutputSettings,
            Command::GetStatus => CommandCode::GetStatus,
            Command::SetRelay(_) => CommandCode::SetRelay,
            Command::SetPwmDuty(_) => CommandCode::SetPwmDuty,
            Command::ResetFuse(_) => CommandCode::ResetFuse,
            Command::ConfigureOutput(_) => CommandCode::ConfigureOutput,
            Command::DumpFactory => CommandCode::DumpFactory,
            Command::DumpOutputs => CommandCode::DumpOutputs,
            Command::DumpState => CommandCode::DumpState,
            Command::FactoryReset(_) => CommandCode::FactoryReset,
            Command::Unrecognized(_) => return None,
        };
        Some(code)
    }

    /// The opcode byte as sent on the wire.
    pub fn raw_code(&self) -> u8 {
        match self {
            Command::Unrecognized(unknown) => unknown.code,
            known => known.code().map(u8::from).unwrap_or_default(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Command::Unrecognized(unknown) => 1 + unknown.rest.len(),
            known => 1 + known.code().map(|c| c.payload_len()).unwrap_or_default(),
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.raw_code());
        match self {
            Command::GetOutputSettings(payload) => payload.encode(buf),
            Command::SetRelay(payload) => payload.encode(buf),
            Command::SetPwmDuty(payload) => payload.encode(buf),
            Command::ResetFuse(payload) => payload.encode(buf),
            Command::ConfigureOutput(payload) => payload.encode(buf),
            Command::FactoryReset(payload) => payload.encode(buf),
            Command::Unrecognized(unknown) => buf.put_slice(&unknown.rest),
            Command::End
            | Command::Identify
            | Command::GetFactorySettings
            | Command::GetStatus
            | Command::DumpFactory
            | Command::DumpOutputs
            | Command::DumpState => {}
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Read one command from the front of `buf`.
    ///
    /// An opcode outside the table is returned as [`Command::Unrecognized`]
    /// and swallows the rest of the buffer. A payload shorter than its record
    /// fails with [`KomaError::InsufficientData`].
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, KomaError> {
        ensure_remaining(buf, 1)?;
        let byte = buf.get_u8();
        let Ok(code) = CommandCode::try_from(byte) else {
            let rest = buf.copy_to_bytes(buf.remaining());
            return Ok(Command::Unrecognized(UnrecognizedCommand { code: byte, rest }));
        };

        let command = match code {
            CommandCode::End => Command::End,
            CommandCode::Identify => Command::Identify,
            CommandCode::GetFactorySettings => Command::GetFactorySettings,
            CommandCode::GetOutputSettings => Command::GetOutputSettings(GetOutputSettingsCommand::decode(buf)?),
            CommandCode::GetStatus => Command::GetStatus,
            CommandCode::SetRelay => Command::SetRelay(SetRelayCommand::decode(buf)?),
            CommandCode::SetPwmDuty => Command::SetPwmDuty(SetPwmDutyCommand::decode(buf)?),
            CommandCode::ResetFuse => Command::ResetFuse(ResetFuseCommand::decode(buf)?),
            CommandCode::ConfigureOutput => Command::ConfigureOutput(ConfigureOutputCommand::decode(buf)?),
            CommandCode::DumpFactory => Command::DumpFactory,
            CommandCode::DumpOutputs => Command::DumpOutputs,
            CommandCode::DumpState => Command::DumpState,
            CommandCode::FactoryReset => Command::FactoryReset(FactoryResetCommand::decode(buf)?),
        };
        Ok(command)
    }
}

impl TryFrom<Bytes> for Command {
    type Error = KomaError;

    /// Strict decode of exactly one command. Bytes after it must be zero
    /// padding.
    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        let command = Command::decode(&mut bytes)?;
        if let Command::Unrecognized(unknown) = &command {
            warn!(code = unknown.code, "Rejecting unknown command code");
            return Err(KomaError::UnknownCommand(unknown.code));
        }
        if bytes.iter().any(|&b| b != 0) {
            return Err(KomaError::TrailingBytes { count: bytes.len() });
        }
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Command::Unrecognized(unknown) = self {
            return write!(f, "UNRECOGNIZED({:#04x}) rest={}", unknown.code, hex::encode(&unknown.rest));
        }
        if let Some(code) = self.code() {
            write!(f, "{}", code)?;
        }
        match self {
            Command::GetOutputSettings(p) => write!(f, " output={}", p.output_number),
            Command::SetRelay(p) => write!(f, " output={} enabled={}", p.output_number, p.is_enabled()),
            Command::SetPwmDuty(p) => write!(f, " output={} duty={}%", p.output_number, p.duty),
            Command::ResetFuse(p) => write!(f, " output={}", p.output_number),
            Command::ConfigureOutput(p) => write!(
                f,
                " output={} type={} fuse={:.1}A name={:?}",
                p.output_number,
                p.output_type,
                p.fuse_current_a(),
                p.name.text()
            ),
            Command::FactoryReset(p) => write!(f, " serial={} r6={}Ω r7={}Ω", p.serial, p.r6_ohms, p.r7_ohms),
            _ => Ok(()),
        }
    }
}

/// Decode commands back to back until `END` or the end of the buffer.
///
/// `END` itself is not returned. An unknown opcode is a protocol error since
/// the length of its payload, and therefore the position of the next command,
/// cannot be known.
pub fn decode_sequence(mut bytes: Bytes) -> Result<Vec<Command>, KomaError> {
    let mut commands = Vec::new();
    while bytes.has_remaining() {
        match Command::decode(&mut bytes)? {
            Command::End => {
                debug!(remaining = bytes.len(), "END reached");
                break;
            }
            Command::Unrecognized(unknown) => {
                warn!(code = unknown.code, "Rejecting unknown command code");
                return Err(KomaError::UnknownCommand(unknown.code));
            }
            command => {
                trace!(%command, "Decoded command");
                commands.push(command);
            }
        }
    }
    Ok(commands)
}

/// Encode `commands` back to back, terminated by `END`.
///
/// `END` inside `commands` would end the sequence early on the hub, and an
/// unrecognized opcode would leave the hub unable to find the next command,
/// so both are refused.
pub fn encode_sequence(commands: &[Command]) -> Result<Bytes, KomaError> {
    let len = commands.iter().map(Command::encoded_len).sum::<usize>() + 1;
    let mut buf = BytesMut::with_capacity(len);
    for (index, command) in commands.iter().enumerate() {
        match command {
            Command::End => return Err(KomaError::EmbeddedEnd { index }),
            Command::Unrecognized(unknown) => return Err(KomaError::UnknownCommand(unknown.code)),
            command => command.encode(&mut buf),
        }
    }
    Command::End.encode(&mut buf);
    debug!(bytes = hex::encode(&buf), "Encoded command sequence");
    Ok(buf.freeze())
}
