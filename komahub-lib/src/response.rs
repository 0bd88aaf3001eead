//! Replies the hub sends back for query opcodes.
//!
//! Replies carry no opcode echo; the host knows which layout to expect from
//! the command it just sent. All layouts are little-endian and built only
//! from byte-aligned types, so the `*Raw` structs map the wire bytes one to
//! one. Readers accept longer buffers (a zero-padded report) and ignore the
//! tail.

use crate::command::CommandCode;
use crate::constants::{
    EXTERNAL_TEMPERATURE_SLOTS, FACTORY_SETTINGS_SIZE, OUTPUT_COUNT, OUTPUT_NAME_LEN, OUTPUT_SETTINGS_SIZE,
    STATUS_SIZE,
};
use crate::error::KomaError;
use crate::payload::{ConfigureOutputCommand, OutputName};
use modular_bitfield::prelude::*;
use std::fmt;
use zerocopy::byteorder::little_endian::{I16, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const _: () = assert!(size_of::<FactorySettingsRaw>() == FACTORY_SETTINGS_SIZE);
const _: () = assert!(size_of::<OutputSettingsRaw>() == OUTPUT_SETTINGS_SIZE);
const _: () = assert!(size_of::<StatusRaw>() == STATUS_SIZE);

fn read_reply<T: FromBytes>(bytes: &[u8]) -> Result<T, KomaError> {
    T::read_from_prefix(bytes)
        .map(|(raw, _)| raw)
        .map_err(|_| KomaError::InsufficientData {
            expected: size_of::<T>(),
            actual: bytes.len(),
        })
}

/// Fixed-point value in tenths, as used throughout the status reply.
fn tenths<T: Into<f64>>(raw: T) -> f64 {
    raw.into() / 10.0
}

fn to_tenths_i16(value: f64) -> I16 {
    I16::new((value * 10.0).round() as i16)
}

fn to_tenths_u8(value: f64) -> u8 {
    (value * 10.0).round() as u8
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FactorySettingsRaw {
    pub firmware_version: U16, // major in the high byte
    pub serial: U16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactorySettings {
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub serial: u16,
}

impl From<FactorySettingsRaw> for FactorySettings {
    fn from(raw: FactorySettingsRaw) -> Self {
        let [firmware_minor, firmware_major] = raw.firmware_version.get().to_le_bytes();
        Self {
            firmware_major,
            firmware_minor,
            serial: raw.serial.get(),
        }
    }
}

impl From<FactorySettings> for FactorySettingsRaw {
    fn from(settings: FactorySettings) -> Self {
        Self {
            firmware_version: U16::new(u16::from_le_bytes([settings.firmware_minor, settings.firmware_major])),
            serial: U16::new(settings.serial),
        }
    }
}

impl TryFrom<&[u8]> for FactorySettings {
    type Error = KomaError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        read_reply::<FactorySettingsRaw>(bytes).map(Self::from)
    }
}

impl fmt::Display for FactorySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Firmware v{}.{}, S/N #{:04}",
            self.firmware_major, self.firmware_minor, self.serial
        )
    }
}

/// Reply to GETOUTPUTSETTINGS. The name comes first here, unlike in
/// [`ConfigureOutputCommand`].
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct OutputSettingsRaw {
    pub name: [u8; OUTPUT_NAME_LEN],
    pub fuse_current: u8, // 0.1 A
    pub output_type: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutputSettings {
    pub name: OutputName,
    /// Fuse trip current in tenths of an ampere
    pub fuse_current: u8,
    pub output_type: u8,
}

impl OutputSettings {
    pub fn fuse_current_a(&self) -> f64 {
        tenths(self.fuse_current)
    }

    /// The CONFIGUREOUTPUT payload that would store these settings on
    /// `output_number`.
    pub fn to_configure_command(&self, output_number: u8) -> ConfigureOutputCommand {
        ConfigureOutputCommand {
            output_number,
            output_type: self.output_type,
            fuse_current: self.fuse_current,
            name: self.name,
        }
    }
}

impl From<OutputSettingsRaw> for OutputSettings {
    fn from(raw: OutputSettingsRaw) -> Self {
        Self {
            name: OutputName::new(raw.name),
            fuse_current: raw.fuse_current,
            output_type: raw.output_type,
        }
    }
}

impl From<OutputSettings> for OutputSettingsRaw {
    fn from(settings: OutputSettings) -> Self {
        Self {
            name: *settings.name.as_bytes(),
            fuse_current: settings.fuse_current,
            output_type: settings.output_type,
        }
    }
}

impl From<ConfigureOutputCommand> for OutputSettings {
    fn from(cmd: ConfigureOutputCommand) -> Self {
        Self {
            name: cmd.name,
            fuse_current: cmd.fuse_current,
            output_type: cmd.output_type,
        }
    }
}

impl TryFrom<&[u8]> for OutputSettings {
    type Error = KomaError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        read_reply::<OutputSettingsRaw>(bytes).map(Self::from)
    }
}

impl fmt::Display for OutputSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} (type {}, fuse {:.1} A)",
            self.name.text(),
            self.output_type,
            self.fuse_current_a()
        )
    }
}

/// One bit per output, bit 0 = output 0.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputFlags {
    pub output0: bool,
    pub output1: bool,
    pub output2: bool,
    pub output3: bool,
    pub output4: bool,
    pub output5: bool,
    #[skip]
    unused: B2,
}

impl OutputFlags {
    pub fn get(&self, output: usize) -> bool {
        match output {
            0 => self.output0(),
            1 => self.output1(),
            2 => self.output2(),
            3 => self.output3(),
            4 => self.output4(),
            5 => self.output5(),
            _ => false,
        }
    }

    pub fn to_array(&self) -> [bool; OUTPUT_COUNT] {
        std::array::from_fn(|output| self.get(output))
    }

    pub fn from_array(flags: [bool; OUTPUT_COUNT]) -> Self {
        OutputFlags::new()
            .with_output0(flags[0])
            .with_output1(flags[1])
            .with_output2(flags[2])
            .with_output3(flags[3])
            .with_output4(flags[4])
            .with_output5(flags[5])
    }
}

/// Reply to GETSTATUS (43 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct StatusRaw {
    pub relay_mask: u8,
    pub fuse_mask: u8,
    pub pwm_duty: [u8; OUTPUT_COUNT],             // percent
    pub input_voltage: u8,                        // 0.1 V
    pub output_current: [u8; OUTPUT_COUNT],       // 0.1 A
    pub external_temperature_count: u8,
    pub external_temperatures: [I16; EXTERNAL_TEMPERATURE_SLOTS], // 0.1 °C
    pub temperature: I16,                         // 0.1 °C
    pub dew_point: I16,                           // 0.1 °C
    pub humidity: u8,                             // percent
    pub pressure: I16,                            // 0.1 hPa
    pub sky_quality: u8,                          // 0.1 mag/arcsec²
    pub sky_temperature: I16,                     // 0.1 °C
    pub sky_ambient_temperature: I16,             // 0.1 °C
    pub pth_present: u8,
    pub sky_quality_present: u8,
    pub sky_temperature_present: u8,
    pub sky_quality_frequency: U32,               // 0.1 Hz
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Status {
    pub relays_on: [bool; OUTPUT_COUNT],
    pub fuses_blown: [bool; OUTPUT_COUNT],
    pub pwm_duty: [u8; OUTPUT_COUNT],
    pub input_voltage_v: f64,
    pub output_current_a: [f64; OUTPUT_COUNT],
    pub external_temperature_count: u8,
    pub external_temperatures_c: [f64; EXTERNAL_TEMPERATURE_SLOTS],

    // Ambient pressure/temperature/humidity sensor
    pub temperature_c: f64,
    pub dew_point_c: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: f64,

    // Sky sensors
    pub sky_quality: f64,
    pub sky_temperature_c: f64,
    pub sky_ambient_temperature_c: f64,
    pub sky_quality_frequency_hz: f64,

    pub pth_present: bool,
    pub sky_quality_present: bool,
    pub sky_temperature_present: bool,
}

/// Status of a single output, taken from a [`Status`] reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputStatus {
    pub relay_on: bool,
    pub fuse_blown: bool,
    pub pwm_duty: u8,
    pub current_a: f64,
}

impl Status {
    pub fn output(&self, output: usize) -> Option<OutputStatus> {
        if output >= OUTPUT_COUNT {
            return None;
        }
        Some(OutputStatus {
            relay_on: self.relays_on[output],
            fuse_blown: self.fuses_blown[output],
            pwm_duty: self.pwm_duty[output],
            current_a: self.output_current_a[output],
        })
    }

    /// The probe readings actually connected, per `external_temperature_count`.
    pub fn external_temperatures(&self) -> &[f64] {
        let count = (self.external_temperature_count as usize).min(EXTERNAL_TEMPERATURE_SLOTS);
        &self.external_temperatures_c[..count]
    }

    /// Sky temperature below ambient; larger means clearer sky.
    pub fn sky_temperature_delta_c(&self) -> f64 {
        self.sky_ambient_temperature_c - self.sky_temperature_c
    }
}

impl From<StatusRaw> for Status {
    fn from(raw: StatusRaw) -> Self {
        Status {
            relays_on: OutputFlags::from_bytes([raw.relay_mask]).to_array(),
            fuses_blown: OutputFlags::from_bytes([raw.fuse_mask]).to_array(),
            pwm_duty: raw.pwm_duty,
            input_voltage_v: tenths(raw.input_voltage),
            output_current_a: raw.output_current.map(tenths),
            external_temperature_count: raw.external_temperature_count,
            external_temperatures_c: raw.external_temperatures.map(|t| tenths(t.get())),
            temperature_c: tenths(raw.temperature.get()),
            dew_point_c: tenths(raw.dew_point.get()),
            humidity_pct: raw.humidity,
            pressure_hpa: tenths(raw.pressure.get()),
            sky_quality: tenths(raw.sky_quality),
            sky_temperature_c: tenths(raw.sky_temperature.get()),
            sky_ambient_temperature_c: tenths(raw.sky_ambient_temperature.get()),
            sky_quality_frequency_hz: tenths(raw.sky_quality_frequency.get()),
            pth_present: raw.pth_present != 0,
            sky_quality_present: raw.sky_quality_present != 0,
            sky_temperature_present: raw.sky_temperature_present != 0,
        }
    }
}

impl From<&Status> for StatusRaw {
    fn from(status: &Status) -> Self {
        StatusRaw {
            relay_mask: OutputFlags::from_array(status.relays_on).into_bytes()[0],
            fuse_mask: OutputFlags::from_array(status.fuses_blown).into_bytes()[0],
            pwm_duty: status.pwm_duty,
            input_voltage: to_tenths_u8(status.input_voltage_v),
            output_current: status.output_current_a.map(to_tenths_u8),
            external_temperature_count: status.external_temperature_count,
            external_temperatures: status.external_temperatures_c.map(to_tenths_i16),
            temperature: to_tenths_i16(status.temperature_c),
            dew_point: to_tenths_i16(status.dew_point_c),
            humidity: status.humidity_pct,
            pressure: to_tenths_i16(status.pressure_hpa),
            sky_quality: to_tenths_u8(status.sky_quality),
            sky_temperature: to_tenths_i16(status.sky_temperature_c),
            sky_ambient_temperature: to_tenths_i16(status.sky_ambient_temperature_c),
            pth_present: status.pth_present as u8,
            sky_quality_present: status.sky_quality_present as u8,
            sky_temperature_present: status.sky_temperature_present as u8,
            sky_quality_frequency: U32::new((status.sky_quality_frequency_hz * 10.0).round() as u32),
        }
    }
}

impl TryFrom<&[u8]> for Status {
    type Error = KomaError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        read_reply::<StatusRaw>(bytes).map(Self::from)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "┌─ Outputs ───────────────────────────────────┐")?;
        for output in 0..OUTPUT_COUNT {
            let Some(out) = self.output(output) else { continue };
            let state = if out.fuse_blown {
                "FUSE"
            } else if out.relay_on {
                "On"
            } else {
                "Off"
            };
            writeln!(
                f,
                "│ Out {}  {:<4}  duty {:>3}%  {:>5.1} A           │",
                output,
                state,
                out.pwm_duty,
                out.current_a
            )?;
        }
        writeln!(f, "├─ Supply ────────────────────────────────────┤")?;
        writeln!(f, "│ Input: {:>6.1} V                             │", self.input_voltage_v)?;
        if self.pth_present {
            writeln!(f, "├─ Ambient ───────────────────────────────────┤")?;
            writeln!(
                f,
                "│ {:>5.1} °C  dew {:>5.1} °C  {:>3} %  {:>6.1} hPa │",
                self.temperature_c, self.dew_point_c, self.humidity_pct, self.pressure_hpa
            )?;
        }
        for (probe, temp) in self.external_temperatures().iter().enumerate() {
            writeln!(f, "│ Probe {}: {:>6.1} °C                         │", probe + 1, temp)?;
        }
        if self.sky_quality_present || self.sky_temperature_present {
            writeln!(f, "├─ Sky ───────────────────────────────────────┤")?;
        }
        if self.sky_quality_present {
            writeln!(
                f,
                "│ SQM: {:>5.2}  ({:.1} Hz)                      │",
                self.sky_quality, self.sky_quality_frequency_hz
            )?;
        }
        if self.sky_temperature_present {
            writeln!(
                f,
                "│ Sky: {:>5.1} °C  delta {:>5.1} °C              │",
                self.sky_temperature_c,
                self.sky_temperature_delta_c()
            )?;
        }
        write!(f, "└─────────────────────────────────────────────┘")
    }
}

/// A decoded reply, tagged by the query that produced it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "reply", rename_all = "snake_case"))]
pub enum Reply {
    FactorySettings(FactorySettings),
    OutputSettings(OutputSettings),
    Status(Status),
}

impl Reply {
    /// Decode `bytes` as the reply to `code`.
    pub fn decode(code: CommandCode, bytes: &[u8]) -> Result<Self, KomaError> {
        match code {
            CommandCode::GetFactorySettings => FactorySettings::try_from(bytes).map(Reply::FactorySettings),
            CommandCode::GetOutputSettings => OutputSettings::try_from(bytes).map(Reply::OutputSettings),
            CommandCode::GetStatus => Status::try_from(bytes).map(Reply::Status),
            other => Err(KomaError::InvalidPacket(format!("{} has no reply layout", other))),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::FactorySettings(settings) => fmt::Display::fmt(settings, f),
            Reply::OutputSettings(settings) => fmt::Display::fmt(settings, f),
            Reply::Status(status) => fmt::Display::fmt(status, f),
        }
    }
}
