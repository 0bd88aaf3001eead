//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use komahub_lib::command::{
    Command, CommandClass, CommandCode, UnrecognizedCommand, decode_sequence, encode_sequence,
};
#[allow(unused_imports)]
pub use komahub_lib::constants::*;
#[allow(unused_imports)]
pub use komahub_lib::error::KomaError;
#[allow(unused_imports)]
pub use komahub_lib::payload::{
    ConfigureOutputCommand, FactoryResetCommand, GetOutputSettingsCommand, OutputName, Payload, ResetFuseCommand,
    SetPwmDutyCommand, SetRelayCommand, UpdateSettingsCommand,
};
#[allow(unused_imports)]
pub use komahub_lib::response::{
    FactorySettings, FactorySettingsRaw, OutputSettings, OutputSettingsRaw, Reply, Status, StatusRaw,
};

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Zero-pad `bytes` to a full 64-byte HID report
#[allow(dead_code)]
pub fn padded_report(bytes: &[u8]) -> Bytes {
    let mut report = vec![0u8; 64];
    report[..bytes.len()].copy_from_slice(bytes);
    Bytes::from(report)
}

/// GETSTATUS reply laid out at the offsets the host software reads:
/// relays 1 and 3 on, fuse 6 blown, 12.6 V input, two probes.
#[allow(dead_code)]
pub const STATUS_REPLY: &str = concat!(
    "05", // relay mask
    "20", // fuse mask
    "64321e000000", // pwm duty 100, 50, 30, 0, 0, 0
    "7e", // input voltage 12.6 V
    "0f0500000000", // currents 1.5 A, 0.5 A
    "02", // external probes
    "e100", "9cff", "0000", "0000", // probes 22.5 °C, -10.0 °C
    "c800", // temperature 20.0 °C
    "fbff", // dew point -0.5 °C
    "41", // humidity 65 %
    "a727", // pressure 1015.1 hPa
    "c1", // sky quality 19.3
    "4cff", // sky temperature -18.0 °C
    "b400", // sky ambient 18.0 °C
    "01", "01", "00", // PTH, SQM present, no sky temperature sensor
    "39300000", // SQM frequency 1234.5 Hz
);
