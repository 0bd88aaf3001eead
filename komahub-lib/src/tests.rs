use crate::command::{Command, CommandCode, UnrecognizedCommand};
use crate::constants::{OUTPUT_COUNT, STATUS_SIZE};
use crate::error::KomaError;
use crate::payload::{OutputName, Payload, SetRelayCommand, ensure_remaining};
use crate::response::{OutputFlags, StatusRaw};
use bytes::Bytes;
use zerocopy::{FromBytes, IntoBytes};

#[test]
fn test_ensure_remaining_reports_sizes() {
    let buf: &[u8] = &[0x01, 0x02];
    match ensure_remaining(&buf, 6) {
        Err(KomaError::InsufficientData { expected, actual }) => {
            assert_eq!(expected, 6);
            assert_eq!(actual, 2);
        }
        other => panic!("Expected InsufficientData, got {:?}", other),
    }
    assert!(ensure_remaining(&buf, 2).is_ok());
}

#[test]
fn test_failed_decode_consumes_nothing() {
    let mut buf = Bytes::from_static(&[0x03]);
    assert!(SetRelayCommand::decode(&mut buf).is_err());
    assert_eq!(buf.len(), 1, "Short decode must leave the buffer untouched");
}

#[test]
fn test_output_flags_bit_order() {
    // Bit 0 is the first output, as in the host software's (mask & (1 << n))
    let flags = OutputFlags::from_bytes([0b0010_0101]);
    assert_eq!(flags.to_array(), [true, false, true, false, false, true]);
    assert!(!flags.get(OUTPUT_COUNT), "Past the last output is always off");

    let rebuilt = OutputFlags::from_array([true, false, true, false, false, true]);
    assert_eq!(rebuilt.into_bytes(), [0b0010_0101]);
}

#[test]
fn test_status_raw_layout_offsets() {
    let mut bytes = [0u8; STATUS_SIZE];
    bytes[8] = 125; // input voltage
    bytes[15] = 2; // probe count
    bytes[24] = 0x05; // temperature low byte
    bytes[39] = 0x10; // sky quality frequency low byte

    let Ok((raw, _)) = StatusRaw::read_from_prefix(&bytes[..]) else {
        panic!("Status layout should fit {} bytes", STATUS_SIZE);
    };
    assert_eq!(raw.input_voltage, 125);
    assert_eq!(raw.external_temperature_count, 2);
    assert_eq!(raw.temperature.get(), 5);
    assert_eq!(raw.sky_quality_frequency.get(), 0x10);
    assert_eq!(raw.as_bytes(), &bytes[..]);
}

#[test]
fn test_raw_code_of_unrecognized() {
    let cmd = Command::Unrecognized(UnrecognizedCommand::new(0x7F, Bytes::from_static(&[0xAA])).unwrap());
    assert_eq!(cmd.code(), None);
    assert_eq!(cmd.raw_code(), 0x7F);
    assert_eq!(cmd.encoded_len(), 2);
    assert_eq!(cmd.to_bytes().as_ref(), &[0x7F, 0xAA]);
}

#[test]
fn test_try_from_primitive_error_maps_to_unknown_command() {
    fn parse(byte: u8) -> Result<CommandCode, KomaError> {
        Ok(CommandCode::try_from(byte)?)
    }
    assert!(matches!(parse(0x05), Err(KomaError::UnknownCommand(0x05))));
    assert_eq!(parse(0xFA).unwrap(), CommandCode::FactoryReset);
}

#[test]
fn test_output_name_debug_shows_raw_bytes() {
    let name = OutputName::truncating("Dew");
    let debug = format!("{:?}", name);
    assert!(debug.contains("\"Dew\""));
    assert!(debug.contains("446577"));
}
