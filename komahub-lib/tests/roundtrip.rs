//! Tests for round-trip conversion integrity

mod common;

use common::*;

fn roundtrip<P: Payload + PartialEq + std::fmt::Debug>(payload: P) {
    let bytes = payload.to_bytes();
    assert_eq!(bytes.len(), P::SIZE);
    let decoded = P::from_slice(&bytes).expect("Failed to decode payload");
    assert_eq!(decoded, payload, "Round-trip should preserve fields. Bytes: {:02x?}", bytes.as_ref());
}

fn roundtrip_command(command: Command) {
    let bytes = command.to_bytes();
    let decoded = Command::try_from(bytes.clone()).expect("Failed to decode command");
    assert_eq!(decoded, command, "Bytes: {:02x?}", bytes.as_ref());
}

#[test]
fn test_factory_reset_boundaries() {
    let zero = FactoryResetCommand::default();
    assert_eq!(zero.to_bytes().as_ref(), &[0u8; 6]);
    roundtrip(zero);

    let max = FactoryResetCommand {
        serial: u16::MAX,
        r6_ohms: u16::MAX,
        r7_ohms: u16::MAX,
    };
    assert_eq!(max.to_bytes().as_ref(), &[0xFFu8; 6]);
    roundtrip(max);
}

#[test]
fn test_factory_reset_is_little_endian() {
    let cmd = FactoryResetCommand {
        serial: 0x0102,
        r6_ohms: 0x0304,
        r7_ohms: 0x0506,
    };
    assert_eq!(cmd.to_bytes().as_ref(), &[0x02, 0x01, 0x04, 0x03, 0x06, 0x05]);
    roundtrip_command(Command::FactoryReset(cmd));
}

#[test]
fn test_output_number_boundaries() {
    for output_number in [0u8, 255] {
        roundtrip(GetOutputSettingsCommand { output_number });
        roundtrip(ResetFuseCommand { output_number });
        roundtrip(SetRelayCommand {
            output_number,
            enabled: 1,
        });
        roundtrip(SetPwmDutyCommand { output_number, duty: 0 });
        roundtrip_command(Command::ResetFuse(ResetFuseCommand { output_number }));
        roundtrip_command(Command::GetOutputSettings(GetOutputSettingsCommand { output_number }));
    }
}

#[test]
fn test_duty_boundaries() {
    for duty in [0u8, MAX_DUTY] {
        let cmd = SetPwmDutyCommand { output_number: 3, duty };
        assert!(cmd.is_within_contract());
        roundtrip(cmd);
        roundtrip_command(Command::SetPwmDuty(cmd));
    }
}

#[test]
fn test_out_of_contract_duty_is_carried_verbatim() {
    let cmd = SetPwmDutyCommand {
        output_number: 0,
        duty: 200,
    };
    assert!(!cmd.is_within_contract());
    assert_eq!(Command::SetPwmDuty(cmd).to_bytes().as_ref(), &[0x11, 0x00, 0xC8]);
    roundtrip(cmd);
}

#[test]
fn test_relay_enabled_flag() {
    let on = SetRelayCommand::new(2, true);
    let off = SetRelayCommand::new(2, false);
    assert_eq!(Command::SetRelay(on).to_bytes().as_ref(), &[0x10, 0x02, 0x01]);
    assert_eq!(Command::SetRelay(off).to_bytes().as_ref(), &[0x10, 0x02, 0x00]);

    // Any non-zero byte means enabled, and the raw byte survives
    let odd = SetRelayCommand::from_slice(&[0x02, 0x7F]).unwrap();
    assert!(odd.is_enabled());
    assert_eq!(odd.enabled, 0x7F);
    roundtrip(odd);
}

#[test]
fn test_update_settings_roundtrip() {
    roundtrip(UpdateSettingsCommand::default());
    roundtrip(UpdateSettingsCommand {
        features: 0b1010_0101,
        sqm_zero_point: 210,
        fuse_speed: u8::MAX,
    });
    assert_eq!(
        UpdateSettingsCommand {
            features: 1,
            sqm_zero_point: 2,
            fuse_speed: 3
        }
        .to_bytes()
        .as_ref(),
        &[1, 2, 3]
    );
}

#[test]
fn test_configure_output_full_name_is_not_truncated() {
    let cmd = ConfigureOutputCommand {
        output_number: 5,
        output_type: 2,
        fuse_current: 30,
        name: OutputName::new([b'A'; 16]),
    };
    let bytes = cmd.to_bytes();
    assert_eq!(bytes.len(), 19);
    assert_eq!(&bytes[..3], &[5, 2, 30]);
    assert_eq!(&bytes[3..], &[b'A'; 16]);

    let decoded = ConfigureOutputCommand::from_slice(&bytes).unwrap();
    assert_eq!(decoded.name.as_bytes(), &[b'A'; 16]);
    assert!(!decoded.name.is_terminated());
    assert_eq!(decoded.name.text(), "AAAAAAAAAAAAAAAA");
    roundtrip_command(Command::ConfigureOutput(cmd));
}

#[test]
fn test_configure_output_embedded_nul() {
    let mut raw = [0u8; 16];
    raw[..3].copy_from_slice(b"Dew");
    raw[4..8].copy_from_slice(b"junk");
    let cmd = ConfigureOutputCommand {
        output_number: 0,
        output_type: 0,
        fuse_current: 0,
        name: OutputName::new(raw),
    };

    let decoded = ConfigureOutputCommand::from_slice(&cmd.to_bytes()).unwrap();
    assert_eq!(decoded.name.as_bytes(), &raw, "Bytes after the NUL must survive");
    assert!(decoded.name.is_terminated());
    assert_eq!(decoded.name.text(), "Dew");
    roundtrip(cmd);
}

#[test]
fn test_parameterless_commands_are_single_bytes() {
    let cases: [(Command, u8); 6] = [
        (Command::Identify, 0x01),
        (Command::GetFactorySettings, 0x02),
        (Command::GetStatus, 0x04),
        (Command::DumpFactory, 0xF0),
        (Command::DumpOutputs, 0xF1),
        (Command::DumpState, 0xF2),
    ];
    for (command, byte) in cases {
        assert_eq!(command.to_bytes().as_ref(), &[byte]);
        roundtrip_command(command);
    }
}

#[test]
fn test_sequence_roundtrip() {
    let commands = vec![
        Command::SetRelay(SetRelayCommand::new(0, true)),
        Command::SetPwmDuty(SetPwmDutyCommand {
            output_number: 1,
            duty: 40,
        }),
        Command::GetStatus,
    ];
    let bytes = encode_sequence(&commands).unwrap();
    assert_eq!(bytes.as_ref(), &[0x10, 0x00, 0x01, 0x11, 0x01, 0x28, 0x04, 0x00]);
    assert_eq!(decode_sequence(bytes).unwrap(), commands);
}
