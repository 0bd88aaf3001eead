use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use komahub_lib::constants::{MAX_DUTY, OUTPUT_COUNT, OUTPUT_NAME_LEN};
use komahub_lib::{
    Command, CommandCode, ConfigureOutputCommand, FactoryResetCommand, GetOutputSettingsCommand, KomaError,
    OutputName, Reply, ResetFuseCommand, SetPwmDutyCommand, SetRelayCommand, decode_sequence,
};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Largest fuse current the hub stores, in amperes (one byte of tenths)
const MAX_FUSE_CURRENT_A: f64 = 25.5;

/// Build and inspect KomaHub USB commands and replies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// List every opcode with its class and payload size
    Codes,
    /// Print the wire bytes of one command as hex
    Encode {
        #[command(subcommand)]
        command: CommandArgs,
    },
    /// Decode a captured command sequence
    Decode {
        /// Hex bytes; spaces and colons are ignored
        hex: String,
        /// Keep unknown opcodes instead of failing
        #[arg(long)]
        lenient: bool,
    },
    /// Decode a captured device reply
    Reply {
        #[arg(value_enum)]
        kind: ReplyKind,
        /// Hex bytes; spaces and colons are ignored
        hex: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum CommandArgs {
    End,
    Identify,
    GetFactorySettings,
    GetStatus,
    DumpFactory,
    DumpOutputs,
    DumpState,
    GetOutputSettings {
        #[arg(short, long, value_parser = output_number)]
        output: u8,
    },
    #[command(group(ArgGroup::new("state").required(true).args(["on", "off"])))]
    SetRelay {
        #[arg(short, long, value_parser = output_number)]
        output: u8,
        #[arg(long)]
        on: bool,
        #[arg(long)]
        off: bool,
    },
    SetPwmDuty {
        #[arg(short, long, value_parser = output_number)]
        output: u8,
        /// Duty cycle in percent
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_DUTY)))]
        duty: u8,
    },
    ResetFuse {
        #[arg(short, long, value_parser = output_number)]
        output: u8,
    },
    ConfigureOutput {
        #[arg(short, long, value_parser = output_number)]
        output: u8,
        #[arg(long)]
        output_type: u8,
        /// Fuse current in amperes, stored in tenths
        #[arg(long, value_parser = fuse_current_tenths)]
        fuse_current: u8,
        #[arg(long, value_parser = output_name)]
        name: OutputName,
    },
    FactoryReset {
        #[arg(long)]
        serial: u16,
        #[arg(long)]
        r6_ohms: u16,
        #[arg(long)]
        r7_ohms: u16,
        /// Confirm that the hub's settings will be wiped
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    Factory,
    Output,
    Status,
}

impl From<ReplyKind> for CommandCode {
    fn from(kind: ReplyKind) -> Self {
        match kind {
            ReplyKind::Factory => CommandCode::GetFactorySettings,
            ReplyKind::Output => CommandCode::GetOutputSettings,
            ReplyKind::Status => CommandCode::GetStatus,
        }
    }
}

fn output_number(s: &str) -> Result<u8, String> {
    let n: u8 = s.parse().map_err(|e| format!("{e}"))?;
    if usize::from(n) >= OUTPUT_COUNT {
        return Err(format!("output must be below {OUTPUT_COUNT}"));
    }
    Ok(n)
}

fn fuse_current_tenths(s: &str) -> Result<u8, String> {
    let amps: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=MAX_FUSE_CURRENT_A).contains(&amps) {
        return Err(format!("fuse current must be between 0.0 and {MAX_FUSE_CURRENT_A} A"));
    }
    Ok((amps * 10.0).round() as u8)
}

fn output_name(s: &str) -> Result<OutputName, String> {
    OutputName::try_from(s).map_err(|_| format!("name is {} bytes, at most {OUTPUT_NAME_LEN} fit", s.len()))
}

fn parse_hex(input: &str) -> Result<Bytes, KomaError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let cleaned = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    Ok(Bytes::from(hex::decode(cleaned)?))
}

impl CommandArgs {
    fn build(self) -> Result<Command> {
        let command = match self {
            CommandArgs::End => Command::End,
            CommandArgs::Identify => Command::Identify,
            CommandArgs::GetFactorySettings => Command::GetFactorySettings,
            CommandArgs::GetStatus => Command::GetStatus,
            CommandArgs::DumpFactory => Command::DumpFactory,
            CommandArgs::DumpOutputs => Command::DumpOutputs,
            CommandArgs::DumpState => Command::DumpState,
            CommandArgs::GetOutputSettings { output } => {
                Command::GetOutputSettings(GetOutputSettingsCommand { output_number: output })
            }
            CommandArgs::SetRelay { output, on, .. } => Command::SetRelay(SetRelayCommand::new(output, on)),
            CommandArgs::SetPwmDuty { output, duty } => Command::SetPwmDuty(SetPwmDutyCommand {
                output_number: output,
                duty,
            }),
            CommandArgs::ResetFuse { output } => Command::ResetFuse(ResetFuseCommand { output_number: output }),
            CommandArgs::ConfigureOutput {
                output,
                output_type,
                fuse_current,
                name,
            } => Command::ConfigureOutput(ConfigureOutputCommand {
                output_number: output,
                output_type,
                fuse_current,
                name,
            }),
            CommandArgs::FactoryReset {
                serial,
                r6_ohms,
                r7_ohms,
                yes,
            } => {
                if !yes {
                    bail!("FACTORYRESET wipes the hub's settings, pass --yes to encode it");
                }
                Command::FactoryReset(FactoryResetCommand {
                    serial,
                    r6_ohms,
                    r7_ohms,
                })
            }
        };
        Ok(command)
    }
}

fn decode_lenient(mut bytes: Bytes) -> Result<Vec<Command>, KomaError> {
    let mut commands = Vec::new();
    while !bytes.is_empty() {
        let command = Command::decode(&mut bytes)?;
        if command == Command::End {
            break;
        }
        if let Command::Unrecognized(unknown) = &command {
            warn!("Keeping unknown opcode 0x{:02x}", unknown.code());
        }
        commands.push(command);
    }
    Ok(commands)
}

fn init_tracing(verbose: &Verbosity<InfoLevel>) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbose.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_codes(as_json: bool) -> Result<()> {
    if as_json {
        let codes: Vec<_> = CommandCode::ALL
            .iter()
            .map(|code| {
                json!({
                    "name": code.to_string(),
                    "value": u8::from(*code),
                    "class": code.class().to_string(),
                    "payload_len": code.payload_len(),
                    "expects_reply": code.expects_reply(),
                    "destructive": code.is_destructive(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&codes)?);
        return Ok(());
    }

    println!("{:<6} {:<20} {:<11} {:>7}  Reply", "Value", "Name", "Class", "Payload");
    for code in CommandCode::ALL {
        let mut name = code.to_string();
        if code.is_destructive() {
            name.push_str(" (!)");
        }
        println!(
            "0x{:02X}   {:<20} {:<11} {:>7}  {}",
            u8::from(code),
            name,
            code.class().to_string(),
            code.payload_len(),
            if code.expects_reply() { "yes" } else { "-" }
        );
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.action {
        Action::Codes => print_codes(cli.json)?,
        Action::Encode { command } => {
            let command = command.build()?;
            let bytes = command.to_bytes();
            info!("Encoded {}", command);
            if cli.json {
                let mut value = serde_json::to_value(&command)?;
                value["hex"] = json!(hex::encode(&bytes));
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", hex::encode(&bytes));
            }
        }
        Action::Decode { hex, lenient } => {
            let bytes = parse_hex(&hex).context("Failed to parse command hex")?;
            debug!("Decoding {} bytes", bytes.len());
            let commands = if lenient {
                decode_lenient(bytes)
            } else {
                decode_sequence(bytes)
            }
            .context("Failed to decode command sequence")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&commands)?);
            } else if commands.is_empty() {
                info!("No commands before END");
            } else {
                for command in &commands {
                    println!("{}", command);
                }
            }
        }
        Action::Reply { kind, hex } => {
            let bytes = parse_hex(&hex).context("Failed to parse reply hex")?;
            let code = CommandCode::from(kind);
            let reply = Reply::decode(code, &bytes).with_context(|| format!("Failed to decode {} reply", code))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                println!("{}", reply);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.verbose);
    run(cli)
}
