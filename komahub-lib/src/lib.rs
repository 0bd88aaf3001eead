pub mod command;
pub mod constants;
pub mod error;
pub mod payload;
pub mod response;

#[cfg(test)]
mod tests;

pub use command::{Command, CommandClass, CommandCode, UnrecognizedCommand, decode_sequence, encode_sequence};
pub use error::KomaError;
pub use payload::{
    ConfigureOutputCommand, FactoryResetCommand, GetOutputSettingsCommand, OutputName, Payload, ResetFuseCommand,
    SetPwmDutyCommand, SetRelayCommand, UpdateSettingsCommand,
};
pub use response::{FactorySettings, OutputSettings, OutputStatus, Reply, Status};
