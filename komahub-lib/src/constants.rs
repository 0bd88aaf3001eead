// Protocol constants for the KomaHub

/// Number of switchable outputs on the hub
pub const OUTPUT_COUNT: usize = 6;

/// Upper bound of the PWM duty contract (percent, inclusive)
pub const MAX_DUTY: u8 = 100;

/// Capacity of an output name buffer
pub const OUTPUT_NAME_LEN: usize = 16;

/// Number of external temperature probe slots in a status reply
pub const EXTERNAL_TEMPERATURE_SLOTS: usize = 4;

/// Size of the FACTORYRESET payload (3 x u16)
pub const FACTORY_RESET_SIZE: usize = 6;

/// Size of the CONFIGUREOUTPUT payload (3 x u8 + name)
pub const CONFIGURE_OUTPUT_SIZE: usize = 3 + OUTPUT_NAME_LEN;

/// Size of the GETFACTORYSETTINGS reply
pub const FACTORY_SETTINGS_SIZE: usize = 4;

/// Size of the GETOUTPUTSETTINGS reply
pub const OUTPUT_SETTINGS_SIZE: usize = OUTPUT_NAME_LEN + 2;

/// Size of the GETSTATUS reply
pub const STATUS_SIZE: usize = 43;
