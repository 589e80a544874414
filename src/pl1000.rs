use std::fmt;

/// Raw status code returned by every `pl1000*` call.
pub type PicoStatusCode = u32;

/// Unit handle handed out by `pl1000OpenUnit`.
pub type Handle = i16;

pub const MAX_CHANNELS: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum PicoStatus {
    Ok,
    MaxUnitsOpened,
    MemoryFail,
    NotFound,
    FwFail,
    OpenOperationInProgress,
    OperationFailed,
    NotResponding,
    ConfigFail,
    KernelDriverTooOld,
    EepromCorrupt,
    OsNotSupported,
    InvalidHandle,
    InvalidParameter,
    InvalidTimebase,
    InvalidVoltageRange,
    InvalidChannel,
    InvalidTriggerChannel,
    InvalidConditionChannel,
    NoSignalGenerator,
    StreamingFailed,
    BlockModeFailed,
    NullParameter,
    EtsModeSet,
    DataNotAvailable,
    StringBufferTooSmall,
    EtsNotSupported,
    AutoTriggerTimeTooShort,
    BufferStall,
    TooManySamples,
    TooManySegments,
    PulseWidthQualifier,
    Delay,
    SourceDetails,
    Conditions,
    UserCallback,
    DeviceSampling,
    NoSamplesAvailable,
    SegmentOutOfRange,
    Busy,
    StartIndexInvalid,
    InvalidInfo,
    InfoUnavailable,
    InvalidSampleInterval,
    TriggerError,
    Memory,
    /// A code outside the known status table, kept as returned.
    Unknown(PicoStatusCode),
}

const LAST_KNOWN_CODE: PicoStatusCode = 0x2D;

impl From<PicoStatusCode> for PicoStatus {
    fn from(value: PicoStatusCode) -> Self {
        match value {
            0x00 => Self::Ok,
            0x01 => Self::MaxUnitsOpened,
            0x02 => Self::MemoryFail,
            0x03 => Self::NotFound,
            0x04 => Self::FwFail,
            0x05 => Self::OpenOperationInProgress,
            0x06 => Self::OperationFailed,
            0x07 => Self::NotResponding,
            0x08 => Self::ConfigFail,
            0x09 => Self::KernelDriverTooOld,
            0x0A => Self::EepromCorrupt,
            0x0B => Self::OsNotSupported,
            0x0C => Self::InvalidHandle,
            0x0D => Self::InvalidParameter,
            0x0E => Self::InvalidTimebase,
            0x0F => Self::InvalidVoltageRange,
            0x10 => Self::InvalidChannel,
            0x11 => Self::InvalidTriggerChannel,
            0x12 => Self::InvalidConditionChannel,
            0x13 => Self::NoSignalGenerator,
            0x14 => Self::StreamingFailed,
            0x15 => Self::BlockModeFailed,
            0x16 => Self::NullParameter,
            0x17 => Self::EtsModeSet,
            0x18 => Self::DataNotAvailable,
            0x19 => Self::StringBufferTooSmall,
            0x1A => Self::EtsNotSupported,
            0x1B => Self::AutoTriggerTimeTooShort,
            0x1C => Self::BufferStall,
            0x1D => Self::TooManySamples,
            0x1E => Self::TooManySegments,
            0x1F => Self::PulseWidthQualifier,
            0x20 => Self::Delay,
            0x21 => Self::SourceDetails,
            0x22 => Self::Conditions,
            0x23 => Self::UserCallback,
            0x24 => Self::DeviceSampling,
            0x25 => Self::NoSamplesAvailable,
            0x26 => Self::SegmentOutOfRange,
            0x27 => Self::Busy,
            0x28 => Self::StartIndexInvalid,
            0x29 => Self::InvalidInfo,
            0x2A => Self::InfoUnavailable,
            0x2B => Self::InvalidSampleInterval,
            0x2C => Self::TriggerError,
            0x2D => Self::Memory,
            code => Self::Unknown(code),
        }
    }
}

impl PicoStatus {
    /// Turn a raw return code into `Ok(())` or the failing status.
    pub fn check(code: PicoStatusCode) -> Result<(), PicoStatus> {
        match PicoStatus::from(code) {
            PicoStatus::Ok => Ok(()),
            status => Err(status),
        }
    }

    /// Raw vendor code of this status.
    pub fn code(&self) -> PicoStatusCode {
        match self {
            Self::Unknown(code) => *code,
            known => (0..=LAST_KNOWN_CODE)
                .find(|&c| PicoStatus::from(c) == *known)
                .unwrap_or(PicoStatusCode::MAX),
        }
    }

    /// Symbolic name as used in the vendor headers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ok => "PICO_OK",
            Self::MaxUnitsOpened => "PICO_MAX_UNITS_OPENED",
            Self::MemoryFail => "PICO_MEMORY_FAIL",
            Self::NotFound => "PICO_NOT_FOUND",
            Self::FwFail => "PICO_FW_FAIL",
            Self::OpenOperationInProgress => "PICO_OPEN_OPERATION_IN_PROGRESS",
            Self::OperationFailed => "PICO_OPERATION_FAILED",
            Self::NotResponding => "PICO_NOT_RESPONDING",
            Self::ConfigFail => "PICO_CONFIG_FAIL",
            Self::KernelDriverTooOld => "PICO_KERNEL_DRIVER_TOO_OLD",
            Self::EepromCorrupt => "PICO_EEPROM_CORRUPT",
            Self::OsNotSupported => "PICO_OS_NOT_SUPPORTED",
            Self::InvalidHandle => "PICO_INVALID_HANDLE",
            Self::InvalidParameter => "PICO_INVALID_PARAMETER",
            Self::InvalidTimebase => "PICO_INVALID_TIMEBASE",
            Self::InvalidVoltageRange => "PICO_INVALID_VOLTAGE_RANGE",
            Self::InvalidChannel => "PICO_INVALID_CHANNEL",
            Self::InvalidTriggerChannel => "PICO_INVALID_TRIGGER_CHANNEL",
            Self::InvalidConditionChannel => "PICO_INVALID_CONDITION_CHANNEL",
            Self::NoSignalGenerator => "PICO_NO_SIGNAL_GENERATOR",
            Self::StreamingFailed => "PICO_STREAMING_FAILED",
            Self::BlockModeFailed => "PICO_BLOCK_MODE_FAILED",
            Self::NullParameter => "PICO_NULL_PARAMETER",
            Self::EtsModeSet => "PICO_ETS_MODE_SET",
            Self::DataNotAvailable => "PICO_DATA_NOT_AVAILABLE",
            Self::StringBufferTooSmall => "PICO_STRING_BUFFER_TO_SMALL",
            Self::EtsNotSupported => "PICO_ETS_NOT_SUPPORTED",
            Self::AutoTriggerTimeTooShort => "PICO_AUTO_TRIGGER_TIME_TO_SHORT",
            Self::BufferStall => "PICO_BUFFER_STALL",
            Self::TooManySamples => "PICO_TOO_MANY_SAMPLES",
            Self::TooManySegments => "PICO_TOO_MANY_SEGMENTS",
            Self::PulseWidthQualifier => "PICO_PULSE_WIDTH_QUALIFIER",
            Self::Delay => "PICO_DELAY",
            Self::SourceDetails => "PICO_SOURCE_DETAILS",
            Self::Conditions => "PICO_CONDITIONS",
            Self::UserCallback => "PICO_USER_CALLBACK",
            Self::DeviceSampling => "PICO_DEVICE_SAMPLING",
            Self::NoSamplesAvailable => "PICO_NO_SAMPLES_AVAILABLE",
            Self::SegmentOutOfRange => "PICO_SEGMENT_OUT_OF_RANGE",
            Self::Busy => "PICO_BUSY",
            Self::StartIndexInvalid => "PICO_STARTINDEX_INVALID",
            Self::InvalidInfo => "PICO_INVALID_INFO",
            Self::InfoUnavailable => "PICO_INFO_UNAVAILABLE",
            Self::InvalidSampleInterval => "PICO_INVALID_SAMPLE_INTERVAL",
            Self::TriggerError => "PICO_TRIGGER_ERROR",
            Self::Memory => "PICO_MEMORY",
            Self::Unknown(_) => "PICO_UNKNOWN_STATUS",
        }
    }
}

impl fmt::Display for PicoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "{} 0x{:02X}", self.name(), code),
            _ => f.write_str(self.name()),
        }
    }
}

#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PicoInfo {
    DriverVersion = 0,
    UsbVersion = 1,
    HardwareVersion = 2,
    VariantInfo = 3,
    BatchAndSerial = 4,
    CalDate = 5,
    KernelVersion = 6,
    DigitalHardwareVersion = 7,
    AnalogueHardwareVersion = 8,
    FirmwareVersion1 = 9,
    FirmwareVersion2 = 10,
}

impl PicoInfo {
    pub const ALL: [PicoInfo; 11] = [
        PicoInfo::DriverVersion,
        PicoInfo::UsbVersion,
        PicoInfo::HardwareVersion,
        PicoInfo::VariantInfo,
        PicoInfo::BatchAndSerial,
        PicoInfo::CalDate,
        PicoInfo::KernelVersion,
        PicoInfo::DigitalHardwareVersion,
        PicoInfo::AnalogueHardwareVersion,
        PicoInfo::FirmwareVersion1,
        PicoInfo::FirmwareVersion2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DriverVersion => "PICO_DRIVER_VERSION",
            Self::UsbVersion => "PICO_USB_VERSION",
            Self::HardwareVersion => "PICO_HARDWARE_VERSION",
            Self::VariantInfo => "PICO_VARIANT_INFO",
            Self::BatchAndSerial => "PICO_BATCH_AND_SERIAL",
            Self::CalDate => "PICO_CAL_DATE",
            Self::KernelVersion => "PICO_KERNEL_VERSION",
            Self::DigitalHardwareVersion => "PICO_DIGITAL_HARDWARE_VERSION",
            Self::AnalogueHardwareVersion => "PICO_ANALOGUE_HARDWARE_VERSION",
            Self::FirmwareVersion1 => "PICO_FIRMWARE_VERSION_1",
            Self::FirmwareVersion2 => "PICO_FIRMWARE_VERSION_2",
        }
    }
}

/// Capture modes accepted by `pl1000Run`.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BlockMethod {
    #[default]
    Single = 0,
    Window = 1,
    Stream = 2,
}

/// Symbolic input names, indexed by channel number minus one.
const INPUT_NAMES: [&str; MAX_CHANNELS] = [
    "PL1000_CHANNEL_1",
    "PL1000_CHANNEL_2",
    "PL1000_CHANNEL_3",
    "PL1000_CHANNEL_4",
    "PL1000_CHANNEL_5",
    "PL1000_CHANNEL_6",
    "PL1000_CHANNEL_7",
    "PL1000_CHANNEL_8",
    "PL1000_CHANNEL_9",
    "PL1000_CHANNEL_10",
    "PL1000_CHANNEL_11",
    "PL1000_CHANNEL_12",
    "PL1000_CHANNEL_13",
    "PL1000_CHANNEL_14",
    "PL1000_CHANNEL_15",
    "PL1000_CHANNEL_16",
];

/// Resolve a `PL1000_CHANNEL_n` name to its channel number.
pub fn input_from_name(name: &str) -> Option<u16> {
    INPUT_NAMES
        .iter()
        .position(|&n| n == name.trim())
        .map(|i| i as u16 + 1)
}

pub fn input_name(channel: u16) -> Option<&'static str> {
    INPUT_NAMES.get((channel as usize).checked_sub(1)?).copied()
}

/// Values reported by `pl1000GetValues` next to the sample buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GetValues {
    /// Samples per channel actually written.
    pub delivered: u32,
    pub overflow: u16,
    pub trigger_index: u32,
}

/// The vendor call surface.
///
/// Every call returns the vendor status on failure. `set_interval` takes the requested
/// block time and sample count by reference because the unit may round them; on return they
/// hold what the hardware will actually use.
pub trait Pl1000Api {
    fn open_unit(&mut self) -> Result<Handle, PicoStatus>;
    fn close_unit(&mut self, handle: Handle) -> Result<(), PicoStatus>;
    fn max_value(&mut self, handle: Handle) -> Result<u16, PicoStatus>;
    fn set_interval(
        &mut self,
        handle: Handle,
        us_for_block: &mut u32,
        samples: &mut u32,
        channels: &[i16],
    ) -> Result<(), PicoStatus>;
    #[allow(clippy::too_many_arguments)]
    fn set_trigger(
        &mut self,
        handle: Handle,
        enabled: u16,
        auto_trigger: u16,
        auto_ms: u16,
        channel: u16,
        direction: u16,
        threshold: u16,
        hysteresis: u16,
        delay: f32,
    ) -> Result<(), PicoStatus>;
    fn run(&mut self, handle: Handle, no_of_values: u32, method: BlockMethod)
        -> Result<(), PicoStatus>;
    fn ready(&mut self, handle: Handle) -> Result<bool, PicoStatus>;
    /// `no_of_values` counts samples per channel. `values` is interleaved, one sample of every
    /// channel per tick, and must hold `no_of_values` ticks.
    fn get_values(
        &mut self,
        handle: Handle,
        values: &mut [u16],
        no_of_values: u32,
    ) -> Result<GetValues, PicoStatus>;
    fn stop(&mut self, handle: Handle) -> Result<(), PicoStatus>;
    fn ping_unit(&mut self, handle: Handle) -> Result<(), PicoStatus>;
    fn get_unit_info(&mut self, handle: Handle, info: PicoInfo) -> Result<String, PicoStatus>;
    fn set_do(&mut self, handle: Handle, do_value: i16, do_number: i16) -> Result<(), PicoStatus>;
    fn set_pulse_width(&mut self, handle: Handle, period: u16, cycle: u8)
        -> Result<(), PicoStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(PicoStatus::from(0), PicoStatus::Ok);
        assert_eq!(PicoStatus::from(3), PicoStatus::NotFound);
        assert_eq!(PicoStatus::from(0x27), PicoStatus::Busy);
        assert_eq!(PicoStatus::from(0x1234), PicoStatus::Unknown(0x1234));
        assert_eq!(PicoStatus::Busy.code(), 0x27);
        assert_eq!(PicoStatus::Memory.code(), 0x2D);
        assert_eq!(PicoStatus::from(0x2E).code(), 0x2E);
        assert_eq!(PicoStatus::NotFound.name(), "PICO_NOT_FOUND");
        assert_eq!(PicoStatus::check(0), Ok(()));
        assert_eq!(PicoStatus::check(0x0D), Err(PicoStatus::InvalidParameter));
        assert_eq!(PicoStatus::check(0x2E), Err(PicoStatus::Unknown(0x2E)));
        assert_eq!(PicoStatus::Unknown(0x2E).to_string(), "PICO_UNKNOWN_STATUS 0x2E");
    }

    #[test]
    fn input_names() {
        assert_eq!(input_from_name("PL1000_CHANNEL_1"), Some(1));
        assert_eq!(input_from_name("PL1000_CHANNEL_16"), Some(16));
        assert_eq!(input_from_name("PL1000_CHANNEL_17"), None);
        assert_eq!(input_name(5), Some("PL1000_CHANNEL_5"));
        assert_eq!(input_name(0), None);
        assert_eq!(input_name(17), None);
    }
}
