//! Radio commands and the resources they touch.

use core::fmt;

use crate::model::{AdPayload, AdvInterval, AdvertisementType, ChannelMask, RadioAddress, ScanParams};

/// Identifier the driver echoes back in `Ack` / `Fault`.  Wraps at `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(pub u32);

/// Identifier of one logical operation (a run of commands settled together).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(pub(crate) u32);

/// Which controller a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Advertising,
    Scanning,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A single command for the radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCommand {
    SetAddress(RadioAddress),
    SetTxPower(i8),
    SetInterval(AdvInterval),
    SetChannelMask(ChannelMask),
    SetPayload(AdPayload),
    SetScanResponse(AdPayload),
    AdvStart(AdvertisementType),
    AdvStop,
    ScanStart(ScanParams),
    ScanStop,
}

/// Payload-free discriminant of [`RadioCommand`], cheap to log and store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SetAddress,
    SetTxPower,
    SetInterval,
    SetChannelMask,
    SetPayload,
    SetScanResponse,
    AdvStart,
    AdvStop,
    ScanStart,
    ScanStop,
}

impl RadioCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::SetAddress(_) => CommandKind::SetAddress,
            Self::SetTxPower(_) => CommandKind::SetTxPower,
            Self::SetInterval(_) => CommandKind::SetInterval,
            Self::SetChannelMask(_) => CommandKind::SetChannelMask,
            Self::SetPayload(_) => CommandKind::SetPayload,
            Self::SetScanResponse(_) => CommandKind::SetScanResponse,
            Self::AdvStart(_) => CommandKind::AdvStart,
            Self::AdvStop => CommandKind::AdvStop,
            Self::ScanStart(_) => CommandKind::ScanStart,
            Self::ScanStop => CommandKind::ScanStop,
        }
    }

    /// The configuration resource this command reads or changes.
    pub fn resource(&self) -> Resource {
        match self {
            Self::SetAddress(_) => Resource::Address,
            Self::SetTxPower(_) => Resource::TxPower,
            Self::SetInterval(_) => Resource::Interval,
            Self::SetChannelMask(_) => Resource::ChannelMask,
            Self::SetPayload(_) => Resource::Payload,
            Self::SetScanResponse(_) => Resource::ScanResponse,
            Self::AdvStart(_) | Self::AdvStop => Resource::AdvType,
            Self::ScanStart(_) | Self::ScanStop => Resource::ScanParams,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetAddress => "set_address",
            Self::SetTxPower => "set_tx_power",
            Self::SetInterval => "set_interval",
            Self::SetChannelMask => "set_channel_mask",
            Self::SetPayload => "set_payload",
            Self::SetScanResponse => "set_scan_response",
            Self::AdvStart => "adv_start",
            Self::AdvStop => "adv_stop",
            Self::ScanStart => "scan_start",
            Self::ScanStop => "scan_stop",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Logical configuration resources tracked for in-flight detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Resource {
    Address = 0b0000_0001,
    Payload = 0b0000_0010,
    ScanResponse = 0b0000_0100,
    TxPower = 0b0000_1000,
    Interval = 0b0001_0000,
    ChannelMask = 0b0010_0000,
    AdvType = 0b0100_0000,
    ScanParams = 0b1000_0000,
}

impl Resource {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

/// Bitset of [`Resource`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ResourceSet(u8);

impl ResourceSet {
    pub const EMPTY: Self = Self(0);

    pub fn insert(&mut self, resource: Resource) {
        self.0 |= resource.mask();
    }

    pub const fn contains(self, resource: Resource) -> bool {
        self.0 & resource.mask() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}
