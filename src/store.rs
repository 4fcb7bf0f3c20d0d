//! Configuration store.
//!
//! Holds the committed value of every advertising and scanning field.  A
//! value enters the store only through [`ConfigStore::commit`], after the
//! validator has normalized it and (when the radio is live) after the
//! radio has accepted it, so a read always returns what the hardware is
//! actually using.
//!
//! Commits are refused while a radio command touching the same field is
//! queued or in flight, and for fields the current controller states lock.

use core::time::Duration;

use log::debug;

use crate::ad;
use crate::arbiter::command::{Resource, ResourceSet};
use crate::config::RadioCapabilities;
use crate::controller::advertising::AdvState;
use crate::controller::scanning::ScanState;
use crate::error::{CommitError, ValidationError};
use crate::model::{
    AdPayload, AdvInterval, AdvertisementType, ChannelMask, RadioAddress, ScanParams,
    MAX_MANUFACTURER_DATA_LEN,
};
use crate::validator;

/// Application bytes carried in the manufacturer-specific structure.
pub type ManufacturerData = heapless::Vec<u8, MAX_MANUFACTURER_DATA_LEN>;

/// Names of the stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Address,
    AdvType,
    TxPower,
    Interval,
    ChannelMask,
    ManufacturerId,
    Payload,
    ScanResponse,
    ScanParams,
}

impl Field {
    /// Radio resource whose in-flight commands lock this field.
    pub const fn resource(self) -> Resource {
        match self {
            Self::Address => Resource::Address,
            Self::AdvType => Resource::AdvType,
            Self::TxPower => Resource::TxPower,
            Self::Interval => Resource::Interval,
            Self::ChannelMask => Resource::ChannelMask,
            Self::ManufacturerId | Self::Payload => Resource::Payload,
            Self::ScanResponse => Resource::ScanResponse,
            Self::ScanParams => Resource::ScanParams,
        }
    }
}

/// A validated value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    Address(RadioAddress),
    AdvType(AdvertisementType),
    TxPower(i8),
    Interval(AdvInterval),
    ChannelMask(ChannelMask),
    ManufacturerId(u16),
    Payload(ManufacturerData),
    /// Empty clears the scan response.
    ScanResponse(AdPayload),
    ScanParams(ScanParams),
}

impl Setting {
    pub fn field(&self) -> Field {
        match self {
            Self::Address(_) => Field::Address,
            Self::AdvType(_) => Field::AdvType,
            Self::TxPower(_) => Field::TxPower,
            Self::Interval(_) => Field::Interval,
            Self::ChannelMask(_) => Field::ChannelMask,
            Self::ManufacturerId(_) => Field::ManufacturerId,
            Self::Payload(_) => Field::Payload,
            Self::ScanResponse(_) => Field::ScanResponse,
            Self::ScanParams(_) => Field::ScanParams,
        }
    }
}

/// Snapshot of everything that decides whether a commit may proceed.
#[derive(Debug, Clone, Copy)]
pub struct CommitGuard {
    pub busy: ResourceSet,
    pub adv: AdvState,
    pub scan: ScanState,
}

pub struct ConfigStore {
    initialized: bool,
    address: Option<RadioAddress>,
    adv_type: AdvertisementType,
    tx_power: i8,
    interval: AdvInterval,
    channels: ChannelMask,
    manufacturer_id: Option<u16>,
    payload: ManufacturerData,
    scan_response: AdPayload,
    scan_params: Option<ScanParams>,
}

impl ConfigStore {
    /// Store holding the capability defaults, not yet initialised.
    /// `caps` is expected to have passed [`RadioCapabilities::check`].
    pub fn new(caps: &RadioCapabilities) -> Self {
        Self {
            initialized: false,
            address: None,
            adv_type: AdvertisementType::default(),
            tx_power: caps.default_tx_power_dbm,
            interval: validator::validate_interval(
                caps,
                Duration::from_millis(caps.adv_interval_default_ms as u64),
            ),
            channels: ChannelMask::ALL,
            manufacturer_id: None,
            payload: ManufacturerData::new(),
            scan_response: AdPayload::new(),
            scan_params: None,
        }
    }

    /// Reset to defaults and open for commits.
    pub fn init(&mut self, caps: &RadioCapabilities, factory_address: Option<RadioAddress>) {
        *self = Self::new(caps);
        self.address = factory_address;
        self.initialized = true;
        debug!("config store initialised (address {:?})", factory_address);
    }

    /// Reset to defaults and close for commits.
    pub fn clear(&mut self, caps: &RadioCapabilities) {
        *self = Self::new(caps);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether `setting` may be committed under `guard`.
    pub fn check(&self, setting: &Setting, guard: &CommitGuard) -> Result<(), CommitError> {
        if !self.initialized {
            return Err(CommitError::NotInitialized);
        }
        let advertising = guard.adv.is_active();
        match setting {
            Setting::Address(_) | Setting::AdvType(_) if advertising => {
                return Err(CommitError::InvalidState);
            }
            Setting::ChannelMask(mask) if advertising && mask.is_empty() => {
                return Err(CommitError::InvalidState);
            }
            Setting::ScanParams(_) if guard.scan == ScanState::Scanning => {
                return Err(CommitError::InvalidState);
            }
            _ => {}
        }
        if guard.busy.contains(setting.field().resource()) {
            return Err(CommitError::Busy);
        }
        Ok(())
    }

    /// Atomically replace one field.
    pub fn commit(&mut self, setting: Setting, guard: &CommitGuard) -> Result<(), CommitError> {
        self.check(&setting, guard)?;
        debug!("commit {:?}", setting);
        match setting {
            Setting::Address(v) => self.address = Some(v),
            Setting::AdvType(v) => self.adv_type = v,
            Setting::TxPower(v) => self.tx_power = v,
            Setting::Interval(v) => self.interval = v,
            Setting::ChannelMask(v) => self.channels = v,
            Setting::ManufacturerId(v) => self.manufacturer_id = Some(v),
            Setting::Payload(v) => self.payload = v,
            Setting::ScanResponse(v) => self.scan_response = v,
            Setting::ScanParams(v) => self.scan_params = Some(v),
        }
        Ok(())
    }

    /// Current value of `field`, `None` if it has never been set.
    pub fn get(&self, field: Field) -> Option<Setting> {
        Some(match field {
            Field::Address => Setting::Address(self.address?),
            Field::AdvType => Setting::AdvType(self.adv_type),
            Field::TxPower => Setting::TxPower(self.tx_power),
            Field::Interval => Setting::Interval(self.interval),
            Field::ChannelMask => Setting::ChannelMask(self.channels),
            Field::ManufacturerId => Setting::ManufacturerId(self.manufacturer_id?),
            Field::Payload => Setting::Payload(self.payload.clone()),
            Field::ScanResponse => Setting::ScanResponse(self.scan_response.clone()),
            Field::ScanParams => Setting::ScanParams(self.scan_params?),
        })
    }

    // ── Typed reads ───────────────────────────────────────────

    pub fn address(&self) -> Option<RadioAddress> {
        self.address
    }

    pub fn adv_type(&self) -> AdvertisementType {
        self.adv_type
    }

    pub fn tx_power(&self) -> i8 {
        self.tx_power
    }

    pub fn interval(&self) -> AdvInterval {
        self.interval
    }

    pub fn channels(&self) -> ChannelMask {
        self.channels
    }

    /// Configured company identifier; unset reads as `0xFFFF`.
    pub fn manufacturer_id(&self) -> u16 {
        self.manufacturer_id.unwrap_or(ad::UNKNOWN_MANUFACTURER_ID)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn scan_response(&self) -> &[u8] {
        &self.scan_response
    }

    pub fn scan_params(&self) -> Option<ScanParams> {
        self.scan_params
    }

    /// Advertising data as it goes on air.
    pub fn encoded_payload(&self) -> Result<AdPayload, ValidationError> {
        ad::manufacturer_payload(self.manufacturer_id(), &self.payload)
    }

    /// First field required to start advertising that is missing.
    pub fn missing_for_advertising(&self) -> Option<Field> {
        if self.address.is_none() {
            return Some(Field::Address);
        }
        if self.channels.is_empty() {
            return Some(Field::ChannelMask);
        }
        None
    }
}
