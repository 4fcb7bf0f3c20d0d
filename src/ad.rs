//! Advertising-data (AD structure) encoding.
//!
//! Each AD structure is `[len, type, data...]` where `len` counts the type
//! byte plus the data.  The HAL only ever builds two layouts:
//!
//! ```text
//!  advertising: [02 01 04] [len FF id_lo id_hi payload...]
//!  scan resp.:  [len 09 name...] [11 07 uuid128(le)]
//! ```

use crate::error::ValidationError;
use crate::model::{AdPayload, MAX_AD_DATA_LEN};
use crate::validator;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_COMPLETE_UUID128_LIST: u8 = 0x07;
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const AD_TYPE_MANUFACTURER_SPECIFIC: u8 = 0xFF;

/// "BR/EDR not supported" - the only flag a non-discoverable beacon sets.
pub const FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;

/// Company identifier used when none has been configured.
pub const UNKNOWN_MANUFACTURER_ID: u16 = 0xFFFF;

/// Encode flags plus manufacturer-specific data.  A manufacturer id of `0`
/// is treated as unset and encoded as [`UNKNOWN_MANUFACTURER_ID`].
pub fn manufacturer_payload(manufacturer_id: u16, data: &[u8]) -> Result<AdPayload, ValidationError> {
    validator::validate_manufacturer_data(data)?;
    let id = if manufacturer_id == 0 {
        UNKNOWN_MANUFACTURER_ID
    } else {
        manufacturer_id
    };

    let mut out = AdPayload::new();
    push_structure(&mut out, AD_TYPE_FLAGS, &[FLAG_BR_EDR_NOT_SUPPORTED])?;

    let mut body: heapless::Vec<u8, MAX_AD_DATA_LEN> = heapless::Vec::new();
    body.extend_from_slice(&id.to_le_bytes())
        .map_err(|_| ValidationError::UnsupportedLength)?;
    body.extend_from_slice(data)
        .map_err(|_| ValidationError::UnsupportedLength)?;
    push_structure(&mut out, AD_TYPE_MANUFACTURER_SPECIFIC, &body)?;
    Ok(out)
}

/// Encode a scan response carrying a complete local name and/or one
/// 128-bit service UUID.
pub fn scan_response(name: Option<&str>, service_uuid: Option<u128>) -> Result<AdPayload, ValidationError> {
    let mut out = AdPayload::new();
    if let Some(name) = name {
        validator::validate_device_name(name)?;
        push_structure(&mut out, AD_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes())?;
    }
    if let Some(uuid) = service_uuid {
        push_structure(&mut out, AD_TYPE_COMPLETE_UUID128_LIST, &uuid.to_le_bytes())?;
    }
    Ok(out)
}

fn push_structure(out: &mut AdPayload, ad_type: u8, data: &[u8]) -> Result<(), ValidationError> {
    if out.len() + 2 + data.len() > MAX_AD_DATA_LEN {
        return Err(ValidationError::UnsupportedLength);
    }
    // Length checked above, so none of these pushes can fail.
    let _ = out.push((data.len() + 1) as u8);
    let _ = out.push(ad_type);
    let _ = out.extend_from_slice(data);
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing (scan reports)
// ---------------------------------------------------------------------------

/// Iterator over `(ad_type, data)` pairs.  Stops at the first zero-length
/// or truncated structure.
pub struct AdStructures<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, tail) = self.rest.split_first()?;
        let len = len as usize;
        if len == 0 || len > tail.len() {
            self.rest = &[];
            return None;
        }
        let (structure, rest) = tail.split_at(len);
        self.rest = rest;
        Some((structure[0], &structure[1..]))
    }
}

pub fn structures(data: &[u8]) -> AdStructures<'_> {
    AdStructures { rest: data }
}

/// First manufacturer-specific structure as `(company_id, payload)`.
pub fn find_manufacturer_data(data: &[u8]) -> Option<(u16, &[u8])> {
    structures(data)
        .find(|(ty, body)| *ty == AD_TYPE_MANUFACTURER_SPECIFIC && body.len() >= 2)
        .map(|(_, body)| (u16::from_le_bytes([body[0], body[1]]), &body[2..]))
}
