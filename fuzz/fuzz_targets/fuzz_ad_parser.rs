//! Fuzz target: AD structure parsing and encoding
//!
//! Scan reports carry whatever bytes a peer put on air.  Walks them with
//! the structure iterator and asserts it never reads past the input; then
//! feeds the same bytes through the manufacturer payload encoder and
//! checks the PDU limit holds.
//!
//! cargo fuzz run fuzz_ad_parser

#![no_main]

use ble_radio_hal::ad;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut consumed = 0usize;
    for (_, body) in ad::structures(data) {
        consumed += body.len() + 2;
    }
    assert!(consumed <= data.len(), "parser overran its input");

    if let Some((_, body)) = ad::find_manufacturer_data(data) {
        assert!(body.len() < data.len());
    }

    if data.len() >= 2 {
        let id = u16::from_le_bytes([data[0], data[1]]);
        if let Ok(encoded) = ad::manufacturer_payload(id, &data[2..]) {
            assert!(encoded.len() <= 31, "encoded payload exceeds one PDU");
            assert!(ad::find_manufacturer_data(&encoded).is_some());
        }
    }
});
