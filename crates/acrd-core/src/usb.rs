//! USB identifiers for transports that cannot be queried by any tool.

use std::fmt;

/// Vendor/product pair as listed in the OS USB device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbId {
    pub const fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

/// Qualcomm HS-USB QDLoader 9008 (emergency download).
pub const QUALCOMM_EDL: UsbId = UsbId::new(0x05c6, 0x9008);

/// Whether any of `ids` is a device sitting in emergency download.
pub fn find_edl(ids: &[UsbId]) -> Option<UsbId> {
    ids.iter().copied().find(|id| *id == QUALCOMM_EDL)
}
