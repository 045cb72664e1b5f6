//! USB device table scan.

use acrd_core::usb::UsbId;
use nusb::MaybeFuture;
use tracing::debug;

/// Vendor/product ids of every attached USB device.
///
/// An unreadable table yields an empty list.
pub fn list_usb_ids() -> Vec<UsbId> {
    match nusb::list_devices().wait() {
        Ok(devices) => sorted_ids(
            devices.map(|device| UsbId::new(device.vendor_id(), device.product_id())),
        ),
        Err(e) => {
            debug!("Cannot list USB devices: {}", e);
            Vec::new()
        }
    }
}

/// Ids ordered by vendor then product, one entry per pair.
fn sorted_ids(ids: impl Iterator<Item = UsbId>) -> Vec<UsbId> {
    let mut ids: Vec<UsbId> = ids.collect();
    ids.sort_by_key(|id| (id.vendor, id.product));
    ids.dedup();
    ids
}
