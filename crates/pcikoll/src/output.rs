//! Resolution of enumerated devices into printable records

use crate::devices::GpuFilter;
use crate::devices::PciDevice;
use pcikoll_ids::PciIdDb;
use serde::Serialize;

/// A PCI device with its identifiers resolved to display names.
///
/// The `*_id` fields hold the normalized hex identifiers; the name fields
/// hold whatever the database resolved, degrading to the identifier (or an
/// `Unknown class` label) when the database has no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDevice {
    pub address: String,
    pub vendor_id: String,
    pub device_id: String,
    pub class_id: String,
    pub revision: String,
    pub vendor: String,
    pub device: String,
    pub subsystem: String,
    pub class: String,
}

impl ResolvedDevice {
    pub fn new(device: &PciDevice, db: &PciIdDb) -> Self {
        let vendor_id = format!("{:04x}", device.vendor);
        let device_id = format!("{:04x}", device.device);
        let class_id = format!("{:06x}", device.class);
        let subsys_vendor = format!("{:04x}", device.subsystem_vendor);
        let subsys_device = format!("{:04x}", device.subsystem_device);
        Self {
            vendor: db.vendor_name(&vendor_id),
            device: db.device_name(&vendor_id, &device_id),
            subsystem: db.subsystem_name(&vendor_id, &device_id, &subsys_vendor, &subsys_device),
            class: db.class_name(&class_id),
            address: device.address.clone(),
            revision: format!("{:02x}", device.revision),
            vendor_id,
            device_id,
            class_id,
        }
    }

    /// One line per device, in the style of lspci
    pub fn human_line(&self) -> String {
        format!(
            "{} {}: {} {} (rev {})",
            self.address, self.class, self.vendor, self.device, self.revision
        )
    }
}

/// Substitute the filter's built-in vendor name when the database lookup
/// degraded to the raw identifier.
pub fn apply_vendor_fallback(record: &mut ResolvedDevice, device: &PciDevice, filter: &GpuFilter) {
    if record.vendor == record.vendor_id {
        if let Some(name) = filter.allowed_vendors.get(&device.vendor) {
            record.vendor.clone_from(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_db() -> PciIdDb {
        PciIdDb::parse(
            "8086  Intel Corporation\n\
             \t1533  I210 Gigabit Network Connection\n\
             \t\t8086 0001  I210 reference design\n\
             C 02  Network controller\n\
             \t00  Ethernet controller\n",
        )
    }

    fn sample_device() -> PciDevice {
        PciDevice {
            address: "0000:03:00.0".to_owned(),
            class: 0x020000,
            vendor: 0x8086,
            device: 0x1533,
            revision: 0x03,
            subsystem_vendor: 0x8086,
            subsystem_device: 0x0001,
        }
    }

    #[test]
    fn test_resolution() {
        let record = ResolvedDevice::new(&sample_device(), &sample_db());
        assert_eq!(
            record,
            ResolvedDevice {
                address: "0000:03:00.0".to_owned(),
                vendor_id: "8086".to_owned(),
                device_id: "1533".to_owned(),
                class_id: "020000".to_owned(),
                revision: "03".to_owned(),
                vendor: "Intel Corporation".to_owned(),
                device: "I210 Gigabit Network Connection".to_owned(),
                subsystem: "I210 reference design".to_owned(),
                class: "Ethernet controller".to_owned(),
            }
        );
        assert_eq!(
            record.human_line(),
            "0000:03:00.0 Ethernet controller: Intel Corporation I210 Gigabit Network Connection \
             (rev 03)"
        );
    }

    #[test]
    fn test_resolution_degrades_without_database() {
        let record = ResolvedDevice::new(&sample_device(), &PciIdDb::default());
        assert_eq!(record.vendor, "8086");
        assert_eq!(record.device, "1533");
        assert_eq!(record.subsystem, "0001");
        assert_eq!(record.class, "Unknown class (020000)");
    }

    #[test]
    fn test_vendor_fallback() {
        let device = sample_device();
        let mut record = ResolvedDevice::new(&device, &PciIdDb::default());
        apply_vendor_fallback(&mut record, &device, &GpuFilter::default());
        assert_eq!(record.vendor, "Intel Corporation");
        // A resolved name is left alone
        let mut record = ResolvedDevice::new(&device, &sample_db());
        apply_vendor_fallback(&mut record, &device, &GpuFilter::default());
        assert_eq!(record.vendor, "Intel Corporation");
    }
}
