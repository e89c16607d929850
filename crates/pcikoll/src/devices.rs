//! PCI device enumeration from sysfs, similar to pciutils

use ahash::AHashMap;
use ahash::AHashSet;
use eyre::WrapErr;
use std::path::Path;

/// PCI base class for display controllers (VGA, 3D, etc.)
const DISPLAY_CLASS: u8 = 0x03;

/// Data about a PCI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciDevice {
    /// Bus address, e.g. `0000:00:02.0`
    pub address: String,
    pub class: u32,
    pub vendor: u16,
    pub device: u16,
    pub revision: u8,
    pub subsystem_vendor: u16,
    pub subsystem_device: u16,
}

impl PciDevice {
    /// Load data for one device from its sysfs directory
    fn from_directory(path: &Path) -> eyre::Result<Self> {
        let address = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            address,
            class: u32::from_str_radix(&read_attr(path, "class")?, 16)?,
            vendor: u16::from_str_radix(&read_attr(path, "vendor")?, 16)?,
            device: u16::from_str_radix(&read_attr(path, "device")?, 16)?,
            revision: u8::from_str_radix(&read_attr(path, "revision")?, 16)?,
            subsystem_vendor: u16::from_str_radix(&read_attr(path, "subsystem_vendor")?, 16)?,
            subsystem_device: u16::from_str_radix(&read_attr(path, "subsystem_device")?, 16)?,
        })
    }

    /// The base class (top byte of the 24-bit class code)
    pub fn base_class(&self) -> u8 {
        (self.class >> 16) as u8
    }
}

/// Read a hex attribute file, stripping the `0x` prefix and trailing newline
/// the kernel writes.
fn read_attr(dir: &Path, attr: &str) -> eyre::Result<String> {
    let raw = std::fs::read_to_string(dir.join(attr))
        .wrap_err_with(|| format!("failed to read {attr} from {}", dir.display()))?;
    let raw = raw.trim();
    Ok(raw.strip_prefix("0x").unwrap_or(raw).to_owned())
}

/// Read PCI device info from sysfs.
///
/// Unlike ID name resolution this is a hard failure when the device tree
/// cannot be read: without it there is nothing to report at all.
pub fn load_pci_devices(sysfs_root: &Path) -> eyre::Result<Vec<PciDevice>> {
    let path = sysfs_root.join("bus/pci/devices");
    let mut devices = vec![];
    for entry in std::fs::read_dir(&path)
        .wrap_err_with(|| format!("failed to enumerate PCI devices in {}", path.display()))?
    {
        let entry = entry?;
        devices.push(PciDevice::from_directory(&entry.path())?);
    }
    Ok(devices)
}

/// Tells actual GPUs apart from other display controllers.
///
/// Carried as an explicit configuration value so callers can extend the
/// vendor sets; the defaults cover the discrete/integrated GPU vendors and
/// the common BMC graphics chips found in servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuFilter {
    /// Known GPU vendors, with a fallback display name for each for when the
    /// ID database cannot resolve the vendor.
    pub allowed_vendors: AHashMap<u16, String>,
    /// Known BMC/management graphics vendors, never real GPUs.
    pub denied_vendors: AHashSet<u16>,
}

impl Default for GpuFilter {
    fn default() -> Self {
        Self {
            allowed_vendors: AHashMap::from([
                (0x10de, "NVIDIA Corporation".to_owned()),
                (0x1002, "AMD/ATI".to_owned()),
                (0x8086, "Intel Corporation".to_owned()),
            ]),
            denied_vendors: AHashSet::from([
                // ASPEED Technology, Matrox
                0x1a03, 0x102b,
            ]),
        }
    }
}

impl GpuFilter {
    pub fn matches(&self, device: &PciDevice) -> bool {
        if device.base_class() != DISPLAY_CLASS {
            return false;
        }
        if self.denied_vendors.contains(&device.vendor) {
            tracing::debug!(
                "Skipping BMC graphics device {:04x}:{:04x} at {}",
                device.vendor,
                device.device,
                device.address
            );
            return false;
        }
        if !self.allowed_vendors.contains_key(&device.vendor) {
            tracing::debug!(
                "Skipping unknown display controller {:04x}:{:04x} at {}",
                device.vendor,
                device.device,
                device.address
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fake_device(root: &Path, address: &str, attrs: &[(&str, &str)]) {
        let dir = root.join("bus/pci/devices").join(address);
        std::fs::create_dir_all(&dir).unwrap();
        for (attr, value) in attrs {
            std::fs::write(dir.join(attr), value).unwrap();
        }
    }

    fn gpu(vendor: u16) -> PciDevice {
        PciDevice {
            address: "0000:01:00.0".to_owned(),
            class: 0x030000,
            vendor,
            device: 0x2204,
            revision: 0xa1,
            subsystem_vendor: vendor,
            subsystem_device: 0x1454,
        }
    }

    #[test]
    fn test_load_pci_devices() {
        let root = tempfile::tempdir().unwrap();
        fake_device(
            root.path(),
            "0000:00:02.0",
            &[
                ("class", "0x030000\n"),
                ("vendor", "0x8086\n"),
                ("device", "0x1533\n"),
                ("revision", "0x03\n"),
                ("subsystem_vendor", "0x8086\n"),
                ("subsystem_device", "0x0001\n"),
            ],
        );
        let devices = load_pci_devices(root.path()).unwrap();
        assert_eq!(
            devices,
            vec![PciDevice {
                address: "0000:00:02.0".to_owned(),
                class: 0x030000,
                vendor: 0x8086,
                device: 0x1533,
                revision: 0x03,
                subsystem_vendor: 0x8086,
                subsystem_device: 0x0001,
            }]
        );
    }

    #[test]
    fn test_load_pci_devices_missing_root() {
        let root = tempfile::tempdir().unwrap();
        assert!(load_pci_devices(&root.path().join("nope")).is_err());
    }

    #[test]
    fn test_gpu_filter() {
        let filter = GpuFilter::default();
        assert!(filter.matches(&gpu(0x10de)));
        assert!(filter.matches(&gpu(0x1002)));
        // BMC graphics are denied even though they are display controllers
        assert!(!filter.matches(&gpu(0x1a03)));
        // Unknown display controller vendors are not treated as GPUs
        assert!(!filter.matches(&gpu(0xbeef)));
        // Non-display devices never match
        let mut nic = gpu(0x8086);
        nic.class = 0x020000;
        assert!(!filter.matches(&nic));
    }

    #[test]
    fn test_gpu_filter_is_extendable() {
        let mut filter = GpuFilter::default();
        filter
            .allowed_vendors
            .insert(0xbeef, "Beef Graphics".to_owned());
        assert!(filter.matches(&gpu(0xbeef)));
    }
}
