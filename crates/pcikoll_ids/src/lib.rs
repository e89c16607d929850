//! Parser and lookup tables for the `pci.ids` hardware database.
//!
//! The database maps numeric PCI identifiers (vendor, device, subsystem and
//! class codes) to human readable names. Lookups are best effort: a missing
//! database or an unknown identifier degrades to returning the identifier
//! itself, never an error. This matters because callers typically resolve
//! names inline while formatting output and have no sensible way to handle a
//! failure there.

use ahash::AHashMap;
use std::path::Path;

mod parser;

/// Conventional locations of the `pci.ids` database on Linux systems.
pub const DEFAULT_PATHS: &[&str] = &["/usr/share/misc/pci.ids", "/usr/share/hwdata/pci.ids"];

/// A database of PCI device IDs
///
/// Immutable once constructed, so a shared reference can be used freely from
/// multiple threads.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PciIdDb {
    pub classes: AHashMap<u8, Class>,
    pub vendors: AHashMap<u16, Vendor>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Class {
    pub name: String,
    pub subclasses: AHashMap<u8, Subclass>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Subclass {
    pub name: String,
    pub program_interfaces: AHashMap<u8, ProgrammingInterface>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ProgrammingInterface {
    pub name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Vendor {
    pub name: String,
    pub devices: AHashMap<u16, Device>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub subsystems: AHashMap<(u16, u16), Subsystem>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Subsystem {
    pub name: String,
}

impl PciIdDb {
    /// Create from a string containing `pci.ids`
    ///
    /// Malformed lines are skipped, so this cannot fail: garbage input
    /// produces a (partially) empty database.
    pub fn parse(s: &str) -> Self {
        parser::parse_db(s)
    }

    /// Create from a file containing `pci.ids`
    pub fn parse_file(path: &Path) -> eyre::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::parse(&s))
    }

    /// Load the database from the first readable candidate path.
    ///
    /// A non-empty `override_path` takes exclusive precedence: the default
    /// paths are not attempted when it is given. Failure to open any file is
    /// logged at debug severity and yields an empty database; all lookups
    /// then fall back to the queried identifier.
    pub fn load(paths: &[impl AsRef<Path>], override_path: Option<&Path>) -> Self {
        if let Some(path) = override_path {
            return match Self::parse_file(path) {
                Ok(db) => {
                    db.log_load_summary(path);
                    db
                }
                Err(error) => {
                    tracing::debug!("Failed to load PCI IDs from {}: {error}", path.display());
                    Self::default()
                }
            };
        }
        for path in paths {
            let path = path.as_ref();
            match Self::parse_file(path) {
                Ok(db) => {
                    db.log_load_summary(path);
                    return db;
                }
                Err(error) => {
                    tracing::debug!("Failed to load PCI IDs from {}: {error}", path.display());
                }
            }
        }
        tracing::debug!("No PCI IDs database found, lookups will return raw identifiers");
        Self::default()
    }

    fn log_load_summary(&self, path: &Path) {
        let devices: usize = self.vendors.values().map(|v| v.devices.len()).sum();
        let subsystems: usize = self
            .vendors
            .values()
            .flat_map(|v| v.devices.values())
            .map(|d| d.subsystems.len())
            .sum();
        let subclasses: usize = self.classes.values().map(|c| c.subclasses.len()).sum();
        let prog_ifs: usize = self
            .classes
            .values()
            .flat_map(|c| c.subclasses.values())
            .map(|s| s.program_interfaces.len())
            .sum();
        tracing::debug!(
            "Loaded PCI IDs from {}: {} vendors, {devices} devices, {subsystems} subsystems, {} \
             classes, {subclasses} subclasses, {prog_ifs} programming interfaces",
            path.display(),
            self.vendors.len(),
            self.classes.len(),
        );
    }

    /// Resolve a vendor ID to its name.
    ///
    /// Returns the normalized ID when the vendor is unknown.
    pub fn vendor_name(&self, vendor_id: &str) -> String {
        let id = normalize(vendor_id);
        match parse_u16(&id).and_then(|v| self.vendors.get(&v)) {
            Some(vendor) => vendor.name.clone(),
            None => id,
        }
    }

    /// Resolve a device ID within a vendor to its name.
    ///
    /// Returns the normalized device ID when either level is unknown.
    pub fn device_name(&self, vendor_id: &str, device_id: &str) -> String {
        let id = normalize(device_id);
        let device = parse_id(vendor_id)
            .and_then(|v| self.vendors.get(&v))
            .and_then(|v| parse_u16(&id).and_then(|d| v.devices.get(&d)));
        match device {
            Some(device) => device.name.clone(),
            None => id,
        }
    }

    /// Resolve a (subsystem vendor, subsystem device) pair within a
    /// (vendor, device) pair to its name.
    ///
    /// Returns the normalized subsystem device ID when any level is unknown.
    pub fn subsystem_name(
        &self,
        vendor_id: &str,
        device_id: &str,
        subsys_vendor_id: &str,
        subsys_device_id: &str,
    ) -> String {
        let id = normalize(subsys_device_id);
        let subsystem = parse_id(vendor_id)
            .and_then(|v| self.vendors.get(&v))
            .and_then(|v| parse_id(device_id).and_then(|d| v.devices.get(&d)))
            .and_then(|d| {
                let key = (parse_id(subsys_vendor_id)?, parse_u16(&id)?);
                d.subsystems.get(&key)
            });
        match subsystem {
            Some(subsystem) => subsystem.name.clone(),
            None => id,
        }
    }

    /// Resolve a class code to a name, at decreasing specificity.
    ///
    /// The code is interpreted as up to three concatenated hex pairs (base
    /// class, subclass, programming interface). The most specific table that
    /// has an entry for the code wins: programming interface (6 digits), then
    /// subclass (4), then base class (2). Unlike the other lookups, an
    /// unresolved code yields a synthesized `Unknown class (..)` label so it
    /// stands out in output.
    pub fn class_name(&self, class_code: &str) -> String {
        let code = normalize(class_code);
        let base = hex_pair(&code, 0);
        let subclass = hex_pair(&code, 2);
        let prog_if = hex_pair(&code, 4);

        if let Some(found) = base.zip(subclass).zip(prog_if).and_then(|((b, s), p)| {
            self.classes
                .get(&b)?
                .subclasses
                .get(&s)?
                .program_interfaces
                .get(&p)
        }) {
            return found.name.clone();
        }
        if let Some(found) = base
            .zip(subclass)
            .and_then(|(b, s)| self.classes.get(&b)?.subclasses.get(&s))
        {
            return found.name.clone();
        }
        if let Some(found) = base.and_then(|b| self.classes.get(&b)) {
            return found.name.clone();
        }
        format!("Unknown class ({code})")
    }
}

/// Normalize an identifier for lookup: trim, lowercase, strip any `0x`.
fn normalize(id: &str) -> String {
    let id = id.trim().to_ascii_lowercase();
    match id.strip_prefix("0x") {
        Some(stripped) => stripped.to_owned(),
        None => id,
    }
}

/// Parse an already normalized identifier
fn parse_u16(id: &str) -> Option<u16> {
    u16::from_str_radix(id, 16).ok()
}

fn parse_id(id: &str) -> Option<u16> {
    parse_u16(&normalize(id))
}

/// Extract the hex pair starting at byte `at`, if present
fn hex_pair(code: &str, at: usize) -> Option<u8> {
    code.get(at..at + 2)
        .and_then(|s| u8::from_str_radix(s, 16).ok())
}
