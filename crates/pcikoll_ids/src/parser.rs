//! Parser for `pci.ids`
//!
//! The format is line oriented: tab count encodes hierarchy depth and a run
//! of two spaces separates an identifier field from its name. Parsing is two
//! layers: a per-line classifier (winnow) producing [`Line`] values, and a
//! [`ParserState`] folded over those lines that attaches each entry to the
//! most recently seen parent. Lines that fail to classify or that lack
//! their parent context are skipped; a damaged database yields a partial
//! one, never an error.

use crate::Class;
use crate::Device;
use crate::PciIdDb;
use crate::ProgrammingInterface;
use crate::Subclass;
use crate::Subsystem;
use crate::Vendor;
use ahash::AHashMap;
use winnow::ModalResult;
use winnow::Parser;
use winnow::ascii::hex_uint;
use winnow::combinator::alt;
use winnow::combinator::trace;
use winnow::error::StrContext;
use winnow::stream::AsChar;
use winnow::token::rest;
use winnow::token::take;

#[derive(Debug, PartialEq, Eq)]
enum Line<'input> {
    Vendor(VendorLine<'input>),
    Device(DeviceLine<'input>),
    Subsystem(SubsystemLine<'input>),

    Class(ClassLine<'input>),
    Subclass(SubclassLine<'input>),
    ProgrammingInterface(ProgrammingInterfaceLine<'input>),
}

#[derive(Debug, PartialEq, Eq)]
struct VendorLine<'input> {
    id: u16,
    name: &'input str,
}

#[derive(Debug, PartialEq, Eq)]
struct DeviceLine<'input> {
    id: u16,
    name: &'input str,
}

#[derive(Debug, PartialEq, Eq)]
struct SubsystemLine<'input> {
    subvendor: u16,
    subdevice: u16,
    name: &'input str,
}

#[derive(Debug, PartialEq, Eq)]
struct ClassLine<'input> {
    id: u8,
    name: &'input str,
}

#[derive(Debug, PartialEq, Eq)]
struct SubclassLine<'input> {
    id: u8,
    name: &'input str,
}

#[derive(Debug, PartialEq, Eq)]
struct ProgrammingInterfaceLine<'input> {
    id: u8,
    name: &'input str,
}

/// Parse state carried between lines.
///
/// The format is strictly order dependent: an indented line attaches to the
/// most recent un-indented one. A `C` line switches to the class hierarchy
/// (`class` becomes `Some`), a vendor line switches back.
#[derive(Debug, Default, PartialEq, Eq)]
struct ParserState {
    vendor: Option<u16>,
    device: Option<u16>,
    class: Option<u8>,
    subclass: Option<u8>,
}

impl ParserState {
    /// Apply one classified line to the database being built.
    ///
    /// Lines whose parent context is missing (a device before any vendor, a
    /// subsystem outside a device, an indented class line outside a class
    /// section) are dropped: tolerating a damaged database beats refusing to
    /// load it.
    fn apply(&mut self, db: &mut PciIdDb, line: Line<'_>) {
        match line {
            Line::Vendor(vendor) => {
                db.vendors.insert(
                    vendor.id,
                    Vendor {
                        name: vendor.name.to_owned(),
                        devices: AHashMap::new(),
                    },
                );
                *self = Self {
                    vendor: Some(vendor.id),
                    ..Self::default()
                };
            }
            Line::Device(device) => {
                if let Some(vendor) = self.vendor.and_then(|v| db.vendors.get_mut(&v)) {
                    vendor.devices.insert(
                        device.id,
                        Device {
                            name: device.name.to_owned(),
                            subsystems: AHashMap::new(),
                        },
                    );
                    self.device = Some(device.id);
                }
            }
            Line::Subsystem(subsystem) => {
                let device = self.vendor.zip(self.device).and_then(|(v, d)| {
                    db.vendors.get_mut(&v)?.devices.get_mut(&d)
                });
                if let Some(device) = device {
                    device.subsystems.insert(
                        (subsystem.subvendor, subsystem.subdevice),
                        Subsystem {
                            name: subsystem.name.to_owned(),
                        },
                    );
                }
            }
            Line::Class(class) => {
                db.classes.insert(
                    class.id,
                    Class {
                        name: class.name.to_owned(),
                        subclasses: AHashMap::new(),
                    },
                );
                *self = Self {
                    class: Some(class.id),
                    ..Self::default()
                };
            }
            Line::Subclass(subclass) => {
                if let Some(class) = self.class.and_then(|c| db.classes.get_mut(&c)) {
                    class.subclasses.insert(
                        subclass.id,
                        Subclass {
                            name: subclass.name.to_owned(),
                            program_interfaces: AHashMap::new(),
                        },
                    );
                    self.subclass = Some(subclass.id);
                }
            }
            Line::ProgrammingInterface(prog_if) => {
                let subclass = self.class.zip(self.subclass).and_then(|(c, s)| {
                    db.classes.get_mut(&c)?.subclasses.get_mut(&s)
                });
                if let Some(subclass) = subclass {
                    subclass.program_interfaces.insert(
                        prog_if.id,
                        ProgrammingInterface {
                            name: prog_if.name.to_owned(),
                        },
                    );
                }
            }
        }
    }
}

pub(crate) fn parse_db(input: &str) -> PciIdDb {
    let mut db = PciIdDb::default();
    let mut state = ParserState::default();
    let mut skipped: usize = 0;

    for raw in input.lines() {
        if raw.is_empty() {
            continue;
        }
        match classify.parse(raw) {
            Ok(Some(line)) => state.apply(&mut db, line),
            Ok(None) => {}
            Err(error) => {
                skipped += 1;
                tracing::trace!("Skipping malformed pci.ids line {raw:?}: {error}");
            }
        }
    }
    if skipped > 0 {
        tracing::debug!("Skipped {skipped} malformed pci.ids lines");
    }
    db
}

/// Classify a single line (without its newline). `None` is a comment.
///
/// Order matters within each hierarchy: a subsystem line also starts with
/// two tabs like a programming interface, and a device line with one tab
/// like a subclass; the longer identifier field must be tried first.
fn classify<'input>(i: &mut &'input str) -> ModalResult<Option<Line<'input>>> {
    let alternatives = (
        comment.map(|()| None).context(StrContext::Label("comment")),
        // Vendor hierarchy
        subsystem
            .map(|s| Some(Line::Subsystem(s)))
            .context(StrContext::Label("subsystem")),
        device
            .map(|d| Some(Line::Device(d)))
            .context(StrContext::Label("device")),
        vendor
            .map(|v| Some(Line::Vendor(v)))
            .context(StrContext::Label("vendor")),
        // Class hierarchy
        class
            .map(|c| Some(Line::Class(c)))
            .context(StrContext::Label("class")),
        prog_if
            .map(|p| Some(Line::ProgrammingInterface(p)))
            .context(StrContext::Label("prog_if")),
        sub_class
            .map(|s| Some(Line::Subclass(s)))
            .context(StrContext::Label("subclass")),
    );
    alt(alternatives).parse_next(i)
}

/// A comment
fn comment(i: &mut &str) -> ModalResult<()> {
    ('#', rest).void().parse_next(i)
}

fn vendor<'input>(i: &mut &'input str) -> ModalResult<VendorLine<'input>> {
    let parser = (hex4, name).map(|(id, name)| VendorLine { id, name });
    trace("vendor", parser).parse_next(i)
}

fn device<'input>(i: &mut &'input str) -> ModalResult<DeviceLine<'input>> {
    let parser = ('\t', hex4, name).map(|(_, id, name)| DeviceLine { id, name });
    trace("device", parser).parse_next(i)
}

fn subsystem<'input>(i: &mut &'input str) -> ModalResult<SubsystemLine<'input>> {
    let parser =
        ("\t\t", hex4, ' ', hex4, name).map(|(_, subvendor, _, subdevice, name)| SubsystemLine {
            subvendor,
            subdevice,
            name,
        });
    trace("subsystem", parser).parse_next(i)
}

fn class<'input>(i: &mut &'input str) -> ModalResult<ClassLine<'input>> {
    let parser = ('C', ' ', hex2, name).map(|(_, _, id, name)| ClassLine { id, name });
    trace("class", parser).parse_next(i)
}

fn sub_class<'input>(i: &mut &'input str) -> ModalResult<SubclassLine<'input>> {
    let parser = ('\t', hex2, name).map(|(_, id, name)| SubclassLine { id, name });
    trace("sub_class", parser).parse_next(i)
}

fn prog_if<'input>(i: &mut &'input str) -> ModalResult<ProgrammingInterfaceLine<'input>> {
    let parser = ("\t\t", hex2, name).map(|(_, id, name)| ProgrammingInterfaceLine { id, name });
    trace("prog_if", parser).parse_next(i)
}

/// The name field: the two-space separator and everything after it.
///
/// A line without the separator does not match and is dropped by the caller.
fn name<'input>(i: &mut &'input str) -> ModalResult<&'input str> {
    let parser = ("  ", rest).map(|(_, s): (_, &str)| s.trim());
    trace("name", parser).parse_next(i)
}

fn hex2(i: &mut &str) -> ModalResult<u8> {
    trace("hex2", take(2usize).verify(is_hex))
        .and_then(hex_uint::<_, u8, _>)
        .parse_next(i)
}

fn hex4(i: &mut &str) -> ModalResult<u16> {
    trace("hex4", take(4usize).verify(is_hex))
        .and_then(hex_uint::<_, u16, _>)
        .parse_next(i)
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(AsChar::is_hex_digit)
}
