//! PCI passthrough strings (`hostpci[n]` entries of a guest config).
//!
//! The device is either given via its host PCI address(es), as the key-less first entry or via
//! `host=`, or via the name of a cluster wide resource mapping:
//!
//! ```text
//! 0000:81:00.2;0000:81:00.3,pcie=1
//! host=81:00.4,pcie=0,rombar=1,x-vga=0
//! mapping=mappeddevice,pcie=0
//! ```

use std::str::FromStr;

use crate::error::Error;
use crate::macros::property_string_serde;
use crate::property_string::{
    canonical_key, lookup_key, parse_flag, quote, set_once, unquote, PropertyIterator,
    PropertyWriter, Token,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Field {
    Host,
    Mapping,
    DeviceId,
    LegacyIgd,
    MDev,
    Pcie,
    RomBar,
    RomFile,
    SubDeviceId,
    SubVendorId,
    VendorId,
    XVga,
}

const KEYS: &[(&str, Field)] = &[
    ("host", Field::Host),
    ("mapping", Field::Mapping),
    ("device-id", Field::DeviceId),
    ("legacy-igd", Field::LegacyIgd),
    ("mdev", Field::MDev),
    ("pcie", Field::Pcie),
    ("rombar", Field::RomBar),
    ("romfile", Field::RomFile),
    ("sub-device-id", Field::SubDeviceId),
    ("sub-vendor-id", Field::SubVendorId),
    ("vendor-id", Field::VendorId),
    ("x-vga", Field::XVga),
];

fn key(field: Field) -> &'static str {
    canonical_key(KEYS, field).unwrap_or_default()
}

/// A PCI device passed through to a guest.
///
/// Exactly one of `device_ids` and `mapping` is set. Flags which are not part of the device
/// string are `None`, use the accessors like [`rombar()`](Self::rombar) for the effective value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PciDevice {
    /// Host PCI addresses (`[domain:]bus:dev.func`), multiple entries for the virtual functions
    /// of a device.
    pub device_ids: Option<Vec<String>>,

    /// The ID of a cluster wide mapping.
    pub mapping: Option<String>,

    /// Override PCI device ID visible to guest.
    pub device_id: Option<String>,

    /// Pass this device in legacy IGD mode. Defaults to `false`.
    pub legacy_igd: Option<bool>,

    /// The type of mediated device to use.
    pub mdev: Option<String>,

    /// Choose the PCI-express bus. Defaults to `false`.
    pub pcie: Option<bool>,

    /// Whether the device's ROM is visible in the guest's memory map. Defaults to `true`.
    pub rombar: Option<bool>,

    /// Custom pci device rom filename (relative to /usr/share/kvm/).
    pub romfile: Option<String>,

    /// Override PCI subsystem device ID visible to guest.
    pub sub_device_id: Option<String>,

    /// Override PCI subsystem vendor ID visible to guest.
    pub sub_vendor_id: Option<String>,

    /// Override PCI vendor ID visible to guest.
    pub vendor_id: Option<String>,

    /// Enable vfio-vga device support. Defaults to `false`.
    pub x_vga: Option<bool>,
}

impl PciDevice {
    /// A device passed through by its host PCI address(es).
    pub fn with_device_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device_ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// A device passed through via a resource mapping.
    pub fn with_mapping(mapping: impl Into<String>) -> Self {
        Self {
            mapping: Some(mapping.into()),
            ..Default::default()
        }
    }

    pub fn pcie(&self) -> bool {
        self.pcie.unwrap_or(false)
    }

    pub fn rombar(&self) -> bool {
        self.rombar.unwrap_or(true)
    }

    pub fn x_vga(&self) -> bool {
        self.x_vga.unwrap_or(false)
    }

    pub fn legacy_igd(&self) -> bool {
        self.legacy_igd.unwrap_or(false)
    }

    /// Decode a PCI device string given as JSON string literal.
    pub fn decode(raw: &str) -> Result<Self, Error> {
        Self::parse_property_string(&unquote(raw)?)
    }

    /// Encode the device as JSON string literal, the counterpart to [`decode`](Self::decode).
    pub fn encode(&self) -> Result<String, Error> {
        Ok(quote(&self.to_property_string()?))
    }

    /// Parse a plain (unquoted) PCI device string.
    pub fn parse_property_string(data: &str) -> Result<Self, Error> {
        log::trace!("parsing pci device string '{data}'");
        Self::do_parse(data).inspect_err(|err| {
            log::debug!("rejecting pci device string '{data}' - {err}");
        })
    }

    fn do_parse(data: &str) -> Result<Self, Error> {
        let mut this = Self::default();
        let mut tokens = PropertyIterator::new(data).peekable();

        if tokens.peek().is_none() {
            return Err(Error::EmptyIdentifier(data.to_string()));
        }

        for token in tokens {
            // a key-less entry is always the host id list
            let field = match token.key {
                None => Field::Host,
                Some(key) => {
                    lookup_key(KEYS, key).ok_or_else(|| Error::UnknownField(token.to_string()))?
                }
            };

            let string = |token: &Token| token.value.to_string();

            match field {
                Field::Host => set_once(&mut this.device_ids, &token, parse_device_ids(&token)?)?,
                Field::Mapping => {
                    if token.value.is_empty() {
                        return Err(Error::EmptyIdentifier(token.to_string()));
                    }
                    set_once(&mut this.mapping, &token, string(&token))?
                }
                Field::DeviceId => set_once(&mut this.device_id, &token, string(&token))?,
                Field::LegacyIgd => set_once(&mut this.legacy_igd, &token, parse_flag(&token)?)?,
                Field::MDev => set_once(&mut this.mdev, &token, string(&token))?,
                Field::Pcie => set_once(&mut this.pcie, &token, parse_flag(&token)?)?,
                Field::RomBar => set_once(&mut this.rombar, &token, parse_flag(&token)?)?,
                Field::RomFile => set_once(&mut this.romfile, &token, string(&token))?,
                Field::SubDeviceId => set_once(&mut this.sub_device_id, &token, string(&token))?,
                Field::SubVendorId => set_once(&mut this.sub_vendor_id, &token, string(&token))?,
                Field::VendorId => set_once(&mut this.vendor_id, &token, string(&token))?,
                Field::XVga => set_once(&mut this.x_vga, &token, parse_flag(&token)?)?,
            }
        }

        this.check_source(data)?;

        Ok(this)
    }

    /// Either the host ids or the mapping must be set, but not both.
    fn check_source(&self, input: &str) -> Result<(), Error> {
        match (&self.device_ids, &self.mapping) {
            (Some(_), Some(_)) => Err(Error::ConflictingFields {
                input: input.to_string(),
                reason: "'host' and 'mapping' are mutually exclusive",
            }),
            (None, None) => Err(Error::ConflictingFields {
                input: input.to_string(),
                reason: "either 'host' or 'mapping' must be set",
            }),
            _ => Ok(()),
        }
    }

    /// Print the plain (unquoted) PCI device string.
    ///
    /// Options are printed in a fixed order, independent of the order they were parsed in.
    pub fn to_property_string(&self) -> Result<String, Error> {
        self.check_source("")?;

        let mut w = PropertyWriter::new();

        if let Some(ids) = &self.device_ids {
            if ids.is_empty() || ids.iter().any(String::is_empty) {
                return Err(Error::EmptyIdentifier(ids.join(";")));
            }
            if let Some(id) = ids.iter().find(|id| id.contains(';')) {
                return Err(Error::InvalidValue(id.clone()));
            }

            // an id containing a '=' would otherwise be read back as a key
            let ids = ids.join(";");
            if ids.contains('=') {
                w.entry(key(Field::Host), ids.as_str());
            } else {
                w.value(&ids);
            }
        }

        if let Some(mapping) = &self.mapping {
            if mapping.is_empty() {
                return Err(Error::EmptyIdentifier(mapping.clone()));
            }
            w.entry(key(Field::Mapping), mapping.as_str());
        }

        w.opt_str(key(Field::DeviceId), self.device_id.as_deref())
            .opt_flag(key(Field::LegacyIgd), self.legacy_igd)
            .opt_str(key(Field::MDev), self.mdev.as_deref())
            .opt_flag(key(Field::Pcie), self.pcie)
            .opt_flag(key(Field::RomBar), self.rombar)
            .opt_str(key(Field::RomFile), self.romfile.as_deref())
            .opt_str(key(Field::SubDeviceId), self.sub_device_id.as_deref())
            .opt_str(key(Field::SubVendorId), self.sub_vendor_id.as_deref())
            .opt_str(key(Field::VendorId), self.vendor_id.as_deref())
            .opt_flag(key(Field::XVga), self.x_vga);

        w.finish()
    }
}

/// Split a `;` separated list of host PCI ids, keeping their order.
fn parse_device_ids(token: &Token) -> Result<Vec<String>, Error> {
    token
        .value
        .split(';')
        .map(|id| match id {
            "" => Err(Error::EmptyIdentifier(token.to_string())),
            id => Ok(id.to_string()),
        })
        .collect()
}

impl FromStr for PciDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::parse_property_string(s)
    }
}

property_string_serde!(PciDevice, "a pci device string");
