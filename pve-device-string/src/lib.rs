//! Parsing and printing of the device strings found in Proxmox VE guest configs.
//!
//! Storage drives (`scsi0: local-lvm:vm-100-disk-0,size=32G`) and PCI passthrough devices
//! (`hostpci0: 0000:01:00.0,pcie=1`) are each stored as a single property string. This crate
//! converts between those strings and the typed [`StorageDevice`] and [`PciDevice`] records.
//!
//! The strings are handed over as JSON string literals, as they appear in API responses:
//!
//! ```
//! use pve_device_string::{DiskSize, StorageDevice};
//!
//! let drive = StorageDevice::decode(r#""local-lvm:vm-100-disk-0,ssd=1,size=8G""#).unwrap();
//! assert_eq!(drive.file_volume, "local-lvm:vm-100-disk-0");
//! assert_eq!(drive.size, Some(DiskSize::from_gibibytes(8)));
//! assert_eq!(drive.encode().unwrap(), r#""local-lvm:vm-100-disk-0,size=8G,ssd=1""#);
//! ```
//!
//! Both directions are pure functions of their input. Options absent from a string are `None`
//! in the record, and only options which are `Some` are printed again.

mod macros;

pub mod error;
pub mod pci;
pub mod property_string;
pub mod size;
pub mod storage;

pub use error::{Error, ErrorKind};
pub use pci::PciDevice;
pub use size::{DiskSize, SizeUnit};
pub use storage::StorageDevice;
