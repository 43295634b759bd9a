//! Storage drive strings (`scsi0`, `virtio1`, `ide2`, ... entries of a guest config).
//!
//! A drive string starts with the backing volume, followed by the drive options:
//!
//! ```text
//! local-lvm:vm-2041-disk-0,discard=on,ssd=1,iothread=1,size=8G,cache=writeback
//! ```

use std::str::FromStr;

use crate::error::Error;
use crate::macros::property_string_serde;
use crate::property_string::{
    canonical_key, lookup_key, parse_flag, parse_number, quote, set_once, unquote,
    PropertyIterator, PropertyWriter, Token,
};
use crate::size::DiskSize;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Field {
    File,
    Aio,
    Backup,
    Cache,
    Discard,
    Format,
    IoThread,
    MbpsRd,
    MbpsRdMax,
    MbpsWr,
    MbpsWrMax,
    Media,
    Replicate,
    Size,
    Ssd,
}

// The first entry of a field is its canonical key.
const KEYS: &[(&str, Field)] = &[
    ("file", Field::File),
    ("volume", Field::File),
    ("aio", Field::Aio),
    ("backup", Field::Backup),
    ("cache", Field::Cache),
    ("discard", Field::Discard),
    ("format", Field::Format),
    ("iothread", Field::IoThread),
    ("mbps_rd", Field::MbpsRd),
    ("mbps_rd_max", Field::MbpsRdMax),
    ("mbps_wr", Field::MbpsWr),
    ("mbps_wr_max", Field::MbpsWrMax),
    ("media", Field::Media),
    ("replicate", Field::Replicate),
    ("size", Field::Size),
    ("ssd", Field::Ssd),
];

/// Disk image formats which can be told from the volume's file extension.
const FORMAT_EXTENSIONS: &[(&str, &str)] = &[
    (".raw", "raw"),
    (".qcow2", "qcow2"),
    (".vmdk", "vmdk"),
];

fn key(field: Field) -> &'static str {
    canonical_key(KEYS, field).unwrap_or_default()
}

/// The image format implied by a volume's file extension, if it has a known one.
pub fn infer_format(volume: &str) -> Option<&'static str> {
    FORMAT_EXTENSIONS
        .iter()
        .find(|(extension, _)| volume.ends_with(extension))
        .map(|(_, format)| *format)
}

/// A storage drive of a guest.
///
/// Options which are not part of the drive string are `None`, there is no implicit default at
/// this level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StorageDevice {
    /// The backing volume, `<storage>:<volume>` or an absolute path.
    pub file_volume: String,

    /// Set for every successfully parsed drive, not part of the drive string.
    pub enabled: bool,

    /// AIO type to use.
    pub aio: Option<String>,

    /// Whether the drive should be included when making backups.
    pub backup: Option<bool>,

    /// The drive's cache mode.
    pub cache: Option<String>,

    /// Whether to pass discard/trim requests to the underlying storage.
    pub discard: Option<String>,

    /// The drive's backing file's data format. Inferred from the volume if not set explicitly.
    pub format: Option<String>,

    /// Whether to use iothreads for this drive.
    pub iothread: Option<bool>,

    /// Maximum read speed in megabytes per second.
    pub mbps_rd: Option<f64>,

    /// Maximum unthrottled read pool in megabytes per second.
    pub mbps_rd_max: Option<f64>,

    /// Maximum write speed in megabytes per second.
    pub mbps_wr: Option<f64>,

    /// Maximum unthrottled write pool in megabytes per second.
    pub mbps_wr_max: Option<f64>,

    /// The drive's media type, `disk` or `cdrom`.
    pub media: Option<String>,

    /// Whether the drive should be considered for replication jobs.
    pub replicate: Option<bool>,

    /// Disk size, purely informational.
    pub size: Option<DiskSize>,

    /// Whether to expose this drive as an SSD, rather than a rotational hard disk.
    pub ssd: Option<bool>,
}

impl StorageDevice {
    /// A drive backed by `file_volume` without any options.
    pub fn new(file_volume: impl Into<String>) -> Self {
        Self {
            file_volume: file_volume.into(),
            ..Default::default()
        }
    }

    /// Decode a drive string given as JSON string literal.
    pub fn decode(raw: &str) -> Result<Self, Error> {
        Self::parse_property_string(&unquote(raw)?)
    }

    /// Encode the drive as JSON string literal, the counterpart to [`decode`](Self::decode).
    pub fn encode(&self) -> Result<String, Error> {
        Ok(quote(&self.to_property_string()?))
    }

    /// Parse a plain (unquoted) drive string.
    pub fn parse_property_string(data: &str) -> Result<Self, Error> {
        log::trace!("parsing storage device string '{data}'");
        Self::do_parse(data).inspect_err(|err| {
            log::debug!("rejecting storage device string '{data}' - {err}");
        })
    }

    fn do_parse(data: &str) -> Result<Self, Error> {
        let mut this = Self::default();
        let mut file = None;

        for (index, token) in PropertyIterator::new(data).enumerate() {
            let field = match token.key {
                None if index == 0 => Field::File,
                None => return Err(Error::UnknownField(token.to_string())),
                Some(key) => {
                    lookup_key(KEYS, key).ok_or_else(|| Error::UnknownField(token.to_string()))?
                }
            };

            let string = |token: &Token| token.value.to_string();

            match field {
                Field::File => set_once(&mut file, &token, string(&token))?,
                Field::Aio => set_once(&mut this.aio, &token, string(&token))?,
                Field::Backup => set_once(&mut this.backup, &token, parse_flag(&token)?)?,
                Field::Cache => set_once(&mut this.cache, &token, string(&token))?,
                Field::Discard => set_once(&mut this.discard, &token, string(&token))?,
                Field::Format => set_once(&mut this.format, &token, string(&token))?,
                Field::IoThread => set_once(&mut this.iothread, &token, parse_flag(&token)?)?,
                Field::MbpsRd => set_once(&mut this.mbps_rd, &token, parse_number(&token)?)?,
                Field::MbpsRdMax => {
                    set_once(&mut this.mbps_rd_max, &token, parse_number(&token)?)?
                }
                Field::MbpsWr => set_once(&mut this.mbps_wr, &token, parse_number(&token)?)?,
                Field::MbpsWrMax => {
                    set_once(&mut this.mbps_wr_max, &token, parse_number(&token)?)?
                }
                Field::Media => set_once(&mut this.media, &token, string(&token))?,
                Field::Replicate => set_once(&mut this.replicate, &token, parse_flag(&token)?)?,
                Field::Size => {
                    let size = DiskSize::from_str(token.value)
                        .map_err(|_| Error::InvalidSizeLiteral(token.to_string()))?;
                    set_once(&mut this.size, &token, size)?
                }
                Field::Ssd => set_once(&mut this.ssd, &token, parse_flag(&token)?)?,
            }
        }

        this.file_volume = match file {
            Some(file) if !file.is_empty() => file,
            _ => return Err(Error::EmptyIdentifier(data.to_string())),
        };

        if this.format.is_none() {
            if let Some(format) = infer_format(&this.file_volume) {
                log::debug!("using format '{format}' for volume '{}'", this.file_volume);
                this.format = Some(format.to_string());
            }
        }

        this.enabled = true;

        Ok(this)
    }

    /// Print the plain (unquoted) drive string.
    ///
    /// Options are printed in a fixed order, independent of the order they were parsed in.
    pub fn to_property_string(&self) -> Result<String, Error> {
        if self.file_volume.is_empty() {
            return Err(Error::EmptyIdentifier(String::new()));
        }

        let mut w = PropertyWriter::new();

        // a volume containing a '=' would otherwise be read back as a key
        if self.file_volume.contains('=') {
            w.entry(key(Field::File), self.file_volume.as_str());
        } else {
            w.value(&self.file_volume);
        }

        w.opt_str(key(Field::Aio), self.aio.as_deref())
            .opt_flag(key(Field::Backup), self.backup)
            .opt_str(key(Field::Cache), self.cache.as_deref())
            .opt_str(key(Field::Discard), self.discard.as_deref())
            .opt_str(key(Field::Format), self.format.as_deref())
            .opt_flag(key(Field::IoThread), self.iothread)
            .opt_number(key(Field::MbpsRd), self.mbps_rd)
            .opt_number(key(Field::MbpsRdMax), self.mbps_rd_max)
            .opt_number(key(Field::MbpsWr), self.mbps_wr)
            .opt_number(key(Field::MbpsWrMax), self.mbps_wr_max)
            .opt_str(key(Field::Media), self.media.as_deref())
            .opt_flag(key(Field::Replicate), self.replicate)
            .opt_entry(key(Field::Size), self.size.as_ref())
            .opt_flag(key(Field::Ssd), self.ssd);

        w.finish()
    }

    /// The storage part of a `<storage>:<volume>` volume id.
    pub fn storage_id(&self) -> Option<&str> {
        self.file_volume.split_once(':').map(|(storage, _)| storage)
    }

    /// The volume part of a `<storage>:<volume>` volume id, or the whole path for plain paths.
    pub fn volume_name(&self) -> &str {
        self.file_volume
            .split_once(':')
            .map_or(self.file_volume.as_str(), |(_, volume)| volume)
    }
}

impl FromStr for StorageDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::parse_property_string(s)
    }
}

property_string_serde!(StorageDevice, "a storage device string");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn simple_volume() {
        let drive = StorageDevice::decode(
            r#""local-lvm:vm-2041-disk-0,discard=on,ssd=1,iothread=1,size=8G,cache=writeback""#,
        )
        .unwrap();

        assert_eq!(
            drive,
            StorageDevice {
                file_volume: "local-lvm:vm-2041-disk-0".to_string(),
                enabled: true,
                cache: Some("writeback".to_string()),
                discard: Some("on".to_string()),
                iothread: Some(true),
                size: Some(DiskSize::from_gibibytes(8)),
                ssd: Some(true),
                ..Default::default()
            }
        );
        assert_eq!(drive.storage_id(), Some("local-lvm"));
        assert_eq!(drive.volume_name(), "vm-2041-disk-0");
    }

    #[test]
    fn format_from_extension() {
        let drive = StorageDevice::decode(
            r#""nfs:2041/vm-2041-disk-0.raw,discard=ignore,ssd=1,iothread=1,size=8G""#,
        )
        .unwrap();

        assert_eq!(
            drive,
            StorageDevice {
                file_volume: "nfs:2041/vm-2041-disk-0.raw".to_string(),
                enabled: true,
                discard: Some("ignore".to_string()),
                format: Some("raw".to_string()),
                iothread: Some(true),
                size: Some(DiskSize::from_gibibytes(8)),
                ssd: Some(true),
                ..Default::default()
            }
        );

        let drive: StorageDevice = "local:100/vm-100-disk-0.qcow2".parse().unwrap();
        assert_eq!(drive.format.as_deref(), Some("qcow2"));

        let drive: StorageDevice = "local:100/vm-100-disk-0.qcow2,format=raw".parse().unwrap();
        assert_eq!(drive.format.as_deref(), Some("raw"));

        let drive: StorageDevice = "local:100/disk.img".parse().unwrap();
        assert_eq!(drive.format, None);
        assert_eq!(infer_format("local:iso/debian.iso"), None);
        assert_eq!(infer_format("local:100/vm-100-disk-1.vmdk"), Some("vmdk"));
    }

    #[test]
    fn file_aliases() {
        let keyed: StorageDevice = "file=local:100/a.raw,size=4M".parse().unwrap();
        let volume: StorageDevice = "size=4M,volume=local:100/a.raw".parse().unwrap();
        let bare: StorageDevice = "local:100/a.raw,size=4M".parse().unwrap();
        assert_eq!(keyed, bare);
        assert_eq!(volume, bare);
    }

    #[test]
    fn all_options() {
        let drive: StorageDevice = "local-zfs:vm-100-disk-1,aio=io_uring,backup=0,cache=none,\
            discard=on,format=raw,iothread=1,mbps_rd=100,mbps_rd_max=150.5,mbps_wr=50,\
            mbps_wr_max=75,media=disk,replicate=off,size=32G,ssd=0"
            .parse()
            .unwrap();

        assert_eq!(drive.aio.as_deref(), Some("io_uring"));
        assert_eq!(drive.backup, Some(false));
        assert_eq!(drive.mbps_rd, Some(100.0));
        assert_eq!(drive.mbps_rd_max, Some(150.5));
        assert_eq!(drive.mbps_wr, Some(50.0));
        assert_eq!(drive.mbps_wr_max, Some(75.0));
        assert_eq!(drive.media.as_deref(), Some("disk"));
        assert_eq!(drive.replicate, Some(false));
        assert_eq!(drive.ssd, Some(false));

        assert_eq!(
            drive.to_property_string().unwrap(),
            "local-zfs:vm-100-disk-1,aio=io_uring,backup=0,cache=none,discard=on,format=raw,\
             iothread=1,mbps_rd=100,mbps_rd_max=150.5,mbps_wr=50,mbps_wr_max=75,media=disk,\
             replicate=0,size=32G,ssd=0"
        );
    }

    #[test]
    fn canonical_order() {
        let drive =
            StorageDevice::decode(r#""local:100/vm-100-disk-0.raw,ssd=1,size=8G,cache=writeback""#)
                .unwrap();
        assert_eq!(
            drive.encode().unwrap(),
            r#""local:100/vm-100-disk-0.raw,cache=writeback,format=raw,size=8G,ssd=1""#
        );
    }

    #[test]
    fn hand_built() {
        let mut drive = StorageDevice::new("local-lvm:vm-100-disk-0");
        drive.size = Some(DiskSize::from_mebibytes(512));
        drive.iothread = Some(false);
        assert_eq!(
            drive.to_property_string().unwrap(),
            "local-lvm:vm-100-disk-0,iothread=0,size=512M"
        );

        let drive = StorageDevice::new("/mnt/images/a=b.raw");
        let printed = drive.to_property_string().unwrap();
        assert_eq!(printed, "file=/mnt/images/a=b.raw");
        assert_eq!(
            printed.parse::<StorageDevice>().unwrap().file_volume,
            "/mnt/images/a=b.raw"
        );

        let err = StorageDevice::default().encode().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyIdentifier);

        // a comma would split the value into another entry on the way back
        let mut drive = StorageDevice::new("local:100/a.raw");
        drive.cache = Some("none,ssd=1".to_string());
        let err = drive.encode().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(err.token(), "cache=none,ssd=1");

        let err = StorageDevice::new("local:100/a,b.raw").encode().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let mut drive = StorageDevice::new("local:100/a.raw");
        drive.mbps_rd = Some(f64::NAN);
        let err = drive.encode().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidNumber);
        assert_eq!(err.token(), "mbps_rd=NaN");

        let mut drive = StorageDevice::new("local:100/a.raw");
        drive.mbps_wr_max = Some(f64::INFINITY);
        assert_eq!(drive.encode().unwrap_err().kind(), ErrorKind::InvalidNumber);
    }

    #[test]
    fn errors() {
        for (input, kind, token) in [
            ("local:100/a.raw,bogus=1", ErrorKind::UnknownField, "bogus=1"),
            ("local:100/a.raw,=1", ErrorKind::UnknownField, "=1"),
            ("local:100/a.raw,other", ErrorKind::UnknownField, "other"),
            ("local:100/a.raw,ssd=2", ErrorKind::InvalidBooleanFlag, "ssd=2"),
            (
                "local:100/a.raw,iothread=",
                ErrorKind::InvalidBooleanFlag,
                "iothread=",
            ),
            ("local:100/a.raw,size=8X", ErrorKind::InvalidSizeLiteral, "size=8X"),
            (
                "local:100/a.raw,mbps_rd=fast",
                ErrorKind::InvalidNumber,
                "mbps_rd=fast",
            ),
            ("local:100/a.raw,ssd=1,ssd=0", ErrorKind::DuplicateField, "ssd=0"),
            (
                "local:100/a.raw,file=local:100/b.raw",
                ErrorKind::DuplicateField,
                "file=local:100/b.raw",
            ),
            ("size=8G,ssd=1", ErrorKind::EmptyIdentifier, "size=8G,ssd=1"),
            ("file=,size=8G", ErrorKind::EmptyIdentifier, "file=,size=8G"),
            ("", ErrorKind::EmptyIdentifier, ""),
        ] {
            let err = input.parse::<StorageDevice>().expect_err(input);
            assert_eq!(err.kind(), kind, "{input}");
            assert_eq!(err.token(), token, "{input}");
        }

        let err = StorageDevice::decode("local:100/a.raw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuoting);
    }
}
