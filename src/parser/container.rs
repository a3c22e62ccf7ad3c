use crate::error::{ConvertError, Result};
use crate::parser::layout::DataGroupLayout;
use crate::parser::records::decode_channel_group;
use crate::parser::stream::MdfDataStream;
use crate::parser::{v3, v4};
use crate::types::{ChannelData, FileInfo, GroupData, GroupId, GroupInfo};
use log::{debug, warn};
use semver::{Version, VersionReq};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Size of the identification block at the start of every MDF file
pub const ID_BLOCK_SIZE: usize = 64;

/// Versions this reader understands
const SUPPORTED_VERSIONS: &str = ">=3.0.0, <5.0.0";

/// Contents of the identification block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub version: String,
    pub version_number: u16,
    pub program: String,
    pub big_endian: bool,
    pub finalized: bool,
}

impl Identification {
    pub fn parse(block: &[u8]) -> Result<Self> {
        if block.len() < ID_BLOCK_SIZE {
            return Err(ConvertError::FileFormat(
                "file is too short to be an MDF file".to_string(),
            ));
        }
        let magic = &block[0..8];
        let finalized = match magic {
            b"MDF     " => true,
            b"UnFinMF " => false,
            _ => {
                return Err(ConvertError::FileFormat(
                    "not an MDF file (missing MDF identification)".to_string(),
                ))
            }
        };

        let mut stream = MdfDataStream::new(block);
        stream.set_position(8);
        let version = stream.read_fixed_str(8)?.trim().to_string();
        let program = stream.read_fixed_str(8)?.trim().to_string();
        let byte_order = stream.read_u16()?;
        stream.set_position(28);
        let version_number = stream.read_u16()?;

        let parsed = parse_version(&version, version_number);
        let supported = VersionReq::parse(SUPPORTED_VERSIONS)
            .map(|req| req.matches(&parsed))
            .unwrap_or(false);
        if !supported {
            return Err(ConvertError::UnsupportedVersion(version));
        }

        // the byte order field only exists in v3; v4 is always little endian
        let big_endian = parsed.major == 3 && byte_order != 0;

        if !finalized {
            stream.set_position(60);
            let unfinished_flags = stream.read_u16()?;
            let custom_flags = stream.read_u16()?;
            if parsed.major < 4 || unfinished_flags != 0 || custom_flags != 0 {
                return Err(ConvertError::Unsupported(format!(
                    "unfinalized MDF file (flags {unfinished_flags:#x}/{custom_flags:#x})"
                )));
            }
            warn!("MDF file is marked unfinalized but carries no unfinished flags");
        }

        Ok(Self {
            version,
            version_number,
            program,
            big_endian,
            finalized,
        })
    }

    pub fn is_v4(&self) -> bool {
        self.version_number >= 400
    }
}

/// "4.10" → 4.10.0, falling back to the numeric version (410)
fn parse_version(version: &str, number: u16) -> Version {
    let mut parts = version.split('.');
    let major = parts.next().and_then(|p| p.trim().parse::<u64>().ok());
    let minor = parts.next().and_then(|p| p.trim().parse::<u64>().ok());
    match (major, minor) {
        (Some(major), Some(minor)) => Version::new(major, minor, 0),
        _ => Version::new((number / 100) as u64, (number % 100) as u64, 0),
    }
}

/// An opened measurement file
///
/// Holds the reader for the lifetime of the container; channel samples are
/// read on demand with [`MdfContainer::read_group`]. Dropping the container
/// closes the underlying file.
#[derive(Debug)]
pub struct MdfContainer<R> {
    reader: R,
    info: FileInfo,
    data_groups: Vec<DataGroupLayout>,
    groups: Vec<GroupInfo>,
    /// (data group, channel group within it) per GroupId
    locations: Vec<(usize, usize)>,
}

impl MdfContainer<BufReader<File>> {
    /// Open an MDF file from disk
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ConvertError::FileFormat(format!("cannot open {}: {}", path.display(), e))
        })?;
        debug!("Opened {}", path.display());
        Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            ConvertError::FileFormat(msg) => {
                ConvertError::FileFormat(format!("{}: {}", path.display(), msg))
            }
            ConvertError::UnexpectedEof => ConvertError::FileFormat(format!(
                "{}: unexpected end of file",
                path.display()
            )),
            other => other,
        })
    }
}

impl<R: Read + Seek> MdfContainer<R> {
    /// Read the identification block and the block tree from any reader
    pub fn from_reader(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut id_block = Vec::with_capacity(ID_BLOCK_SIZE);
        reader
            .by_ref()
            .take(ID_BLOCK_SIZE as u64)
            .read_to_end(&mut id_block)?;
        let identification = Identification::parse(&id_block)?;

        let mut info = FileInfo {
            version: identification.version.clone(),
            version_number: identification.version_number,
            program: identification.program.clone(),
            ..Default::default()
        };

        let data_groups = if identification.is_v4() {
            v4::read_structure(&mut reader, &mut info)?
        } else {
            v3::read_structure(&mut reader, &mut info, identification.big_endian)?
        };

        let mut groups = Vec::new();
        let mut locations = Vec::new();
        for (dg_index, data_group) in data_groups.iter().enumerate() {
            for (cg_index, group) in data_group.groups.iter().enumerate() {
                if group.variable_length {
                    continue;
                }
                let mut group_info = group.info.clone();
                group_info.id = groups.len();
                groups.push(group_info);
                locations.push((dg_index, cg_index));
            }
        }

        debug!(
            "MDF {} by '{}': {} data groups, {} channel groups",
            info.version,
            info.program,
            data_groups.len(),
            groups.len()
        );

        Ok(Self {
            reader,
            info,
            data_groups,
            groups,
            locations,
        })
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    /// Identifiers of every channel group, in file order
    pub fn group_ids(&self) -> Vec<GroupId> {
        (0..self.groups.len()).collect()
    }

    pub fn groups(&self) -> &[GroupInfo] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupInfo> {
        self.groups.get(id)
    }

    /// Decode all samples of one channel group
    pub fn read_group(&mut self, id: GroupId) -> Result<GroupData> {
        let (dg_index, cg_index) = *self.locations.get(id).ok_or_else(|| {
            ConvertError::FileFormat(format!("channel group {id} does not exist"))
        })?;
        let data_group = &self.data_groups[dg_index];

        let mut data = Vec::new();
        for range in &data_group.data {
            self.reader.seek(SeekFrom::Start(range.offset))?;
            let read = self
                .reader
                .by_ref()
                .take(range.len)
                .read_to_end(&mut data)?;
            if (read as u64) < range.len {
                warn!(
                    "data block at {:#x} is truncated ({} of {} bytes)",
                    range.offset, read, range.len
                );
            }
        }

        let columns = decode_channel_group(&data, data_group, cg_index)?;
        let layout = &data_group.groups[cg_index];
        let channels = layout
            .channels
            .iter()
            .zip(columns)
            .map(|(channel, samples)| ChannelData {
                info: channel.info.clone(),
                samples,
            })
            .collect();

        Ok(GroupData {
            id,
            name: layout.info.name.clone(),
            channels,
        })
    }

    /// Release the underlying reader
    pub fn close(self) {
        debug!("Closing MDF container");
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_block(magic: &[u8; 8], version: &str, number: u16) -> Vec<u8> {
        let mut block = vec![0u8; ID_BLOCK_SIZE];
        block[..8].copy_from_slice(magic);
        let mut ver = [b' '; 8];
        ver[..version.len()].copy_from_slice(version.as_bytes());
        block[8..16].copy_from_slice(&ver);
        block[16..24].copy_from_slice(b"test    ");
        block[28..30].copy_from_slice(&number.to_le_bytes());
        block
    }

    #[test]
    fn test_identification_v4() {
        let id = Identification::parse(&id_block(b"MDF     ", "4.10", 410)).unwrap();
        assert!(id.is_v4());
        assert_eq!(id.version, "4.10");
        assert_eq!(id.program, "test");
        assert!(!id.big_endian);
        assert!(id.finalized);
    }

    #[test]
    fn test_identification_v3_big_endian() {
        let mut block = id_block(b"MDF     ", "3.30", 330);
        block[24] = 1;
        let id = Identification::parse(&block).unwrap();
        assert!(!id.is_v4());
        assert!(id.big_endian);
    }

    #[test]
    fn test_identification_rejects_other_versions() {
        assert!(matches!(
            Identification::parse(&id_block(b"MDF     ", "2.14", 214)),
            Err(ConvertError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            Identification::parse(&id_block(b"MDF     ", "5.00", 500)),
            Err(ConvertError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_identification_rejects_non_mdf() {
        let mut block = id_block(b"MDF     ", "4.10", 410);
        block[..8].copy_from_slice(b"PK\x03\x04    ");
        assert!(matches!(
            Identification::parse(&block),
            Err(ConvertError::FileFormat(_))
        ));
        assert!(matches!(
            Identification::parse(b"MDF"),
            Err(ConvertError::FileFormat(_))
        ));
    }

    #[test]
    fn test_unfinalized_with_flags_is_rejected() {
        let mut block = id_block(b"UnFinMF ", "4.10", 410);
        block[60] = 1;
        assert!(matches!(
            Identification::parse(&block),
            Err(ConvertError::Unsupported(_))
        ));
        block[60] = 0;
        assert!(!Identification::parse(&block).unwrap().finalized);
    }

    #[test]
    fn test_parse_version_fallback() {
        assert_eq!(parse_version("4.11", 411), Version::new(4, 11, 0));
        assert_eq!(parse_version("garbage", 330), Version::new(3, 30, 0));
    }

    #[test]
    fn test_open_missing_file_is_format_error() {
        let err = MdfContainer::open(Path::new("/nonexistent/trip.mdf")).unwrap_err();
        assert!(matches!(err, ConvertError::FileFormat(_)));
        assert!(err.to_string().contains("trip.mdf"));
    }
}
