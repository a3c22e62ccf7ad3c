//! Writer for small, valid MDF files
//!
//! Produces sorted MDF 3.30 or 4.10 files with one channel group per data
//! group. Used to generate demo measurements and test fixtures.

use crate::error::{ConvertError, Result};
use chrono::{DateTime, Utc};
use log::debug;
use std::path::Path;

/// Format version to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MdfVersion {
    V3,
    #[default]
    V4,
}

impl MdfVersion {
    fn version_str(&self) -> &'static [u8; 8] {
        match self {
            MdfVersion::V3 => b"3.30    ",
            MdfVersion::V4 => b"4.10    ",
        }
    }

    fn version_number(&self) -> u16 {
        match self {
            MdfVersion::V3 => 330,
            MdfVersion::V4 => 410,
        }
    }
}

/// Raw samples of one channel
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValues {
    F64(Vec<f64>),
    U16(Vec<u16>),
}

impl SampleValues {
    pub fn len(&self) -> usize {
        match self {
            SampleValues::F64(v) => v.len(),
            SampleValues::U16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn byte_size(&self) -> usize {
        match self {
            SampleValues::F64(_) => 8,
            SampleValues::U16(_) => 2,
        }
    }

    fn write_sample(&self, index: usize, out: &mut Vec<u8>) {
        match self {
            SampleValues::F64(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            SampleValues::U16(v) => out.extend_from_slice(&v[index].to_le_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthChannel {
    pub name: String,
    pub unit: String,
    pub is_master: bool,
    pub values: SampleValues,
    /// Linear conversion (offset, factor) from raw to physical values
    pub linear: Option<(f64, f64)>,
}

impl SynthChannel {
    pub fn new(name: impl Into<String>, values: SampleValues) -> Self {
        Self {
            name: name.into(),
            unit: String::new(),
            is_master: false,
            values,
            linear: None,
        }
    }

    /// Time channel in seconds
    pub fn master(values: Vec<f64>) -> Self {
        Self {
            name: "time".to_string(),
            unit: "s".to_string(),
            is_master: true,
            values: SampleValues::F64(values),
            linear: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_linear(mut self, offset: f64, factor: f64) -> Self {
        self.linear = Some((offset, factor));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SynthGroup {
    pub name: String,
    pub channels: Vec<SynthChannel>,
}

impl SynthGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: SynthChannel) -> Self {
        self.channels.push(channel);
        self
    }

    fn record_count(&self) -> Result<usize> {
        let count = self.channels.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = self.channels.iter().find(|c| c.values.len() != count) {
            return Err(ConvertError::Write(format!(
                "channel '{}' of group '{}' has {} samples, expected {}",
                bad.name,
                self.name,
                bad.values.len(),
                count
            )));
        }
        Ok(count)
    }

    fn record_size(&self) -> usize {
        self.channels.iter().map(|c| c.values.byte_size()).sum()
    }

    /// Sample bytes, records back to back
    fn records(&self) -> Result<Vec<u8>> {
        let count = self.record_count()?;
        let mut out = Vec::with_capacity(count * self.record_size());
        for index in 0..count {
            for channel in &self.channels {
                channel.values.write_sample(index, &mut out);
            }
        }
        Ok(out)
    }
}

/// Builder for an MDF file
#[derive(Debug, Clone, PartialEq)]
pub struct MdfWriter {
    pub version: MdfVersion,
    pub program: String,
    pub author: String,
    pub comment: String,
    pub start_time: Option<DateTime<Utc>>,
    pub groups: Vec<SynthGroup>,
}

impl MdfWriter {
    pub fn new(version: MdfVersion) -> Self {
        Self {
            version,
            program: "mdfconv".to_string(),
            author: String::new(),
            comment: String::new(),
            start_time: None,
            groups: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_group(mut self, group: SynthGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Serialize the whole file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut file = FileBuf::default();
        file.bytes.extend_from_slice(&self.identification());
        match self.version {
            MdfVersion::V4 => self.write_v4(&mut file)?,
            MdfVersion::V3 => self.write_v3(&mut file)?,
        }
        debug!(
            "Serialized MDF {} with {} groups, {} bytes",
            self.version.version_number(),
            self.groups.len(),
            file.bytes.len()
        );
        Ok(file.bytes)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| {
            ConvertError::Write(format!("cannot write {}: {}", path.display(), e))
        })
    }

    fn identification(&self) -> [u8; 64] {
        let mut id = [0u8; 64];
        id[..8].copy_from_slice(b"MDF     ");
        id[8..16].copy_from_slice(self.version.version_str());
        id[16..24].copy_from_slice(&fixed_str::<8>(&self.program));
        id[28..30].copy_from_slice(&self.version.version_number().to_le_bytes());
        id
    }

    fn start_time_ns(&self) -> u64 {
        self.start_time
            .and_then(|t| t.timestamp_nanos_opt())
            .map(|ns| ns.max(0) as u64)
            .unwrap_or(0)
    }

    fn write_v4(&self, file: &mut FileBuf) -> Result<()> {
        const HD_SIZE: usize = 24 + 6 * 8 + 32;
        file.bytes.resize(64 + HD_SIZE, 0);

        let comment = if self.comment.is_empty() && self.author.is_empty() {
            0
        } else {
            let xml = format!(
                "<HDcomment><TX>{}</TX><common_properties><e name=\"author\">{}</e></common_properties></HDcomment>",
                escape_xml(&self.comment),
                escape_xml(&self.author)
            );
            file.append_v4(b"##MD", &[], &text_data(&xml))
        };

        let mut next_dg = 0;
        for group in self.groups.iter().rev() {
            next_dg = write_v4_group(file, group, next_dg)?;
        }

        let mut hd_data = Vec::with_capacity(32);
        hd_data.extend_from_slice(&self.start_time_ns().to_le_bytes());
        hd_data.resize(32, 0);
        let hd = v4_block(b"##HD", &[next_dg, 0, 0, 0, 0, comment], &hd_data);
        file.bytes[64..64 + HD_SIZE].copy_from_slice(&hd);
        Ok(())
    }

    fn write_v3(&self, file: &mut FileBuf) -> Result<()> {
        const HD_SIZE: usize = 208;
        file.bytes.resize(64 + HD_SIZE, 0);

        let comment = file.append_v3_text(&self.comment);
        let mut next_dg = 0;
        for group in self.groups.iter().rev() {
            next_dg = write_v3_group(file, group, next_dg)?;
        }

        let (date, time) = match self.start_time {
            Some(start) => (
                start.format("%d:%m:%Y").to_string(),
                start.format("%H:%M:%S").to_string(),
            ),
            None => (String::new(), String::new()),
        };
        let mut body = Vec::with_capacity(HD_SIZE - 4);
        body.extend_from_slice(&(next_dg as u32).to_le_bytes());
        body.extend_from_slice(&(comment as u32).to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&(self.groups.len() as u16).to_le_bytes());
        body.extend_from_slice(&fixed_str::<10>(&date));
        body.extend_from_slice(&fixed_str::<8>(&time));
        body.extend_from_slice(&fixed_str::<32>(&self.author));
        body.extend_from_slice(&[0u8; 32 * 3]);
        body.extend_from_slice(&self.start_time_ns().to_le_bytes());
        body.resize(HD_SIZE - 4, 0);
        let hd = v3_block(b"HD", &body)?;
        file.bytes[64..64 + HD_SIZE].copy_from_slice(&hd);
        Ok(())
    }
}

#[derive(Default)]
struct FileBuf {
    bytes: Vec<u8>,
}

impl FileBuf {
    /// Append at an 8 byte boundary and return the offset
    fn append(&mut self, block: &[u8]) -> u64 {
        while self.bytes.len() % 8 != 0 {
            self.bytes.push(0);
        }
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(block);
        offset
    }

    fn append_v4(&mut self, id: &[u8; 4], links: &[u64], data: &[u8]) -> u64 {
        self.append(&v4_block(id, links, data))
    }

    fn append_v4_text(&mut self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }
        self.append_v4(b"##TX", &[], &text_data(text))
    }

    fn append_v3_text(&mut self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }
        let mut body = text.as_bytes().to_vec();
        body.push(0);
        // body length is bounded by the u16 block size
        body.truncate(u16::MAX as usize - 5);
        match v3_block(b"TX", &body) {
            Ok(block) => self.append(&block),
            Err(_) => 0,
        }
    }
}

fn v4_block(id: &[u8; 4], links: &[u64], data: &[u8]) -> Vec<u8> {
    let length = 24 + links.len() * 8 + data.len();
    let mut block = Vec::with_capacity(length);
    block.extend_from_slice(id);
    block.extend_from_slice(&[0u8; 4]);
    block.extend_from_slice(&(length as u64).to_le_bytes());
    block.extend_from_slice(&(links.len() as u64).to_le_bytes());
    for link in links {
        block.extend_from_slice(&link.to_le_bytes());
    }
    block.extend_from_slice(data);
    block
}

fn v3_block(id: &[u8; 2], body: &[u8]) -> Result<Vec<u8>> {
    let size = u16::try_from(body.len() + 4).map_err(|_| {
        ConvertError::Write(format!(
            "{} block of {} bytes does not fit MDF 3",
            String::from_utf8_lossy(id),
            body.len()
        ))
    })?;
    let mut block = Vec::with_capacity(size as usize);
    block.extend_from_slice(id);
    block.extend_from_slice(&size.to_le_bytes());
    block.extend_from_slice(body);
    Ok(block)
}

/// NUL terminated text padded to 8 bytes
fn text_data(text: &str) -> Vec<u8> {
    let mut data = text.as_bytes().to_vec();
    data.push(0);
    while data.len() % 8 != 0 {
        data.push(0);
    }
    data
}

/// Latin-1 field of fixed width, cut or NUL padded
fn fixed_str<const N: usize>(text: &str) -> [u8; N] {
    let mut out = [0u8; N];
    for (slot, ch) in out.iter_mut().zip(text.chars()) {
        *slot = u8::try_from(u32::from(ch)).unwrap_or(b'?');
    }
    out
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Write one group as its own data group, returning the DG offset
fn write_v4_group(file: &mut FileBuf, group: &SynthGroup, next_dg: u64) -> Result<u64> {
    let record_count = group.record_count()?;
    let records = group.records()?;
    let data = if records.is_empty() {
        0
    } else {
        file.append_v4(b"##DT", &[], &records)
    };

    let mut byte_offsets = Vec::with_capacity(group.channels.len());
    let mut offset = 0u32;
    for channel in &group.channels {
        byte_offsets.push(offset);
        offset += channel.values.byte_size() as u32;
    }

    let mut next_cn = 0;
    for (channel, byte_offset) in group.channels.iter().zip(byte_offsets).rev() {
        let name = file.append_v4_text(&channel.name);
        let unit = file.append_v4_text(&channel.unit);
        let conversion = match channel.linear {
            Some((offset, factor)) => {
                let mut cc = vec![1u8, 0, 0, 0, 0, 0, 2, 0];
                cc.extend_from_slice(&[0u8; 16]);
                cc.extend_from_slice(&offset.to_le_bytes());
                cc.extend_from_slice(&factor.to_le_bytes());
                file.append_v4(b"##CC", &[0, 0, 0, 0], &cc)
            }
            None => 0,
        };
        let (data_type, bit_count) = match channel.values {
            SampleValues::F64(_) => (4u8, 64u32),
            SampleValues::U16(_) => (0u8, 16u32),
        };

        let mut cn = Vec::with_capacity(72);
        cn.push(if channel.is_master { 2 } else { 0 });
        cn.push(if channel.is_master { 1 } else { 0 });
        cn.push(data_type);
        cn.push(0);
        cn.extend_from_slice(&byte_offset.to_le_bytes());
        cn.extend_from_slice(&bit_count.to_le_bytes());
        cn.resize(72, 0);
        next_cn = file.append_v4(b"##CN", &[next_cn, 0, name, 0, conversion, 0, unit, 0], &cn);
    }

    let acquisition_name = file.append_v4_text(&group.name);
    let mut cg = Vec::with_capacity(32);
    cg.extend_from_slice(&0u64.to_le_bytes());
    cg.extend_from_slice(&(record_count as u64).to_le_bytes());
    cg.extend_from_slice(&[0u8; 8]);
    cg.extend_from_slice(&(group.record_size() as u32).to_le_bytes());
    cg.extend_from_slice(&0u32.to_le_bytes());
    let cg_offset = file.append_v4(b"##CG", &[0, next_cn, acquisition_name, 0, 0, 0], &cg);

    Ok(file.append_v4(b"##DG", &[next_dg, cg_offset, data, 0], &[0u8; 8]))
}

fn write_v3_group(file: &mut FileBuf, group: &SynthGroup, next_dg: u64) -> Result<u64> {
    let record_count = group.record_count()?;
    let record_size = u16::try_from(group.record_size()).map_err(|_| {
        ConvertError::Write(format!("records of group '{}' are too large for MDF 3", group.name))
    })?;
    let records = group.records()?;
    let data = if records.is_empty() {
        0
    } else {
        file.append(&records)
    };

    let mut next_cn = 0u64;
    let mut byte_offsets = Vec::with_capacity(group.channels.len());
    let mut offset = 0usize;
    for channel in &group.channels {
        byte_offsets.push(offset);
        offset += channel.values.byte_size();
    }

    for (channel, byte_offset) in group.channels.iter().zip(byte_offsets).rev() {
        let long_name = file.append_v3_text(&channel.name);
        let conversion = if channel.linear.is_some() || !channel.unit.is_empty() {
            let mut cc = Vec::with_capacity(58);
            cc.extend_from_slice(&[0u8; 18]);
            cc.extend_from_slice(&fixed_str::<20>(&channel.unit));
            match channel.linear {
                Some((offset, factor)) => {
                    cc.extend_from_slice(&0u16.to_le_bytes());
                    cc.extend_from_slice(&2u16.to_le_bytes());
                    cc.extend_from_slice(&offset.to_le_bytes());
                    cc.extend_from_slice(&factor.to_le_bytes());
                }
                None => {
                    cc.extend_from_slice(&u16::MAX.to_le_bytes());
                    cc.extend_from_slice(&0u16.to_le_bytes());
                }
            }
            file.append(&v3_block(b"CC", &cc)?)
        } else {
            0
        };
        let (data_type, bit_count) = match channel.values {
            SampleValues::F64(_) => (3u16, 64u16),
            SampleValues::U16(_) => (0u16, 16u16),
        };
        let bit_position = byte_offset * 8;
        let (start_offset, additional) = match u16::try_from(bit_position) {
            Ok(bits) => (bits, 0u16),
            Err(_) => (0, u16::try_from(byte_offset).unwrap_or(u16::MAX)),
        };

        let mut cn = Vec::with_capacity(224);
        for link in [next_cn, conversion, 0, 0, 0] {
            cn.extend_from_slice(&(link as u32).to_le_bytes());
        }
        cn.extend_from_slice(&u16::from(channel.is_master).to_le_bytes());
        cn.extend_from_slice(&fixed_str::<32>(&channel.name));
        cn.extend_from_slice(&[0u8; 128]);
        cn.extend_from_slice(&start_offset.to_le_bytes());
        cn.extend_from_slice(&bit_count.to_le_bytes());
        cn.extend_from_slice(&data_type.to_le_bytes());
        cn.extend_from_slice(&[0u8; 2 + 8 * 3]);
        cn.extend_from_slice(&(long_name as u32).to_le_bytes());
        cn.extend_from_slice(&0u32.to_le_bytes());
        cn.extend_from_slice(&additional.to_le_bytes());
        next_cn = file.append(&v3_block(b"CN", &cn)?);
    }

    let comment = file.append_v3_text(&group.name);
    let mut cg = Vec::with_capacity(26);
    for link in [0, next_cn, comment] {
        cg.extend_from_slice(&(link as u32).to_le_bytes());
    }
    cg.extend_from_slice(&0u16.to_le_bytes());
    cg.extend_from_slice(&(group.channels.len() as u16).to_le_bytes());
    cg.extend_from_slice(&record_size.to_le_bytes());
    cg.extend_from_slice(&(record_count as u32).to_le_bytes());
    cg.extend_from_slice(&0u32.to_le_bytes());
    let cg_offset = file.append(&v3_block(b"CG", &cg)?);

    let mut dg = Vec::with_capacity(24);
    for link in [next_dg, cg_offset, 0, data] {
        dg.extend_from_slice(&(link as u32).to_le_bytes());
    }
    dg.extend_from_slice(&1u16.to_le_bytes());
    dg.extend_from_slice(&0u16.to_le_bytes());
    dg.extend_from_slice(&0u32.to_le_bytes());
    Ok(file.append(&v3_block(b"DG", &dg)?))
}

/// Demo measurement: engine, vehicle and ambient groups at 100, 10 and 1 Hz
pub fn sample_measurement(version: MdfVersion, seconds: u32) -> MdfWriter {
    let times = |rate: u32| -> Vec<f64> {
        (0..seconds * rate).map(|i| i as f64 / rate as f64).collect()
    };

    let engine_t = times(100);
    let rpm: Vec<u16> = engine_t
        .iter()
        .map(|t| (3200.0 + 800.0 * (t * 0.5).sin()) as u16 * 4)
        .collect();
    let throttle: Vec<f64> = engine_t.iter().map(|t| 40.0 + 20.0 * (t * 0.5).sin()).collect();

    let vehicle_t = times(10);
    let speed: Vec<f64> = vehicle_t.iter().map(|t| 50.0 + 2.5 * t).collect();

    let ambient_t = times(1);
    let temperature: Vec<f64> = ambient_t.iter().map(|t| 21.5 + 0.1 * t).collect();

    MdfWriter::new(version)
        .with_comment("Synthetic test drive")
        .with_author("mdf_convert")
        .with_group(
            SynthGroup::new("Engine")
                .with_channel(SynthChannel::master(engine_t))
                .with_channel(
                    SynthChannel::new("EngineSpeed", SampleValues::U16(rpm))
                        .with_unit("rpm")
                        .with_linear(0.0, 0.25),
                )
                .with_channel(
                    SynthChannel::new("ThrottlePosition", SampleValues::F64(throttle))
                        .with_unit("%"),
                ),
        )
        .with_group(
            SynthGroup::new("Vehicle")
                .with_channel(SynthChannel::master(vehicle_t))
                .with_channel(
                    SynthChannel::new("VehicleSpeed", SampleValues::F64(speed)).with_unit("km/h"),
                ),
        )
        .with_group(
            SynthGroup::new("Ambient")
                .with_channel(SynthChannel::master(ambient_t))
                .with_channel(
                    SynthChannel::new("AmbientTemperature", SampleValues::F64(temperature))
                        .with_unit("degC"),
                ),
        )
}
