//! Structure summary of a measurement file

use crate::parser::MdfContainer;
use crate::types::{FileInfo, GroupInfo};
use std::fmt::Write as _;
use std::io::{Read, Seek};

#[cfg(feature = "serde")]
use serde::Serialize;

/// File metadata plus the layout of every channel group
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ContainerSummary {
    pub file: FileInfo,
    pub groups: Vec<GroupInfo>,
}

impl ContainerSummary {
    pub fn from_container<R: Read + Seek>(container: &MdfContainer<R>) -> Self {
        Self {
            file: container.info().clone(),
            groups: container.groups().to_vec(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.groups.iter().map(|g| g.channel_count()).sum()
    }

    /// Human-readable summary, one block per channel group
    pub fn render(&self) -> String {
        let file = &self.file;
        let mut out = String::new();

        let _ = writeln!(out, "MDF version: {} ({})", file.version, file.version_number);
        if !file.program.is_empty() {
            let _ = writeln!(out, "Program:     {}", file.program);
        }
        if let Some(start) = file.start_time {
            let _ = writeln!(out, "Start time:  {}", start.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
        }
        if !file.author.is_empty() {
            let _ = writeln!(out, "Author:      {}", file.author);
        }
        if !file.comment.is_empty() {
            let _ = writeln!(out, "Comment:     {}", file.comment);
        }
        let _ = writeln!(out, "Data groups    {:6}", file.data_group_count);
        let _ = writeln!(out, "Channel groups {:6}", self.groups.len());
        let _ = writeln!(out, "Channels       {:6}", self.channel_count());

        for group in &self.groups {
            let _ = writeln!(out);
            let name = if group.name.is_empty() {
                String::new()
            } else {
                format!(" '{}'", group.name)
            };
            let _ = writeln!(
                out,
                "Group {}{} (data group {}): {} records, {} bytes/record",
                group.id, name, group.data_group, group.record_count, group.record_size
            );
            if !group.comment.is_empty() && group.comment != group.name {
                let _ = writeln!(out, "  {}", group.comment);
            }
            for channel in &group.channels {
                let label = if channel.unit.is_empty() {
                    channel.name.clone()
                } else {
                    format!("{} [{}]", channel.name, channel.unit)
                };
                let role = if channel.is_master { "master" } else { "" };
                let _ = writeln!(out, "  {:<40} {:<6} {}", label, role, channel.data_type);
            }
        }
        out
    }

    #[cfg(feature = "json")]
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::ConvertError::Write(format!("JSON encoding failed: {e}")))
    }
}
