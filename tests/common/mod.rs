//! Minimal ZIP writer for building export fixtures on disk.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

pub const EXPORT_ENTRY: &str = "apple_health_export/export.xml";

pub const STORED: u16 = 0;
pub const DEFLATE: u16 = 8;

struct Member {
    name: String,
    data: Vec<u8>,
    method: u16,
}

#[derive(Default)]
pub struct ZipBuilder {
    members: Vec<Member>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(mut self, name: &str, data: impl AsRef<[u8]>, method: u16) -> Self {
        self.members.push(Member {
            name: name.to_string(),
            data: data.as_ref().to_vec(),
            method,
        });
        self
    }

    /// Write ZIP64 records: central directory sizes and offsets saturated at
    /// 0xFFFFFFFF with the real values in a 0x0001 extra field, and a ZIP64
    /// end of central directory plus locator.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cd = Vec::new();

        for member in &self.members {
            let mut crc = flate2::Crc::new();
            crc.update(&member.data);
            let payload = match member.method {
                DEFLATE => {
                    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(&member.data).unwrap();
                    encoder.finish().unwrap()
                }
                // Any other method stores the bytes verbatim
                _ => member.data.clone(),
            };
            let lfh_offset = out.len() as u32;

            out.extend_from_slice(b"PK\x03\x04");
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(member.method).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap(); // time, date
            out.write_u32::<LittleEndian>(crc.sum()).unwrap();
            out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(member.data.len() as u32).unwrap();
            out.write_u16::<LittleEndian>(member.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.extend_from_slice(member.name.as_bytes());
            out.extend_from_slice(&payload);

            cd.extend_from_slice(b"PK\x01\x02");
            cd.write_u16::<LittleEndian>(20).unwrap();
            cd.write_u16::<LittleEndian>(20).unwrap();
            cd.write_u16::<LittleEndian>(0).unwrap();
            cd.write_u16::<LittleEndian>(member.method).unwrap();
            cd.write_u32::<LittleEndian>(0).unwrap(); // time, date
            cd.write_u32::<LittleEndian>(crc.sum()).unwrap();
            let mut extra = Vec::new();
            if self.zip64 {
                cd.write_u32::<LittleEndian>(0xFFFFFFFF).unwrap();
                cd.write_u32::<LittleEndian>(0xFFFFFFFF).unwrap();
                extra.write_u16::<LittleEndian>(0x0001).unwrap();
                extra.write_u16::<LittleEndian>(24).unwrap();
                extra.write_u64::<LittleEndian>(member.data.len() as u64).unwrap();
                extra.write_u64::<LittleEndian>(payload.len() as u64).unwrap();
                extra.write_u64::<LittleEndian>(lfh_offset as u64).unwrap();
            } else {
                cd.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
                cd.write_u32::<LittleEndian>(member.data.len() as u32).unwrap();
            }
            cd.write_u16::<LittleEndian>(member.name.len() as u16).unwrap();
            cd.write_u16::<LittleEndian>(extra.len() as u16).unwrap();
            cd.write_u16::<LittleEndian>(0).unwrap(); // comment
            cd.write_u16::<LittleEndian>(0).unwrap(); // disk
            cd.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
            cd.write_u32::<LittleEndian>(0).unwrap(); // external attrs
            let offset_field = if self.zip64 { 0xFFFFFFFF } else { lfh_offset };
            cd.write_u32::<LittleEndian>(offset_field).unwrap();
            cd.extend_from_slice(member.name.as_bytes());
            cd.extend_from_slice(&extra);
        }

        let cd_offset = out.len() as u32;
        out.extend_from_slice(&cd);

        let mut count = self.members.len() as u16;
        let mut cd_size = cd.len() as u32;
        let mut eocd_cd_offset = cd_offset;
        if self.zip64 {
            let eocd64_offset = out.len() as u64;
            let entries = self.members.len() as u64;
            out.extend_from_slice(b"PK\x06\x06");
            out.write_u64::<LittleEndian>(44).unwrap(); // remaining record size
            out.write_u16::<LittleEndian>(45).unwrap(); // made by
            out.write_u16::<LittleEndian>(45).unwrap(); // needed
            out.write_u32::<LittleEndian>(0).unwrap(); // disk
            out.write_u32::<LittleEndian>(0).unwrap(); // disk with cd
            out.write_u64::<LittleEndian>(entries).unwrap();
            out.write_u64::<LittleEndian>(entries).unwrap();
            out.write_u64::<LittleEndian>(cd.len() as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_offset as u64).unwrap();

            out.extend_from_slice(b"PK\x06\x07");
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();

            count = 0xFFFF;
            cd_size = 0xFFFFFFFF;
            eocd_cd_offset = 0xFFFFFFFF;
        }

        out.extend_from_slice(b"PK\x05\x06");
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(eocd_cd_offset).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out
    }

    /// Write the archive into a fresh temp dir; keep the dir alive while in use.
    pub fn write(&self) -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("export.zip");
        std::fs::write(&path, self.build()).expect("write archive");
        (dir, path)
    }
}

/// `<Record>` element for a step count.
pub fn step(start_date: &str, value: u64) -> String {
    format!(
        r#"<Record type="HKQuantityTypeIdentifierStepCount" sourceName="Phone" unit="count" creationDate="{start_date}" startDate="{start_date}" endDate="{start_date}" value="{value}"/>"#
    )
}

/// `<Record>` element of some other quantity type.
pub fn other(kind: &str, start_date: &str, value: u64) -> String {
    format!(r#"<Record type="{kind}" unit="count/min" startDate="{start_date}" value="{value}"/>"#)
}

/// Wrap records in a Health export document.
pub fn export_xml(records: &[String]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE HealthData [\n<!ELEMENT HealthData (ExportDate,Me,(Record|Correlation|Workout)*)>\n]>\n<HealthData locale=\"en_NL\">\n <ExportDate value=\"2024-02-01 10:00:00 +0100\"/>\n",
    );
    for record in records {
        xml.push(' ');
        xml.push_str(record);
        xml.push('\n');
    }
    xml.push_str("</HealthData>\n");
    xml
}
