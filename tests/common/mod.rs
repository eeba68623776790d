//! Synthetic PBF fixtures for driving the binary.
//!
//! Mirrors the crate's internal test encoder (same names, same defaults:
//! granularity 100, zero offsets, raw header blob, zlib data blobs).

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

pub const GRANULARITY: i32 = 100;

fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn field_bytes(buf: &mut Vec<u8>, field: u32, data: &[u8]) {
    encode_varint((u64::from(field) << 3) | 2, buf);
    encode_varint(data.len() as u64, buf);
    buf.extend_from_slice(data);
}

fn field_varint(buf: &mut Vec<u8>, field: u32, value: u64) {
    encode_varint(u64::from(field) << 3, buf);
    encode_varint(value, buf);
}

pub struct TestNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub tags: Vec<(&'static str, &'static str)>,
}

impl TestNode {
    pub fn new(id: i64, lat: f64, lon: f64, tags: &[(&'static str, &'static str)]) -> Self {
        Self {
            id,
            lat,
            lon,
            tags: tags.to_vec(),
        }
    }
}

pub fn to_raw(deg: f64, offset: i64, granularity: i32) -> i64 {
    ((deg * 1e9 - offset as f64) / f64::from(granularity)).round() as i64
}

/// One DenseNodes group in one block, default layout.
pub fn dense_block(nodes: &[TestNode]) -> Vec<u8> {
    let mut strings: Vec<&str> = vec![""];
    let mut index = |s: &'static str| -> u64 {
        match strings.iter().skip(1).position(|&e| e == s) {
            Some(pos) => pos as u64 + 1,
            None => {
                strings.push(s);
                (strings.len() - 1) as u64
            }
        }
    };

    let (mut ids, mut lats, mut lons, mut kv) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    let (mut last_id, mut last_lat, mut last_lon) = (0i64, 0i64, 0i64);
    let any_tags = nodes.iter().any(|n| !n.tags.is_empty());
    for node in nodes {
        let lat = to_raw(node.lat, 0, GRANULARITY);
        let lon = to_raw(node.lon, 0, GRANULARITY);
        encode_varint(zigzag_encode(node.id - last_id), &mut ids);
        encode_varint(zigzag_encode(lat - last_lat), &mut lats);
        encode_varint(zigzag_encode(lon - last_lon), &mut lons);
        (last_id, last_lat, last_lon) = (node.id, lat, lon);
        if any_tags {
            for &(k, v) in &node.tags {
                encode_varint(index(k), &mut kv);
                encode_varint(index(v), &mut kv);
            }
            encode_varint(0, &mut kv);
        }
    }

    let mut dense = Vec::new();
    field_bytes(&mut dense, 1, &ids);
    field_bytes(&mut dense, 8, &lats);
    field_bytes(&mut dense, 9, &lons);
    if any_tags {
        field_bytes(&mut dense, 10, &kv);
    }

    let mut group = Vec::new();
    field_bytes(&mut group, 2, &dense);

    let mut table = Vec::new();
    for s in &strings {
        field_bytes(&mut table, 1, s.as_bytes());
    }

    let mut block = Vec::new();
    field_bytes(&mut block, 1, &table);
    field_bytes(&mut block, 2, &group);
    block
}

pub fn header_block(required: &[&str]) -> Vec<u8> {
    let mut header = Vec::new();
    for feature in required {
        field_bytes(&mut header, 4, feature.as_bytes());
    }
    field_bytes(&mut header, 16, b"grob-tests");
    header
}

pub fn raw_blob(data: &[u8]) -> Vec<u8> {
    let mut blob = Vec::new();
    field_bytes(&mut blob, 1, data);
    field_varint(&mut blob, 2, data.len() as u64);
    blob
}

pub fn zlib_blob(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    let compressed = encoder.finish().unwrap();
    let mut blob = Vec::new();
    field_varint(&mut blob, 2, data.len() as u64);
    field_bytes(&mut blob, 3, &compressed);
    blob
}

/// Frames an encoded `Blob` message as one file segment.
pub fn segment(blob_type: &str, blob: &[u8]) -> Vec<u8> {
    let mut header = Vec::new();
    field_bytes(&mut header, 1, blob_type.as_bytes());
    field_varint(&mut header, 3, blob.len() as u64);

    let mut out = (header.len() as u32).to_be_bytes().to_vec();
    out.extend(header);
    out.extend_from_slice(blob);
    out
}

pub fn pbf_file(blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = segment(
        "OSMHeader",
        &raw_blob(&header_block(&["OsmSchema-V0.6", "DenseNodes"])),
    );
    for block in blocks {
        out.extend(segment("OSMData", &zlib_blob(block)));
    }
    out
}

pub fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".osm.pbf")
        .tempfile()
        .expect("create temp pbf");
    file.write_all(bytes).expect("write temp pbf");
    file.flush().expect("flush temp pbf");
    file
}

pub fn run_grob(input: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_grob"))
        .arg(input)
        .args(args)
        .output()
        .expect("run grob")
}

pub fn run_grob_args(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_grob"))
        .args(args)
        .output()
        .expect("run grob")
}

pub fn stdout_lines(output: &Output) -> Vec<String> {
    let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}
