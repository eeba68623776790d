//! Minimal PBF encoder for building synthetic fixtures in unit tests.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[derive(Default)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&mut self, field: u32, wire_type: u8) {
        encode_varint((u64::from(field) << 3) | u64::from(wire_type), &mut self.buf);
    }

    pub fn varint(&mut self, field: u32, value: u64) -> &mut Self {
        self.key(field, 0);
        encode_varint(value, &mut self.buf);
        self
    }

    pub fn sint64(&mut self, field: u32, value: i64) -> &mut Self {
        self.varint(field, zigzag_encode(value))
    }

    pub fn fixed32(&mut self, field: u32, value: u32) -> &mut Self {
        self.key(field, 5);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn fixed64(&mut self, field: u32, value: u64) -> &mut Self {
        self.key(field, 1);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        self.key(field, 2);
        encode_varint(value.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn string(&mut self, field: u32, value: &str) -> &mut Self {
        self.bytes(field, value.as_bytes())
    }

    pub fn packed_sint64(&mut self, field: u32, values: &[i64]) -> &mut Self {
        let mut packed = Vec::new();
        for &v in values {
            encode_varint(zigzag_encode(v), &mut packed);
        }
        self.bytes(field, &packed)
    }

    pub fn packed_int32(&mut self, field: u32, values: &[i32]) -> &mut Self {
        let mut packed = Vec::new();
        for &v in values {
            encode_varint(i64::from(v) as u64, &mut packed);
        }
        self.bytes(field, &packed)
    }

    pub fn packed_uint32(&mut self, field: u32, values: &[u32]) -> &mut Self {
        let mut packed = Vec::new();
        for &v in values {
            encode_varint(u64::from(v), &mut packed);
        }
        self.bytes(field, &packed)
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
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

/// Builds a block string table, reserving index 0.
pub struct StringTableBuilder {
    strings: Vec<&'static str>,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        Self { strings: vec![""] }
    }

    pub fn index(&mut self, s: &'static str) -> u32 {
        if let Some(pos) = self.strings.iter().skip(1).position(|&e| e == s) {
            return pos as u32 + 1;
        }
        self.strings.push(s);
        (self.strings.len() - 1) as u32
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut table = MessageWriter::new();
        for s in &self.strings {
            table.string(1, s);
        }
        table.finish()
    }
}

pub fn to_raw(deg: f64, offset: i64, granularity: i32) -> i64 {
    ((deg * 1e9 - offset as f64) / f64::from(granularity)).round() as i64
}

pub struct BlockLayout {
    pub granularity: i32,
    pub lat_offset: i64,
    pub lon_offset: i64,
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            granularity: 100,
            lat_offset: 0,
            lon_offset: 0,
        }
    }
}

fn finish_block(
    strings: &StringTableBuilder,
    groups: Vec<Vec<u8>>,
    layout: &BlockLayout,
) -> Vec<u8> {
    let mut block = MessageWriter::new();
    block.bytes(1, &strings.encode());
    for group in groups {
        block.bytes(2, &group);
    }
    if layout.granularity != 100 {
        block.varint(17, layout.granularity as u64);
    }
    if layout.lat_offset != 0 {
        block.varint(19, layout.lat_offset as u64);
    }
    if layout.lon_offset != 0 {
        block.varint(20, layout.lon_offset as u64);
    }
    block.finish()
}

pub fn dense_group(
    nodes: &[TestNode],
    strings: &mut StringTableBuilder,
    layout: &BlockLayout,
) -> Vec<u8> {
    let (mut ids, mut lats, mut lons) = (Vec::new(), Vec::new(), Vec::new());
    let mut kv = Vec::new();
    let (mut last_id, mut last_lat, mut last_lon) = (0i64, 0i64, 0i64);
    let any_tags = nodes.iter().any(|n| !n.tags.is_empty());
    for node in nodes {
        let lat = to_raw(node.lat, layout.lat_offset, layout.granularity);
        let lon = to_raw(node.lon, layout.lon_offset, layout.granularity);
        ids.push(node.id - last_id);
        lats.push(lat - last_lat);
        lons.push(lon - last_lon);
        (last_id, last_lat, last_lon) = (node.id, lat, lon);
        if any_tags {
            for &(k, v) in &node.tags {
                kv.push(strings.index(k) as i32);
                kv.push(strings.index(v) as i32);
            }
            kv.push(0);
        }
    }

    let mut dense = MessageWriter::new();
    dense.packed_sint64(1, &ids);
    dense.packed_sint64(8, &lats);
    dense.packed_sint64(9, &lons);
    if any_tags {
        dense.packed_int32(10, &kv);
    }
    let mut group = MessageWriter::new();
    group.bytes(2, &dense.finish());
    group.finish()
}

pub fn dense_block_with(nodes: &[TestNode], layout: &BlockLayout) -> Vec<u8> {
    let mut strings = StringTableBuilder::new();
    let group = dense_group(nodes, &mut strings, layout);
    finish_block(&strings, vec![group], layout)
}

pub fn dense_block(nodes: &[TestNode]) -> Vec<u8> {
    dense_block_with(nodes, &BlockLayout::default())
}

pub fn plain_block(nodes: &[TestNode]) -> Vec<u8> {
    let layout = BlockLayout::default();
    let mut strings = StringTableBuilder::new();
    let mut group = MessageWriter::new();
    for node in nodes {
        let keys: Vec<u32> = node.tags.iter().map(|&(k, _)| strings.index(k)).collect();
        let vals: Vec<u32> = node.tags.iter().map(|&(_, v)| strings.index(v)).collect();
        let mut msg = MessageWriter::new();
        msg.sint64(1, node.id);
        msg.packed_uint32(2, &keys);
        msg.packed_uint32(3, &vals);
        msg.sint64(8, to_raw(node.lat, 0, 100));
        msg.sint64(9, to_raw(node.lon, 0, 100));
        group.bytes(1, &msg.finish());
    }
    finish_block(&strings, vec![group.finish()], &layout)
}

/// A group holding `ways` empty ways and `relations` empty relations.
pub fn ways_and_relations_block(ways: usize, relations: usize) -> Vec<u8> {
    let mut group = MessageWriter::new();
    for id in 0..ways {
        let mut way = MessageWriter::new();
        way.varint(1, id as u64 + 1);
        way.packed_sint64(8, &[1, 1, 1]);
        group.bytes(3, &way.finish());
    }
    for id in 0..relations {
        let mut rel = MessageWriter::new();
        rel.varint(1, id as u64 + 1);
        group.bytes(4, &rel.finish());
    }
    finish_block(&StringTableBuilder::new(), vec![group.finish()], &BlockLayout::default())
}

pub fn header_block(required: &[&str]) -> Vec<u8> {
    let mut header = MessageWriter::new();
    for feature in required {
        header.string(4, feature);
    }
    header.string(16, "grob-tests");
    header.finish()
}

pub fn raw_blob(data: &[u8]) -> Vec<u8> {
    let mut blob = MessageWriter::new();
    blob.bytes(1, data);
    blob.varint(2, data.len() as u64);
    blob.finish()
}

pub fn zlib_blob(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    let compressed = encoder.finish().unwrap();
    let mut blob = MessageWriter::new();
    blob.varint(2, data.len() as u64);
    blob.bytes(3, &compressed);
    blob.finish()
}

/// Frames an encoded `Blob` message as one file segment.
pub fn segment(blob_type: &str, blob: &[u8]) -> Vec<u8> {
    let mut header = MessageWriter::new();
    header.string(1, blob_type);
    header.varint(3, blob.len() as u64);
    let header = header.finish();

    let mut out = Vec::new();
    out.extend_from_slice(&(header.len() as u32).to_be_bytes());
    out.extend_from_slice(&header);
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
