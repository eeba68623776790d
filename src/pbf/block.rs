//! Primitive block decoding.
//!
//! A block carries a string table, coordinate scaling and one or more
//! groups. Nodes arrive either as plain `Node` messages or packed into a
//! `DenseNodes` message whose ids and coordinates are delta-coded and whose
//! tags are a flat, zero-terminated stream of string table indices. Ways
//! and relations are only counted; their payloads are skipped.

use super::error::FormatError;
use super::wire::MessageReader;

pub const DEFAULT_GRANULARITY: i32 = 100;

/// A node reconstructed from a block. Tags borrow from the block string
/// table and keep their on-disk order.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<'a> {
    id: i64,
    lat: f64,
    lon: f64,
    tags: Vec<(&'a str, &'a str)>,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn tags(&self) -> &[(&'a str, &'a str)] {
        &self.tags
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element<'a> {
    Node(Node<'a>),
    DenseNode(Node<'a>),
    Way,
    Relation,
}

#[derive(Debug, Clone, Default)]
struct PlainNode {
    id: i64,
    keys: Vec<u32>,
    vals: Vec<u32>,
    lat: i64,
    lon: i64,
}

impl PlainNode {
    fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        let mut node = Self::default();
        let (mut id, mut lat, mut lon) = (None, None, None);
        for field in MessageReader::new(buf) {
            let field = field?;
            match field.number {
                1 => id = Some(field.sint64()?),
                2 => field.packed_uint32(&mut node.keys)?,
                3 => field.packed_uint32(&mut node.vals)?,
                8 => lat = Some(field.sint64()?),
                9 => lon = Some(field.sint64()?),
                // info
                _ => {}
            }
        }
        node.id = id.ok_or(FormatError::MissingField("Node.id"))?;
        node.lat = lat.ok_or(FormatError::MissingField("Node.lat"))?;
        node.lon = lon.ok_or(FormatError::MissingField("Node.lon"))?;
        if node.keys.len() != node.vals.len() {
            return Err(FormatError::TagLengthMismatch(node.id));
        }
        Ok(node)
    }
}

#[derive(Debug, Clone, Default)]
struct DenseNodes {
    ids: Vec<i64>,
    lats: Vec<i64>,
    lons: Vec<i64>,
    keys_vals: Vec<i32>,
}

impl DenseNodes {
    // Repeated DenseNodes messages in one group merge by concatenation.
    fn merge_from(&mut self, buf: &[u8]) -> Result<(), FormatError> {
        for field in MessageReader::new(buf) {
            let field = field?;
            match field.number {
                1 => field.packed_sint64(&mut self.ids)?,
                8 => field.packed_sint64(&mut self.lats)?,
                9 => field.packed_sint64(&mut self.lons)?,
                10 => field.packed_int32(&mut self.keys_vals)?,
                // denseinfo
                _ => {}
            }
        }
        Ok(())
    }

    fn check_lengths(&self) -> Result<(), FormatError> {
        let (ids, lats, lons) = (self.ids.len(), self.lats.len(), self.lons.len());
        if ids != lats || ids != lons {
            return Err(FormatError::LengthMismatch { ids, lats, lons });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct PrimitiveGroup {
    nodes: Vec<PlainNode>,
    dense: Option<DenseNodes>,
    ways: usize,
    relations: usize,
}

impl PrimitiveGroup {
    fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        let mut group = Self::default();
        for field in MessageReader::new(buf) {
            let field = field?;
            match field.number {
                1 => group.nodes.push(PlainNode::parse(field.bytes()?)?),
                2 => group
                    .dense
                    .get_or_insert_with(DenseNodes::default)
                    .merge_from(field.bytes()?)?,
                3 => {
                    field.bytes()?;
                    group.ways += 1;
                }
                4 => {
                    field.bytes()?;
                    group.relations += 1;
                }
                // changesets
                _ => {}
            }
        }
        if let Some(dense) = &group.dense {
            dense.check_lengths()?;
        }
        Ok(group)
    }

    fn elements<'a>(
        &'a self,
        block: &'a PrimitiveBlock,
    ) -> impl Iterator<Item = Result<Element<'a>, FormatError>> + 'a {
        let plain = self
            .nodes
            .iter()
            .map(move |node| block.plain_node(node).map(Element::Node));
        let dense = self
            .dense
            .iter()
            .flat_map(move |dense| DenseNodeIter::new(block, dense))
            .map(|node| node.map(Element::DenseNode));
        let ways = std::iter::repeat_with(|| Ok(Element::Way)).take(self.ways);
        let relations = std::iter::repeat_with(|| Ok(Element::Relation)).take(self.relations);
        plain.chain(dense).chain(ways).chain(relations)
    }
}

#[derive(Debug, Clone)]
pub struct PrimitiveBlock {
    strings: Vec<String>,
    groups: Vec<PrimitiveGroup>,
    granularity: i32,
    lat_offset: i64,
    lon_offset: i64,
}

impl PrimitiveBlock {
    pub fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        let mut strings = Vec::new();
        let mut groups = Vec::new();
        let mut granularity = DEFAULT_GRANULARITY;
        let mut lat_offset = 0;
        let mut lon_offset = 0;

        for field in MessageReader::new(buf) {
            let field = field?;
            match field.number {
                1 => parse_string_table(field.bytes()?, &mut strings)?,
                2 => groups.push(PrimitiveGroup::parse(field.bytes()?)?),
                17 => granularity = field.int32()?,
                19 => lat_offset = field.int64()?,
                20 => lon_offset = field.int64()?,
                // date_granularity
                _ => {}
            }
        }

        Ok(Self {
            strings,
            groups,
            granularity,
            lat_offset,
            lon_offset,
        })
    }

    /// Every primitive in the block, group by group. Plain nodes come before
    /// dense nodes within a group, then ways, then relations.
    pub fn elements(&self) -> impl Iterator<Item = Result<Element<'_>, FormatError>> + '_ {
        self.groups.iter().flat_map(move |group| group.elements(self))
    }

    pub fn string(&self, index: i64) -> Result<&str, FormatError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map(String::as_str)
            .ok_or(FormatError::IndexOutOfRange {
                index,
                len: self.strings.len(),
            })
    }

    pub fn lat_degrees(&self, raw: i64) -> f64 {
        to_degrees(self.lat_offset, self.granularity, raw)
    }

    pub fn lon_degrees(&self, raw: i64) -> f64 {
        to_degrees(self.lon_offset, self.granularity, raw)
    }

    fn plain_node(&self, node: &PlainNode) -> Result<Node<'_>, FormatError> {
        let tags = node
            .keys
            .iter()
            .zip(&node.vals)
            .map(|(&k, &v)| Ok((self.string(i64::from(k))?, self.string(i64::from(v))?)))
            .collect::<Result<Vec<_>, FormatError>>()?;
        Ok(Node {
            id: node.id,
            lat: self.lat_degrees(node.lat),
            lon: self.lon_degrees(node.lon),
            tags,
        })
    }
}

fn to_degrees(offset: i64, granularity: i32, raw: i64) -> f64 {
    offset as f64 / 1e9 + (raw as f64 * f64::from(granularity)) / 1e9
}

fn parse_string_table(buf: &[u8], strings: &mut Vec<String>) -> Result<(), FormatError> {
    for field in MessageReader::new(buf) {
        let field = field?;
        if field.number == 1 {
            let index = strings.len();
            let s = std::str::from_utf8(field.bytes()?)
                .map_err(|_| FormatError::InvalidUtf8(index))?;
            strings.push(s.to_string());
        }
    }
    Ok(())
}

/// Walks a dense group, carrying the running id/lat/lon totals and the
/// position in the shared tag stream from one entry to the next.
struct DenseNodeIter<'a> {
    block: &'a PrimitiveBlock,
    dense: &'a DenseNodes,
    index: usize,
    kv_pos: usize,
    id: i64,
    lat: i64,
    lon: i64,
    failed: bool,
}

impl<'a> DenseNodeIter<'a> {
    fn new(block: &'a PrimitiveBlock, dense: &'a DenseNodes) -> Self {
        Self {
            block,
            dense,
            index: 0,
            kv_pos: 0,
            id: 0,
            lat: 0,
            lon: 0,
            failed: false,
        }
    }

    fn decode(&mut self, entry: usize) -> Result<Node<'a>, FormatError> {
        let (block, dense) = (self.block, self.dense);
        let overflow = |field| FormatError::DeltaOverflow { field, entry };
        self.id = self
            .id
            .checked_add(dense.ids[entry])
            .ok_or_else(|| overflow("id"))?;
        self.lat = self
            .lat
            .checked_add(dense.lats[entry])
            .ok_or_else(|| overflow("lat"))?;
        self.lon = self
            .lon
            .checked_add(dense.lons[entry])
            .ok_or_else(|| overflow("lon"))?;

        let tags = self.next_tags(entry)?;
        let kv_len = dense.keys_vals.len();
        if entry + 1 == dense.ids.len() && kv_len != 0 && self.kv_pos != kv_len {
            return Err(FormatError::TrailingTags {
                entries: dense.ids.len(),
                extra: kv_len - self.kv_pos,
            });
        }

        Ok(Node {
            id: self.id,
            lat: block.lat_degrees(self.lat),
            lon: block.lon_degrees(self.lon),
            tags,
        })
    }

    fn next_tags(&mut self, entry: usize) -> Result<Vec<(&'a str, &'a str)>, FormatError> {
        let (block, kv) = (self.block, &self.dense.keys_vals);
        let mut tags = Vec::new();
        // An empty stream means no node in the group has tags.
        if kv.is_empty() {
            return Ok(tags);
        }
        loop {
            let &key = kv
                .get(self.kv_pos)
                .ok_or(FormatError::UnterminatedTags(entry))?;
            self.kv_pos += 1;
            if key == 0 {
                return Ok(tags);
            }
            let &val = kv
                .get(self.kv_pos)
                .ok_or(FormatError::UnterminatedTags(entry))?;
            self.kv_pos += 1;
            tags.push((block.string(i64::from(key))?, block.string(i64::from(val))?));
        }
    }
}

impl<'a> Iterator for DenseNodeIter<'a> {
    type Item = Result<Node<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.dense.ids.len() {
            return None;
        }
        let entry = self.index;
        self.index += 1;
        let node = self.decode(entry);
        if node.is_err() {
            self.failed = true;
        }
        Some(node)
    }
}
