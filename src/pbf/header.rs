use super::error::FormatError;
use super::wire::MessageReader;

pub const OSM_SCHEMA: &str = "OsmSchema-V0.6";
pub const DENSE_NODES: &str = "DenseNodes";

/// Required features this decoder understands.
pub const SUPPORTED_FEATURES: &[&str] = &[OSM_SCHEMA, DENSE_NODES];

/// Bounding box declared by the file, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderBBox {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl HeaderBBox {
    fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        let mut edges = [None; 4];
        for field in MessageReader::new(buf) {
            let field = field?;
            if let Some(slot) = (field.number as usize)
                .checked_sub(1)
                .and_then(|i| edges.get_mut(i))
            {
                *slot = Some(field.sint64()? as f64 * 1e-9);
            }
        }
        let [left, right, top, bottom] = edges;
        Ok(Self {
            left: left.ok_or(FormatError::MissingField("HeaderBBox.left"))?,
            right: right.ok_or(FormatError::MissingField("HeaderBBox.right"))?,
            top: top.ok_or(FormatError::MissingField("HeaderBBox.top"))?,
            bottom: bottom.ok_or(FormatError::MissingField("HeaderBBox.bottom"))?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeaderBlock {
    bbox: Option<HeaderBBox>,
    required_features: Vec<String>,
    optional_features: Vec<String>,
    writing_program: Option<String>,
    source: Option<String>,
    replication_timestamp: Option<i64>,
}

impl HeaderBlock {
    pub fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        let mut header = Self::default();
        for field in MessageReader::new(buf) {
            let field = field?;
            match field.number {
                1 => header.bbox = Some(HeaderBBox::parse(field.bytes()?)?),
                4 => header.required_features.push(field.string()?.to_string()),
                5 => header.optional_features.push(field.string()?.to_string()),
                16 => header.writing_program = Some(field.string()?.to_string()),
                17 => header.source = Some(field.string()?.to_string()),
                32 => header.replication_timestamp = Some(field.int64()?),
                _ => {}
            }
        }
        Ok(header)
    }

    pub fn bbox(&self) -> Option<HeaderBBox> {
        self.bbox
    }

    pub fn required_features(&self) -> &[String] {
        &self.required_features
    }

    pub fn optional_features(&self) -> &[String] {
        &self.optional_features
    }

    pub fn writing_program(&self) -> Option<&str> {
        self.writing_program.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn replication_timestamp(&self) -> Option<i64> {
        self.replication_timestamp
    }

    /// Fails on the first required feature this decoder cannot honour.
    pub fn validate(&self) -> Result<(), FormatError> {
        match self
            .required_features
            .iter()
            .find(|feature| !SUPPORTED_FEATURES.contains(&feature.as_str()))
        {
            Some(feature) => Err(FormatError::UnsupportedFeature(feature.clone())),
            None => Ok(()),
        }
    }
}
