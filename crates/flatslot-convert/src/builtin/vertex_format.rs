//! `VertexFormat`: a list of vertex attributes plus an instancing flag.
//!
//! Attributes are stored as inline structs:
//!
//! ```text
//! struct VertexAttribute { attrib: uint; format: ubyte; decoration: ubyte; }  // 8 bytes, align 4
//! table VertexFormat { attributes: [VertexAttribute]; instanced: bool; }
//! ```

use serde::Deserialize;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use flatslot_codec::{flat_struct, Builder, FlatTable, Offset, Table, Vector, Verifier, Verify};

use crate::{ConvertContext, Error, Result};

pub const TYPE_NAME: &str = "VertexFormat";

const SLOT_ATTRIBUTES: u16 = 0;
const SLOT_INSTANCED: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct VertexAttribute {
    pub attrib: U32,
    pub format: u8,
    pub decoration: u8,
    _padding: [u8; 2],
}

flat_struct!(VertexAttribute, align = 4);

impl VertexAttribute {
    pub fn new(attrib: u32, format: u8, decoration: u8) -> Self {
        Self {
            attrib: U32::new(attrib),
            format,
            decoration,
            _padding: [0; 2],
        }
    }
}

/// One attribute of the converter input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VertexAttributeDesc {
    pub attrib: u32,
    pub format: u8,
    #[serde(default)]
    pub decoration: u8,
}

/// Converter input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VertexFormatDesc {
    pub attributes: Vec<VertexAttributeDesc>,
    pub instanced: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct VertexFormat<'a> {
    table: Table<'a>,
}

impl<'a> FlatTable<'a> for VertexFormat<'a> {
    fn from_table(table: Table<'a>) -> Self {
        Self { table }
    }

    fn table(&self) -> Table<'a> {
        self.table
    }
}

impl<'a> VertexFormat<'a> {
    pub fn attributes(&self) -> flatslot_codec::Result<Option<Vector<'a, VertexAttribute>>> {
        self.table.get_vector(SLOT_ATTRIBUTES)
    }

    pub fn attributes_len(&self) -> flatslot_codec::Result<usize> {
        self.table.vector_len::<VertexAttribute>(SLOT_ATTRIBUTES)
    }

    pub fn attribute(&self, index: usize) -> flatslot_codec::Result<VertexAttribute> {
        self.table.vector_element::<VertexAttribute>(SLOT_ATTRIBUTES, index)
    }

    pub fn instanced(&self) -> flatslot_codec::Result<bool> {
        self.table.get(SLOT_INSTANCED, false)
    }
}

impl Verify for VertexFormat<'_> {
    fn run_verifier(v: &mut Verifier<'_>, pos: usize) -> flatslot_codec::Result<()> {
        let table = v.verify_table_start(pos)?;
        v.verify_vector_field::<VertexAttribute>(&table, SLOT_ATTRIBUTES)?;
        v.verify_field::<bool>(&table, SLOT_INSTANCED)?;
        v.end_table();
        Ok(())
    }
}

/// Write a `VertexFormat` table. An empty attribute list is left absent.
pub fn create_vertex_format(
    builder: &mut Builder,
    format: &VertexFormatDesc,
) -> Offset<VertexFormat<'static>> {
    let attributes: Vec<VertexAttribute> = format
        .attributes
        .iter()
        .map(|a| VertexAttribute::new(a.attrib, a.format, a.decoration))
        .collect();
    let attributes =
        (!attributes.is_empty()).then(|| builder.create_vector_of_structs(&attributes));

    builder.start_table();
    if let Some(attributes) = attributes {
        builder.push_offset_slot(SLOT_ATTRIBUTES, attributes);
    }
    builder.push_slot(SLOT_INSTANCED, format.instanced, false);
    builder.end_table().cast()
}

/// Registry converter: `{"attributes": [{"attrib", "format", "decoration"}], "instanced"}`.
pub fn convert(ctx: &ConvertContext, input: &serde_json::Value) -> Result<Vec<u8>> {
    let format = VertexFormatDesc::deserialize(input)
        .map_err(|err| Error::invalid_input(TYPE_NAME, err))?;

    let mut builder = Builder::with_options(*ctx.builder_options());
    let root = create_vertex_format(&mut builder, &format);
    builder.finish(root);
    Ok(builder.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatslot_codec::{verify_root_as, Error as CodecError, VerifierOptions};
    use serde_json::json;

    #[test]
    fn test_convert_and_read_back() {
        let ctx = ConvertContext::new();
        let input = json!({
            "attributes": [
                {"attrib": 0, "format": 37},
                {"attrib": 3, "format": 12, "decoration": 2},
            ],
            "instanced": true,
        });
        let buf = convert(&ctx, &input).unwrap();

        let format: VertexFormat = verify_root_as(&buf, VerifierOptions::default()).unwrap();
        assert!(format.instanced().unwrap());
        assert_eq!(format.attributes_len().unwrap(), 2);
        assert_eq!(format.attribute(1).unwrap(), VertexAttribute::new(3, 12, 2));

        let attributes = format.attributes().unwrap().unwrap().to_vec().unwrap();
        assert_eq!(attributes[0].attrib.get(), 0);
        assert_eq!(attributes[0].format, 37);
        assert_eq!(attributes[0].decoration, 0);
    }

    #[test]
    fn test_struct_vector_is_aligned() {
        let ctx = ConvertContext::new();
        let buf = convert(&ctx, &json!({"attributes": [{"attrib": 1, "format": 1}]})).unwrap();
        let format: VertexFormat = verify_root_as(&buf, VerifierOptions::default()).unwrap();
        let attributes = format.attributes().unwrap().unwrap();
        assert_eq!((attributes.loc() + 4) % 4, 0);
        assert!(!format.instanced().unwrap());
    }

    #[test]
    fn test_empty_format() {
        let ctx = ConvertContext::new();
        let buf = convert(&ctx, &json!({})).unwrap();
        let format: VertexFormat = verify_root_as(&buf, VerifierOptions::default()).unwrap();
        assert!(format.attributes().unwrap().is_none());
        assert_eq!(format.attributes_len().unwrap(), 0);
        assert_eq!(
            format.attribute(0),
            Err(CodecError::IndexOutOfRange { index: 0, len: 0 })
        );
    }

    #[test]
    fn test_attribute_requires_format() {
        let ctx = ConvertContext::new();
        let result = convert(&ctx, &json!({"attributes": [{"attrib": 1}]}));
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
    }
}
