//! The `ObjectData` envelope: a type name plus the converted bytes.
//!
//! ```text
//! table ObjectData {
//!     type: string;   // slot 0
//!     data: [ubyte];  // slot 1
//! }
//! ```

use flatslot_codec::{
    root_table, Builder, FlatTable, Offset, Table, Verifier, Verify, VerifierOptions,
};

use crate::Result;

/// Slot of the type name.
pub const SLOT_TYPE: u16 = 0;
/// Slot of the converted payload.
pub const SLOT_DATA: u16 = 1;

/// Accessor over an `ObjectData` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectData<'a> {
    table: Table<'a>,
}

impl<'a> FlatTable<'a> for ObjectData<'a> {
    fn from_table(table: Table<'a>) -> Self {
        Self { table }
    }

    fn table(&self) -> Table<'a> {
        self.table
    }
}

impl<'a> ObjectData<'a> {
    /// Name of the converter that produced the payload.
    pub fn type_name(&self) -> Result<Option<&'a str>> {
        Ok(self.table.get_str(SLOT_TYPE)?)
    }

    /// The payload bytes.
    pub fn data(&self) -> Result<Option<&'a [u8]>> {
        Ok(self.table.get_bytes(SLOT_DATA)?)
    }

    /// Read the payload as a buffer of its own and return its root table.
    ///
    /// The payload is verified schema-less first, since it is an opaque
    /// byte vector as far as the envelope is concerned.
    pub fn nested_root(&self) -> Result<Option<Table<'a>>> {
        let Some(data) = self.data()? else {
            return Ok(None);
        };
        Verifier::new(data, VerifierOptions::default()).verify_buffer::<Table>(None)?;
        Ok(Some(root_table(data)?))
    }
}

impl Verify for ObjectData<'_> {
    fn run_verifier(v: &mut Verifier<'_>, pos: usize) -> flatslot_codec::Result<()> {
        let table = v.verify_table_start(pos)?;
        v.verify_required(&table, SLOT_TYPE)?;
        v.verify_string_field(&table, SLOT_TYPE)?;
        v.verify_vector_field::<u8>(&table, SLOT_DATA)?;
        v.end_table();
        Ok(())
    }
}

/// Write an `ObjectData` table wrapping `data`.
pub fn create_object_data(
    builder: &mut Builder,
    type_name: &str,
    data: &[u8],
) -> Offset<ObjectData<'static>> {
    let type_name = builder.create_shared_string(type_name);
    let data = builder.create_byte_vector(data);

    builder.start_table();
    builder.push_offset_slot(SLOT_TYPE, type_name);
    builder.push_offset_slot(SLOT_DATA, data);
    let object = builder.end_table();
    builder.required(object, SLOT_TYPE);
    object.cast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatslot_codec::{verify_root_as, Error as CodecError};

    #[test]
    fn test_envelope_round_trip() {
        let mut payload = Builder::new();
        payload.start_table();
        payload.push_slot::<i32>(0, 7, 0);
        let root = payload.end_table();
        payload.finish(root);

        let mut builder = Builder::new();
        let object = create_object_data(&mut builder, "Thing", payload.finished_data());
        builder.finish(object);
        let buf = builder.finished_data();

        let object: ObjectData = verify_root_as(buf, VerifierOptions::default()).unwrap();
        assert_eq!(object.type_name().unwrap(), Some("Thing"));
        assert_eq!(object.data().unwrap(), Some(payload.finished_data()));

        let nested = object.nested_root().unwrap().unwrap();
        assert_eq!(nested.get::<i32>(0, 0).unwrap(), 7);
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let mut builder = Builder::new();
        let data = builder.create_byte_vector(&[1, 2, 3]);
        builder.start_table();
        builder.push_offset_slot(SLOT_DATA, data);
        let root = builder.end_table();
        builder.finish(root);

        let err = verify_root_as::<ObjectData>(builder.finished_data(), VerifierOptions::default())
            .unwrap_err();
        assert_eq!(err, CodecError::MissingRequiredField { slot: SLOT_TYPE });
    }

    #[test]
    fn test_garbage_payload_is_malformed() {
        let mut builder = Builder::new();
        let object = create_object_data(&mut builder, "Thing", &[0xFF, 0xFF, 0xFF, 0x7F]);
        builder.finish(object);

        let object: ObjectData =
            verify_root_as(builder.finished_data(), VerifierOptions::default()).unwrap();
        assert!(matches!(
            object.nested_root(),
            Err(crate::Error::Codec(err)) if err.is_malformed()
        ));
    }
}
