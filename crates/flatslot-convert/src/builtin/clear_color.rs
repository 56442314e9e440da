//! `ClearColorInt`: an integer RGBA clear color.

use serde::Deserialize;

use flatslot_codec::{Builder, FlatTable, Offset, Table, Verifier, Verify};

use crate::{ConvertContext, Error, Result};

pub const TYPE_NAME: &str = "ClearColorInt";

const SLOT_RED: u16 = 0;
const SLOT_GREEN: u16 = 1;
const SLOT_BLUE: u16 = 2;
const SLOT_ALPHA: u16 = 3;

/// Converter input. Missing channels default to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClearColorIntDesc {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub alpha: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct ClearColorInt<'a> {
    table: Table<'a>,
}

impl<'a> FlatTable<'a> for ClearColorInt<'a> {
    fn from_table(table: Table<'a>) -> Self {
        Self { table }
    }

    fn table(&self) -> Table<'a> {
        self.table
    }
}

impl ClearColorInt<'_> {
    pub fn red(&self) -> flatslot_codec::Result<i32> {
        self.table.get(SLOT_RED, 0)
    }

    pub fn green(&self) -> flatslot_codec::Result<i32> {
        self.table.get(SLOT_GREEN, 0)
    }

    pub fn blue(&self) -> flatslot_codec::Result<i32> {
        self.table.get(SLOT_BLUE, 0)
    }

    pub fn alpha(&self) -> flatslot_codec::Result<i32> {
        self.table.get(SLOT_ALPHA, 0)
    }

    /// All four channels.
    pub fn to_desc(&self) -> flatslot_codec::Result<ClearColorIntDesc> {
        Ok(ClearColorIntDesc {
            red: self.red()?,
            green: self.green()?,
            blue: self.blue()?,
            alpha: self.alpha()?,
        })
    }
}

impl Verify for ClearColorInt<'_> {
    fn run_verifier(v: &mut Verifier<'_>, pos: usize) -> flatslot_codec::Result<()> {
        let table = v.verify_table_start(pos)?;
        for slot in [SLOT_RED, SLOT_GREEN, SLOT_BLUE, SLOT_ALPHA] {
            v.verify_field::<i32>(&table, slot)?;
        }
        v.end_table();
        Ok(())
    }
}

/// Write a `ClearColorInt` table. Zero channels are left absent.
pub fn create_clear_color_int(
    builder: &mut Builder,
    color: &ClearColorIntDesc,
) -> Offset<ClearColorInt<'static>> {
    builder.start_table();
    builder.push_slot(SLOT_RED, color.red, 0);
    builder.push_slot(SLOT_GREEN, color.green, 0);
    builder.push_slot(SLOT_BLUE, color.blue, 0);
    builder.push_slot(SLOT_ALPHA, color.alpha, 0);
    builder.end_table().cast()
}

/// Registry converter: JSON object with `red`/`green`/`blue`/`alpha` keys.
pub fn convert(ctx: &ConvertContext, input: &serde_json::Value) -> Result<Vec<u8>> {
    let color = ClearColorIntDesc::deserialize(input)
        .map_err(|err| Error::invalid_input(TYPE_NAME, err))?;

    let mut builder = Builder::with_options(*ctx.builder_options());
    let root = create_clear_color_int(&mut builder, &color);
    builder.finish(root);
    Ok(builder.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatslot_codec::{root_as, verify_root_as, VerifierOptions};
    use serde_json::json;

    #[test]
    fn test_rgba_example() {
        let ctx = ConvertContext::new();
        let buf = convert(&ctx, &json!({"red": 255, "alpha": 255})).unwrap();

        let color: ClearColorInt = verify_root_as(&buf, VerifierOptions::default()).unwrap();
        assert_eq!(
            color.to_desc().unwrap(),
            ClearColorIntDesc {
                red: 255,
                green: 0,
                blue: 0,
                alpha: 255
            }
        );

        let vtable = color.table().vtable().unwrap();
        assert_eq!(
            vtable.present_slots().map(|(slot, _)| slot).collect::<Vec<_>>(),
            vec![SLOT_RED, SLOT_ALPHA]
        );
    }

    #[test]
    fn test_explicit_zero_matches_omitted() {
        let ctx = ConvertContext::new();
        let explicit = convert(&ctx, &json!({"red": 1, "green": 0, "blue": 0, "alpha": 0})).unwrap();
        let omitted = convert(&ctx, &json!({"red": 1})).unwrap();
        assert_eq!(explicit, omitted);
    }

    #[test]
    fn test_empty_color_reads_as_zeroes() {
        let ctx = ConvertContext::new();
        let buf = convert(&ctx, &json!({})).unwrap();
        let color: ClearColorInt = root_as(&buf).unwrap();
        assert_eq!(color.to_desc().unwrap(), ClearColorIntDesc::default());
    }

    #[test]
    fn test_invalid_input() {
        let ctx = ConvertContext::new();
        for input in [json!({"red": "bright"}), json!({"purple": 3}), json!("red")] {
            assert!(matches!(
                convert(&ctx, &input),
                Err(Error::InvalidInput { ref type_name, .. }) if type_name == TYPE_NAME
            ));
        }
    }
}
