//! Formatters which can read and write memory images to disk.
//!
//! The [`ObjFileFormat`] trait describes an implementation of reading/writing object files into disk.
//! This module provides an implementation of the trait:
//! - [`BinaryFormat`]: A flat binary image (the format the loader accepts)
//! - [`TextFormat`]: A text listing of every cell (the diagnostic dump)

use std::fmt::Write;

use crate::ast::sim::SimInstr;

use super::ObjectFile;

/// The address flat images are loaded at.
pub const LOAD_ADDR: u16 = 0x3000;

/// A trait defining object file formats.
pub trait ObjFileFormat {
    /// Representation of the serialized format.
    ///
    /// For binary formats, `[u8]` should be used.
    /// For text-based formats,`str` should be used.
    type Stream: ToOwned + ?Sized;
    /// Serializes into the stream format.
    fn serialize(o: &ObjectFile) -> <Self::Stream as ToOwned>::Owned;
    /// Deserializes from the stream format, returning `None`
    /// if an error occurred during deserialization.
    fn deserialize(i: &Self::Stream) -> Option<ObjectFile>;
}

// BINARY!
/// A flat binary image.
///
/// The image is every word of the object file as big-endian bytes, with no header.
/// There is no origin in the image, so it is always loaded at [`LOAD_ADDR`].
/// Symbols are not kept.
///
/// ```
/// use lc3_forth::asm::ObjectFile;
/// use lc3_forth::asm::encoding::{BinaryFormat, ObjFileFormat};
///
/// let obj = ObjectFile::from_words(0x3000, vec![0x1021, 0xF025]);
/// let bytes = BinaryFormat::serialize(&obj);
/// assert_eq!(bytes, [0x10, 0x21, 0xF0, 0x25]);
/// assert_eq!(BinaryFormat::deserialize(&bytes), Some(obj));
/// ```
pub struct BinaryFormat;

impl ObjFileFormat for BinaryFormat {
    type Stream = [u8];

    fn serialize(o: &ObjectFile) -> <Self::Stream as ToOwned>::Owned {
        o.words()
            .iter()
            .flat_map(|w| w.to_be_bytes())
            .collect()
    }

    fn deserialize(bytes: &Self::Stream) -> Option<ObjectFile> {
        // An incomplete trailing word ends the image.
        let words = bytes.chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();

        Some(ObjectFile::from_words(LOAD_ADDR, words))
    }
}

// TEXT!
/// A text listing of object file data.
///
/// Each cell from the origin to the end is one row:
/// ```text
/// x3000 | 0E05 | 0000 1110 0000 0101 | BR    7  0  5 | BRnzp #5
/// ```
/// The columns are the address, the raw word, the word in nibbles,
/// the opcode's short name with the `x` (bits 11-9), `y` (bits 8-6) and `z` (bits 5-0) fields,
/// and the full decoded instruction.
/// Labels are listed on their own line before the cell they point to.
/// The listing ends with a size footer.
///
/// Only the address and raw word columns are read back by [`TextFormat::deserialize`].
pub struct TextFormat;

const TABLE_DIV: &str = " | ";
const OPCODE_NAMES: [&str; 16] = [
    "BR", "ADD", "LD", "ST", "JSR", "AND", "LDR", "STR",
    "xxx", "NOT", "LDI", "STI", "JMP", "xxx", "LEA", "TRP",
];

/// Formats a single cell of the listing.
///
/// ```
/// use lc3_forth::asm::encoding::list_cell;
///
/// assert_eq!(list_cell(0x3000, 0x1B61), "x3000 | 1B61 | 0001 1011 0110 0001 | ADD   5  5 21 | ADD R5, R5, #1");
/// assert_eq!(list_cell(0x3001, 0xD000), "x3001 | D000 | 1101 0000 0000 0000 | xxx   0  0  0 | ???");
/// ```
pub fn list_cell(addr: u16, word: u16) -> String {
    let (x, y, z) = ((word >> 9) & 0b111, (word >> 6) & 0b111, word & 0x3F);
    let nibbles = [12, 8, 4, 0].map(|s| format!("{:04b}", (word >> s) & 0xF)).join(" ");
    let name = OPCODE_NAMES[usize::from(word >> 12)];
    let decoded = match SimInstr::decode(word) {
        Ok(instr) => instr.to_string(),
        Err(_) => String::from("???"),
    };

    format!("x{addr:04X}{TABLE_DIV}{word:04X}{TABLE_DIV}{nibbles}{TABLE_DIV}{name:<4} {x:2X} {y:2X} {z:2X}{TABLE_DIV}{decoded}")
}

impl ObjFileFormat for TextFormat {
    type Stream = str;

    fn serialize(o: &ObjectFile) -> <Self::Stream as ToOwned>::Owned {
        fn _ser(o: &ObjectFile) -> Result<String, std::fmt::Error> {
            let mut buf = String::new();

            let sym = o.symbol_table();
            for (addr, word) in o.addr_iter() {
                for (label, _) in sym.label_iter().filter(|&(_, a)| a == addr) {
                    writeln!(buf, "{label}:")?;
                }
                writeln!(buf, "{}", list_cell(addr, word))?;
            }
            writeln!(buf)?;
            writeln!(buf, "SIZE: {} words", o.len())?;

            Ok(buf)
        }

        _ser(o).unwrap_or_else(|_| unreachable!("writing to a String should not fail"))
    }

    fn deserialize(string: &Self::Stream) -> Option<ObjectFile> {
        let mut origin = None;
        let mut words = vec![];

        let rows = string.lines()
            .map(str::trim)
            .filter(|l| l.contains(TABLE_DIV));

        for row in rows {
            let mut cols = row.split(TABLE_DIV);
            let addr = hex2u16(cols.next()?.strip_prefix('x')?)?;
            let word = hex2u16(cols.next()?.trim())?;

            let origin = *origin.get_or_insert(addr);
            // Rows have to be contiguous.
            if addr != origin.wrapping_add(words.len() as u16) { return None; }
            words.push(word);
        }

        Some(ObjectFile::from_words(origin.unwrap_or(LOAD_ADDR), words))
    }
}

fn hex2u16(s: &str) -> Option<u16> {
    match s.len() == 4 {
        true => u16::from_str_radix(s, 16).ok(),
        false => None
    }
}
