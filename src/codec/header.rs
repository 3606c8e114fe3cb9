//! Binary header framing.
//!
//! SAM text parsing/formatting belongs to the external text codec; this
//! module only moves the already-formatted text string and the
//! reference dictionary across the wire, treating the text payload as
//! an opaque blob framed by a fixed-layout header.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::header::{Header, Reference};

const MAGIC: [u8; 4] = *b"BAM\x01";

/// Writes the magic, header text, and reference dictionary. `text` is the
/// externally-formatted SAM header text; this crate never inspects it.
pub fn write_header<W: Write>(w: &mut W, text: &str, header: &Header) -> Result<()> {
    w.write_all(&MAGIC)?;
    w.write_u32::<LittleEndian>(text.len() as u32)?;
    w.write_all(text.as_bytes())?;
    w.write_i32::<LittleEndian>(header.refs().len() as i32)?;
    for r in header.refs() {
        w.write_u32::<LittleEndian>(r.name.len() as u32 + 1)?;
        w.write_all(r.name.as_bytes())?;
        w.write_all(&[0])?;
        w.write_u32::<LittleEndian>(r.length)?;
    }
    Ok(())
}

/// Reads the magic, header text, and reference dictionary, building a
/// fresh [`Header`] with every reference added in wire order.
pub fn read_header<R: Read>(r: &mut R) -> Result<(String, Header)> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|_| Error::Truncated("header magic"))?;
    if magic != MAGIC {
        return Err(Error::BadMagic);
    }
    let l_text = r
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::Truncated("header text length"))?;
    let mut text_bytes = vec![0u8; l_text as usize];
    r.read_exact(&mut text_bytes)
        .map_err(|_| Error::Truncated("header text"))?;
    let text = String::from_utf8(text_bytes).map_err(|_| Error::Malformed("header text not utf8"))?;

    let n_ref = r
        .read_i32::<LittleEndian>()
        .map_err(|_| Error::Truncated("n_ref"))?;
    if n_ref < 0 {
        return Err(Error::OutOfRange("n_ref"));
    }

    let mut header = Header::new();
    for _ in 0..n_ref {
        let name_len = r
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("reference name length"))?;
        if name_len == 0 {
            return Err(Error::Malformed("reference name length is zero"));
        }
        let mut name_bytes = vec![0u8; name_len as usize];
        r.read_exact(&mut name_bytes)
            .map_err(|_| Error::Truncated("reference name"))?;
        if name_bytes.pop() != Some(0) {
            return Err(Error::Malformed("reference name not null-terminated"));
        }
        let name = String::from_utf8(name_bytes).map_err(|_| Error::Malformed("reference name not utf8"))?;
        let length = r
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("reference length"))?;
        header
            .add_reference(Reference::new(name, length))
            .map_err(|_| Error::Malformed("duplicate reference insertion"))?;
    }
    Ok((text, header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trips() {
        let mut header = Header::new();
        header.add_reference(Reference::new("chr1", 1000)).unwrap();
        header.add_reference(Reference::new("chr2", 2000)).unwrap();

        let mut buf = Vec::new();
        write_header(&mut buf, "@HD\tVN:1.6\n", &header).unwrap();

        let mut cur = Cursor::new(buf);
        let (text, decoded) = read_header(&mut cur).unwrap();
        assert_eq!(text, "@HD\tVN:1.6\n");
        assert_eq!(decoded.refs().len(), 2);
        assert_eq!(decoded.refs()[0].name, "chr1");
        assert_eq!(decoded.refs()[1].length, 2000);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut cur = Cursor::new(b"NOPE".to_vec());
        assert!(matches!(read_header(&mut cur), Err(Error::BadMagic)));
    }
}
