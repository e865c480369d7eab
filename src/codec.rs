//! Compact binary codec for action parameters.
//!
//! Integers are little-endian and fixed width, lengths and counts are unsigned
//! LEB128 varints, options carry a one-byte presence flag. Decoding of nested
//! containers is bounded by a depth budget so hostile payloads cannot recurse
//! without limit.

use crate::error::BalError;
use crate::keys::Id;
use crate::name::Name;
use primitive_types::U256;

const MAX_UVARINT_BYTES: usize = 10;

pub struct BinaryReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], BalError> {
        if len > self.remaining() {
            return Err(BalError::Decode(format!(
                "need {len} bytes at offset {}, {} remain",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BalError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_uvarint(&mut self) -> Result<u64, BalError> {
        let mut value: u64 = 0;
        for i in 0..MAX_UVARINT_BYTES {
            let [byte] = self.read_array::<1>()?;
            let chunk = u64::from(byte & 0x7F);
            let shift = 7 * i as u32;
            if shift == 63 && chunk > 1 {
                return Err(BalError::Decode("uvarint overflows 64 bits".into()));
            }
            value |= chunk << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(BalError::Decode("uvarint longer than 10 bytes".into()))
    }

    /// Reads an element count and rejects counts the remaining input cannot hold.
    pub fn read_len(&mut self) -> Result<usize, BalError> {
        let len = self.read_uvarint()?;
        let len = usize::try_from(len)
            .map_err(|_| BalError::Decode(format!("length {len} does not fit usize")))?;
        if len > self.remaining() {
            return Err(BalError::Decode(format!(
                "length {len} exceeds the {} remaining bytes",
                self.remaining()
            )));
        }
        Ok(len)
    }
}

pub fn write_uvarint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub trait BinaryEncode {
    fn encode(&self, out: &mut Vec<u8>);
}

pub trait BinaryDecode: Sized {
    /// `depth` is the nesting budget left; containers fail once it is spent.
    fn decode(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Self, BalError>;
}

fn enter(depth: usize) -> Result<usize, BalError> {
    depth
        .checked_sub(1)
        .ok_or_else(|| BalError::ResourceExceeded("maximum decode depth reached".into()))
}

pub fn to_bytes<T: BinaryEncode + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    value.encode(&mut out);
    out
}

/// Decodes one value that must span all of `bytes`.
pub fn from_bytes<T: BinaryDecode>(bytes: &[u8], depth: usize) -> Result<T, BalError> {
    let mut reader = BinaryReader::new(bytes);
    let value = T::decode(&mut reader, depth)?;
    if reader.remaining() != 0 {
        return Err(BalError::Decode(format!(
            "{} trailing bytes after value",
            reader.remaining()
        )));
    }
    Ok(value)
}

macro_rules! fixed_width_int {
    ($($t:ty),*) => {
        $(
            impl BinaryEncode for $t {
                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }

            impl BinaryDecode for $t {
                fn decode(reader: &mut BinaryReader<'_>, _depth: usize) -> Result<Self, BalError> {
                    Ok(<$t>::from_le_bytes(reader.read_array()?))
                }
            }
        )*
    };
}

fixed_width_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl BinaryEncode for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl BinaryDecode for bool {
    fn decode(reader: &mut BinaryReader<'_>, _depth: usize) -> Result<Self, BalError> {
        match reader.read_array::<1>()? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(BalError::Decode(format!("invalid bool byte {other:#04x}"))),
        }
    }
}

impl BinaryEncode for U256 {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut bytes = [0u8; 32];
        self.to_little_endian(&mut bytes);
        out.extend_from_slice(&bytes);
    }
}

impl BinaryDecode for U256 {
    fn decode(reader: &mut BinaryReader<'_>, _depth: usize) -> Result<Self, BalError> {
        Ok(U256::from_little_endian(reader.read_bytes(32)?))
    }
}

impl BinaryEncode for Name {
    fn encode(&self, out: &mut Vec<u8>) {
        self.value().encode(out);
    }
}

impl BinaryDecode for Name {
    fn decode(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Self, BalError> {
        u64::decode(reader, depth).map(Name::from_raw)
    }
}

impl<T> BinaryEncode for Id<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        self.value.encode(out);
    }
}

impl<T> BinaryDecode for Id<T> {
    fn decode(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Self, BalError> {
        u64::decode(reader, depth).map(Id::new)
    }
}

impl BinaryEncode for str {
    fn encode(&self, out: &mut Vec<u8>) {
        write_uvarint(out, self.len() as u64);
        out.extend_from_slice(self.as_bytes());
    }
}

impl BinaryEncode for String {
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_str().encode(out);
    }
}

impl BinaryDecode for String {
    fn decode(reader: &mut BinaryReader<'_>, _depth: usize) -> Result<Self, BalError> {
        let len = reader.read_len()?;
        let bytes = reader.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| BalError::Decode(format!("string is not utf-8: {e}")))
    }
}

impl<T: BinaryEncode> BinaryEncode for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        write_uvarint(out, self.len() as u64);
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: BinaryDecode> BinaryDecode for Vec<T> {
    fn decode(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Self, BalError> {
        let depth = enter(depth)?;
        let len = reader.read_len()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(reader, depth)?);
        }
        Ok(items)
    }
}

impl<T: BinaryEncode> BinaryEncode for Option<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Some(value) => {
                out.push(1);
                value.encode(out);
            }
            None => out.push(0),
        }
    }
}

impl<T: BinaryDecode> BinaryDecode for Option<T> {
    /// The presence flag spends no depth; only the wrapped value can.
    fn decode(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Self, BalError> {
        if bool::decode(reader, depth)? {
            T::decode(reader, depth).map(Some)
        } else {
            Ok(None)
        }
    }
}
