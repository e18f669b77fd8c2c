//! byte-level helpers for CAF chunks

/// bounds-checked big-endian slice reader
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pub pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], String> {
        if self.pos + count > self.data.len() {
            return Err("unexpected end of file".to_string());
        }
        let bytes = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    pub fn skip(&mut self, count: usize) -> Result<(), String> {
        if self.pos + count > self.data.len() {
            return Err("unexpected end of file".to_string());
        }
        self.pos += count;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, String> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, String> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, String> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32_be(&mut self) -> Result<i32, String> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i64_be(&mut self) -> Result<i64, String> {
        let b = self.read_bytes(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_f64_be(&mut self) -> Result<f64, String> {
        let b = self.read_bytes(8)?;
        Ok(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// variable-length integer: 7 bits per byte, high bit marks continuation
    pub fn read_vlq(&mut self) -> Result<u64, String> {
        let mut value: u64 = 0;
        loop {
            let byte = self.read_u8()?;
            value = value
                .checked_shl(7)
                .ok_or_else(|| "variable-length integer overflow".to_string())?
                | (byte & 0x7f) as u64;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
    }
}

/// encode a variable-length integer, most significant group first
pub(crate) fn write_vlq(buffer: &mut Vec<u8>, mut value: u64) {
    let mut groups = [0u8; 10];
    let mut count = 0;
    loop {
        groups[count] = (value & 0x7f) as u8;
        count += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        buffer.push(groups[i] | continuation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlq_round_trip() {
        for value in [0u64, 1, 127, 128, 300, 16383, 16384, 1 << 40] {
            let mut buf = Vec::new();
            write_vlq(&mut buf, value);
            let mut cursor = Cursor::new(&buf);
            assert_eq!(cursor.read_vlq().unwrap(), value);
            assert_eq!(cursor.remaining(), 0);
        }
    }

    #[test]
    fn vlq_single_byte_values() {
        let mut buf = Vec::new();
        write_vlq(&mut buf, 100);
        assert_eq!(buf, vec![100]);
    }
}
