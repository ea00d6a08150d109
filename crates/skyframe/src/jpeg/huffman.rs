use crate::error::DecodeError;

const FAST_BITS: u32 = 9;

/// Canonical Huffman table (JPEG Annex C) with a 9-bit lookahead.
#[derive(Clone)]
pub struct HuffmanTable {
    /// `len << 8 | value` for codes of at most `FAST_BITS`, 0 for a miss.
    fast: [u16; 1 << FAST_BITS],
    maxcode: [i32; 17],
    mincode: [i32; 17],
    valptr: [usize; 17],
    values: Vec<u8>,
}

impl HuffmanTable {
    /// Build from the 16 code-length counts and the symbol list of a DHT segment.
    pub fn new(counts: &[u8; 16], values: &[u8]) -> Result<Self, DecodeError> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total > 256 || total != values.len() {
            return Err(DecodeError::Malformed("DHT"));
        }

        let mut table = HuffmanTable {
            fast: [0; 1 << FAST_BITS],
            maxcode: [-1; 17],
            mincode: [0; 17],
            valptr: [0; 17],
            values: values.to_vec(),
        };

        let mut code: u32 = 0;
        let mut k = 0usize;
        for len in 1..=16usize {
            let count = counts[len - 1] as usize;
            if count > 0 {
                table.valptr[len] = k;
                table.mincode[len] = code as i32;
                for _ in 0..count {
                    if code >= (1 << len) {
                        return Err(DecodeError::Malformed("DHT"));
                    }
                    if len as u32 <= FAST_BITS {
                        let shift = FAST_BITS - len as u32;
                        let first = (code << shift) as usize;
                        let entry = ((len as u16) << 8) | values[k] as u16;
                        for slot in &mut table.fast[first..first + (1 << shift)] {
                            *slot = entry;
                        }
                    }
                    code += 1;
                    k += 1;
                }
                table.maxcode[len] = code as i32 - 1;
            }
            code <<= 1;
        }
        Ok(table)
    }

    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u8, DecodeError> {
        reader.fill();
        let entry = self.fast[reader.peek(FAST_BITS) as usize];
        if entry != 0 {
            reader.consume((entry >> 8) as u32);
            return Ok((entry & 0xFF) as u8);
        }
        for len in 1..=16u32 {
            let code = reader.peek(len) as i32;
            if code <= self.maxcode[len as usize] {
                reader.consume(len);
                let idx = self.valptr[len as usize] + (code - self.mincode[len as usize]) as usize;
                return self.values.get(idx).copied().ok_or(DecodeError::BadHuffmanCode);
            }
        }
        Err(DecodeError::BadHuffmanCode)
    }
}

/// MSB-first reader over entropy-coded data. Handles `FF 00` stuffing and
/// stops at the first marker, feeding zero bits past it.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bits: u32,
    count: u32,
    marker: Option<u8>,
    pad_bits: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            bits: 0,
            count: 0,
            marker: None,
            pad_bits: 0,
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        if self.marker.is_some() {
            return None;
        }
        loop {
            let b = *self.data.get(self.pos)?;
            if b != 0xFF {
                self.pos += 1;
                return Some(b);
            }
            match self.data.get(self.pos + 1) {
                None => {
                    self.pos = self.data.len();
                    return None;
                }
                Some(0x00) => {
                    self.pos += 2;
                    return Some(0xFF);
                }
                // Fill byte ahead of a marker.
                Some(0xFF) => self.pos += 1,
                Some(&m) => {
                    self.marker = Some(m);
                    self.pos += 2;
                    return None;
                }
            }
        }
    }

    /// Top up the bit buffer to at least 25 bits.
    pub fn fill(&mut self) {
        while self.count <= 24 {
            let byte = match self.next_byte() {
                Some(b) => b,
                None => {
                    self.pad_bits += 8;
                    0
                }
            };
            self.bits |= (byte as u32) << (24 - self.count);
            self.count += 8;
        }
    }

    pub fn peek(&self, n: u32) -> u32 {
        self.bits >> (32 - n)
    }

    pub fn consume(&mut self, n: u32) {
        self.bits <<= n;
        self.count -= n;
    }

    /// Read `n` (<= 16) raw bits.
    pub fn receive(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.fill();
        let v = self.peek(n);
        self.consume(n);
        v
    }

    /// True once decoding has eaten into the zero padding past the data.
    pub fn overrun(&self) -> bool {
        self.pad_bits > self.count
    }

    /// Drop buffered bits and step over the next RSTn marker.
    pub fn restart(&mut self) -> Result<(), DecodeError> {
        self.bits = 0;
        self.count = 0;
        self.pad_bits = 0;
        match self.marker.take() {
            Some(m) if (0xD0..=0xD7).contains(&m) => return Ok(()),
            Some(_) => return Err(DecodeError::Truncated),
            None => {}
        }
        while self.pos + 1 < self.data.len() {
            if self.data[self.pos] == 0xFF && (0xD0..=0xD7).contains(&self.data[self.pos + 1]) {
                self.pos += 2;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(DecodeError::Truncated)
    }
}

/// Sign-extend a `size`-bit magnitude category value (JPEG F.2.2.1).
pub fn extend(v: u32, size: u32) -> i32 {
    if size == 0 {
        return 0;
    }
    if v < (1 << (size - 1)) {
        v as i32 - (1 << size) as i32 + 1
    } else {
        v as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HuffmanTable {
        // Two 2-bit codes (00 -> 'a', 01 -> 'b') and one 3-bit code (100 -> 'c').
        let mut counts = [0u8; 16];
        counts[1] = 2;
        counts[2] = 1;
        HuffmanTable::new(&counts, b"abc").unwrap()
    }

    #[test]
    fn decodes_canonical_codes() {
        // 00 01 100 + padding ones: 0001_1001 1111_1111
        let data = [0b0001_1001, 0b1111_1110];
        let mut reader = BitReader::new(&data, 0);
        let t = table();
        assert_eq!(t.decode(&mut reader), Ok(b'a'));
        assert_eq!(t.decode(&mut reader), Ok(b'b'));
        assert_eq!(t.decode(&mut reader), Ok(b'c'));
    }

    #[test]
    fn unassigned_code_is_rejected() {
        let data = [0xFE, 0x00];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(table().decode(&mut reader), Err(DecodeError::BadHuffmanCode));
    }

    #[test]
    fn stuffed_ff_is_data_and_marker_stops_reading() {
        let data = [0xFF, 0x00, 0xFF, 0xD9];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(reader.receive(8), 0xFF);
        assert!(!reader.overrun());
        assert_eq!(reader.receive(8), 0);
        assert!(reader.overrun());
    }

    #[test]
    fn restart_skips_to_marker() {
        let data = [0x12, 0xFF, 0xD3, 0xAB];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(reader.receive(4), 0x1);
        reader.restart().unwrap();
        assert_eq!(reader.receive(8), 0xAB);
    }

    #[test]
    fn extend_follows_sign_convention() {
        assert_eq!(extend(0b0, 1), -1);
        assert_eq!(extend(0b1, 1), 1);
        assert_eq!(extend(0b010, 3), -5);
        assert_eq!(extend(0b110, 3), 6);
    }

    #[test]
    fn oversubscribed_lengths_are_malformed() {
        let mut counts = [0u8; 16];
        counts[0] = 3;
        assert_eq!(HuffmanTable::new(&counts, b"xyz").err(), Some(DecodeError::Malformed("DHT")));
    }

    #[test]
    fn oversubscription_past_the_lookahead_is_malformed() {
        // Two 1-bit codes fill the tree; the 2-bit code has nowhere to go.
        let mut counts = [0u8; 16];
        counts[0] = 2;
        counts[1] = 1;
        assert_eq!(HuffmanTable::new(&counts, b"xyz").err(), Some(DecodeError::Malformed("DHT")));

        // Same overflow at a length the fast table never sees.
        let mut counts = [0u8; 16];
        counts[0] = 2;
        counts[11] = 1;
        assert_eq!(HuffmanTable::new(&counts, b"xyz").err(), Some(DecodeError::Malformed("DHT")));
    }

    #[test]
    fn complete_tree_is_accepted() {
        let mut counts = [0u8; 16];
        counts[0] = 1;
        counts[1] = 2;
        assert!(HuffmanTable::new(&counts, b"xyz").is_ok());
    }
}
