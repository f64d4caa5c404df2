//! Brotli compression of the WOFF2 table stream.

use super::FontWriter;

impl FontWriter {
    /// Compresses the concatenated table bodies (padding omitted, as the
    /// WOFF2 stream requires) into a single Brotli stream.
    pub(super) fn compress_data(&self) -> Vec<u8> {
        debug_assert!(
            self.tables.windows(2).all(|window| {
                let [prev, next] = window else {
                    unreachable!();
                };
                prev.offset + prev.length <= next.offset
            }),
            "table records need to be ordered by offsets"
        );
        let data_offset = self.tables.first().map_or(0, |record| record.offset);

        let mut raw = Vec::with_capacity(self.table_data.len());
        for record in &self.tables {
            let start = (record.offset - data_offset) as usize;
            let end = start + record.length as usize;
            raw.extend_from_slice(&self.table_data[start..end]);
        }

        let mut compressed = vec![];
        let params = ::brotli::enc::BrotliEncoderParams::default();
        ::brotli::BrotliCompress(&mut &raw[..], &mut compressed, &params)
            .expect("writing to Vec never fails");
        compressed
    }
}

#[cfg(test)]
mod tests {
    use crate::{tables::Tag, write::FontWriter};

    #[test]
    fn compressed_stream_round_trips() {
        let mut writer = FontWriter::truetype();
        writer.write_raw_table(Tag(*b"one "), &[1, 2, 3]); // padded to 4 bytes
        writer.write_raw_table(Tag(*b"two "), &[4, 5, 6, 7, 8]);

        let compressed = writer.compress_data();
        let mut decompressed = vec![];
        ::brotli::BrotliDecompress(&mut &compressed[..], &mut decompressed).unwrap();
        // Padding between tables is not part of the stream.
        assert_eq!(decompressed, [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
