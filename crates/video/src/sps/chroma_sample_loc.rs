use std::io;

use bitstream::{BitReader, BitWriter};
use expgolomb::{BitReaderExpGolombExt, BitWriterExpGolombExt, size_of_exp_golomb};

/// `ChromaSampleLoc` contains the fields that are set when `chroma_loc_info_present_flag == 1`,
///
/// This contains the following fields: `chroma_sample_loc_type_top_field` and `chroma_sample_loc_type_bottom_field`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaSampleLoc {
    /// The `chroma_sample_loc_type_top_field` specifies the location of chroma samples.
    ///
    /// The value of this ranges from \[0, 5\]. By default, this value is set to 0.
    ///
    /// See ISO/IEC-14496-10-2022 - E.2.1 Figure E-1 for more info.
    ///
    /// This is a variable number of bits as it is encoded by an exp golomb (unsigned).
    /// The smallest encoding would be for `0` which is encoded as `1`, which is a single bit.
    /// The largest encoding would be for `5` which is encoded as `0 0110`, which is 5 bits.
    /// ISO/IEC-14496-10-2022 - E.2.1
    ///
    /// For more information:
    ///
    /// <https://en.wikipedia.org/wiki/Exponential-Golomb_coding>
    pub chroma_sample_loc_type_top_field: u8,

    /// The `chroma_sample_loc_type_bottom_field`
    ///
    /// The value of this ranges from \[0, 5\]. By default, this value is set to 0.
    ///
    /// See ISO/IEC-14496-10-2022 - E.2.1 Figure E-1 for more info.
    ///
    /// This is a variable number of bits as it is encoded by an exp golomb (unsigned).
    /// The smallest encoding would be for `0` which is encoded as `1`, which is a single bit.
    /// The largest encoding would be for `5` which is encoded as `0 0110`, which is 5 bits.
    /// ISO/IEC-14496-10-2022 - E.2.1
    ///
    /// For more information:
    ///
    /// <https://en.wikipedia.org/wiki/Exponential-Golomb_coding>
    pub chroma_sample_loc_type_bottom_field: u8,
}

impl ChromaSampleLoc {
    /// Parses the fields defined when the `chroma_loc_info_present_flag == 1` from a bitstream.
    /// Returns a `ChromaSampleLoc` struct.
    pub fn parse<T: io::Read>(reader: &mut BitReader<T>) -> io::Result<Self> {
        let chroma_sample_loc_type_top_field = reader.read_exp_golomb()? as u8;
        let chroma_sample_loc_type_bottom_field = reader.read_exp_golomb()? as u8;

        Ok(ChromaSampleLoc {
            chroma_sample_loc_type_top_field,
            chroma_sample_loc_type_bottom_field,
        })
    }

    /// Builds the ChromaSampleLoc struct into a byte stream.
    /// Returns a built byte stream.
    pub fn build<T: io::Write>(&self, writer: &mut BitWriter<T>) -> io::Result<()> {
        writer.write_exp_golomb(self.chroma_sample_loc_type_top_field as u64)?;
        writer.write_exp_golomb(self.chroma_sample_loc_type_bottom_field as u64)?;
        Ok(())
    }

    /// Returns the total bits of the ChromaSampleLoc struct.
    ///
    /// Note that this isn't the bytesize since aligning it may cause some values to be different.
    pub fn bitsize(&self) -> u64 {
        size_of_exp_golomb(self.chroma_sample_loc_type_top_field as u64)
            + size_of_exp_golomb(self.chroma_sample_loc_type_bottom_field as u64)
    }

    /// Returns the total bytes of the ChromaSampleLoc struct.
    ///
    /// Note that this calls [`ChromaSampleLoc::bitsize()`] and calculates the number of bytes
    /// including any necessary padding such that the bitstream is byte aligned.
    pub fn bytesize(&self) -> u64 {
        self.bitsize().div_ceil(8)
    }
}
