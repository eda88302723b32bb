use std::io;

/// Parameters for a CRC context attached to a [`crate::BitReader`].
///
/// The register is updated one bit at a time as the reader consumes bits, so
/// no pre-computed lookup table is required; `width_bits` must be in
/// `[1, 32]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcParams {
    /// Width of the CRC register, in bits.
    pub width_bits: u8,
    /// Generator polynomial, right-aligned to `width_bits`.
    pub polynomial: u32,
    /// Whether input bits are reflected before being folded into the register.
    pub reflected_input: bool,
}

impl CrcParams {
    /// AC-3 `syncinfo`/frame-end CRC: CRC-16/ATSC, poly `0x8005`, MSB-first.
    ///
    /// Named `0x18005` in `spec.md` with the implicit leading bit for width
    /// 16; the register-width polynomial used here is `0x8005`.
    pub const AC3: Self = Self {
        width_bits: 16,
        polynomial: 0x8005,
        reflected_input: false,
    };

    /// MLP/TrueHD `major_sync_info()` CRC-16, poly `0x002D`, MSB-first.
    pub const MLP_MAJOR_SYNC: Self = Self {
        width_bits: 16,
        polynomial: 0x002D,
        reflected_input: false,
    };

    /// MPEG-2 Transport Stream PSI section CRC-32/MPEG-2, poly `0x04C11DB7`.
    pub const MPEG_CRC32: Self = Self {
        width_bits: 32,
        polynomial: 0x04C1_1DB7,
        reflected_input: false,
    };
}

/// Running state of a CRC computation, folding one bit at a time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CrcState {
    params: CrcParams,
    register: u32,
}

impl CrcState {
    pub(crate) fn new(params: CrcParams) -> io::Result<Self> {
        if params.width_bits == 0 || params.width_bits > 32 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "CRC width_bits must be in [1, 32]"));
        }

        Ok(Self { params, register: 0 })
    }

    pub(crate) fn push_bit(&mut self, bit: bool) {
        let bit = if self.params.reflected_input { !bit } else { bit };

        let top_bit = (self.register >> (self.params.width_bits - 1)) & 1 == 1;
        let input_bit = bit as u32;

        self.register = (self.register << 1) & Self::mask(self.params.width_bits);
        self.register |= input_bit;

        if top_bit {
            self.register ^= self.params.polynomial & Self::mask(self.params.width_bits);
        }
    }

    pub(crate) fn value(&self) -> u32 {
        self.register
    }

    fn mask(width_bits: u8) -> u32 {
        if width_bits == 32 {
            u32::MAX
        } else {
            (1u32 << width_bits) - 1
        }
    }
}
