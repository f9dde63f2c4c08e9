use error::SMBError;

pub mod error;
pub mod logging;
pub mod nt_status;

pub type SMBResult<T> = Result<T, SMBError>;
pub type SMBParseResult<I, O, E = SMBError> = Result<(I, O), E>;

pub trait SMBByteSize {
    fn smb_byte_size(&self) -> usize;
}

pub trait SMBFromBytes: SMBByteSize {
    fn smb_from_bytes(input: &[u8]) -> SMBParseResult<&[u8], Self> where Self: Sized;
}

pub trait SMBToBytes: SMBByteSize {
    fn smb_to_bytes(&self) -> Vec<u8>;
}

impl<T: SMBByteSize> SMBByteSize for Vec<T> {
    fn smb_byte_size(&self) -> usize {
        self.iter().fold(0, |prev, x| prev + x.smb_byte_size())
    }
}

impl<T: SMBToBytes> SMBToBytes for Vec<T> {
    fn smb_to_bytes(&self) -> Vec<u8> {
        self.iter().flat_map(|x| x.smb_to_bytes()).collect()
    }
}

macro_rules! impl_parse_fixed_slice {
    ($size: expr, $input: expr) => {{
        if $input.len() < $size {
            return Err(SMBError::payload_too_small($size as usize, $input.len()));
        }
        let res = <[u8; $size]>::try_from(&$input[0..$size])
            .map_err(SMBError::parse_error)?;
        Ok((&$input[$size..], res))
    }}
}

macro_rules! impl_smb_for_unsigned_type {(
    $($t:ty)*
) => (
    $(
        impl SMBByteSize for $t {
            fn smb_byte_size(&self) -> usize {
                std::mem::size_of_val(self)
            }
        }

        impl SMBFromBytes for $t {
            fn smb_from_bytes(input: &[u8]) -> SMBParseResult<&[u8], Self> {
                const T_SIZE: usize = std::mem::size_of::<$t>();
                let value: SMBParseResult<&[u8], [u8; T_SIZE]> = impl_parse_fixed_slice!(T_SIZE, input);
                let (remaining, bytes) = value?;
                Ok((remaining, <$t>::from_le_bytes(bytes)))
            }
        }

        impl SMBToBytes for $t {
            fn smb_to_bytes(&self) -> Vec<u8> {
                self.to_le_bytes().to_vec()
            }
        }
    )*
)}

impl_smb_for_unsigned_type! {
    u8 u16 u32 u64
}
