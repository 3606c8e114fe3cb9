//! The BAM binary codec: header framing and record decode/encode.

pub mod header;
pub mod record;

pub use header::{read_header, write_header};
pub use record::{read_record, read_record_body, try_read_block_size, write_record, Omit};
