mod frame;

pub use frame::{
    FROM_END, FROM_START, FrameHeader, FrameKind, HEADER_SIZE, IN_SYNC, MAX_PAYLOAD, PADDED,
    RESUME_REQUEST_SIZE, SYNC_IDX, decode_resume, encode_data_frame, encode_resume,
};
