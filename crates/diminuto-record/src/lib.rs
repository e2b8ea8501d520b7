mod buffer;
mod io;
mod record;

pub use buffer::Buffer;
pub use io::{
    record_datagram_receive, record_datagram_send, record_read, record_stream_receive,
    record_stream_send, record_write, RecordIoError,
};
pub use record::{
    append, dump, enumerate, head, insert_after, measure, next, prepend, previous, record_allocate,
    record_free, record_segments_free, remove, replace, segment_allocate, segment_free,
    segment_length, segment_payload, segment_set_length, tail, vectorize, Record, Segment,
    VECTOR_LIMIT,
};
