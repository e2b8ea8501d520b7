use crate::buffer::Buffer;
use diminuto_list::{self as list, Handle};
use diminuto_pool::Pool;
use std::io::IoSlice;

/// A `ListNode` whose payload is exactly one [`Buffer`]. Draws its node from
/// a [`Pool`]; exactly one `Segment` owns one `Buffer`.
pub type Segment = Handle<Buffer>;

/// A `ListNode` used as the root of an ordered list of [`Segment`]s. The
/// concatenation of each segment's buffer payload, in list order, is the
/// record's serialization.
pub type Record = Handle<Buffer>;

/// An implementation constant bounding the number of segments per record for
/// atomic vectorized I/O (`UIO_MAXIOV`, nominally 1024 on Linux).
pub const VECTOR_LIMIT: usize = 1024;

/// Draws a node from `pool`, allocates a buffer of at least `size` bytes
/// (eight-byte aligned), sets its meaningful length to `size`, and attaches
/// the two.
pub fn segment_allocate(pool: &Pool<Buffer>, size: usize) -> Segment {
    let segment = pool.get().expect("pool allocation never fails in practice");
    segment.set_payload(Some(Buffer::with_capacity(size)));
    segment
}

/// Frees the segment's buffer and returns the node to `pool`.
pub fn segment_free(pool: &Pool<Buffer>, segment: Segment) {
    pool.put(segment);
}

pub fn segment_payload<'a>(segment: Segment) -> Option<&'a [u8]> {
    segment.payload().map(Buffer::payload)
}

pub fn segment_length(segment: Segment) -> usize {
    segment.payload().map(Buffer::length).unwrap_or(0)
}

pub fn segment_set_length(segment: Segment, n: usize) {
    if let Some(buf) = segment.payload_mut() {
        buf.set_length(n);
    }
}

/// Allocates a new, empty record root from `pool`.
pub fn record_allocate(pool: &Pool<Buffer>) -> Record {
    pool.get().expect("pool allocation never fails in practice")
}

/// Frees every child segment, then the record root itself.
pub fn record_free(pool: &Pool<Buffer>, record: Record) {
    record_segments_free(pool, record);
    pool.put(record);
}

/// Frees every child segment but keeps the (now empty) record root.
pub fn record_segments_free(pool: &Pool<Buffer>, record: Record) {
    while let Some(segment) = list::first(record) {
        list::remove(segment);
        pool.put(segment);
    }
}

pub fn append(record: Record, segment: Segment) {
    let tail = list::previous(record);
    list::insert_after(tail, segment);
}

pub fn prepend(record: Record, segment: Segment) {
    list::insert_after(record, segment);
}

pub fn insert_after(existing: Segment, new: Segment) {
    list::insert_after(existing, new);
}

/// Splices `new` into `old`'s position and detaches `old` (which the caller
/// is responsible for freeing or reusing).
pub fn replace(old: Segment, new: Segment) {
    let position = list::previous(old);
    list::insert_after(position, new);
    list::remove(old);
}

pub fn remove(segment: Segment) -> bool {
    list::remove(segment)
}

pub fn head(record: Record) -> Option<Segment> {
    list::first(record)
}

pub fn tail(record: Record) -> Option<Segment> {
    list::last(record)
}

pub fn next(segment: Segment) -> Option<Segment> {
    let record = list::root(segment);
    let n = list::next(segment);
    (n != record).then_some(n)
}

pub fn previous(segment: Segment) -> Option<Segment> {
    let record = list::root(segment);
    let p = list::previous(segment);
    (p != record).then_some(p)
}

/// Number of segments in `record`.
pub fn enumerate(record: Record) -> usize {
    let mut count = 0usize;
    let mut cursor = list::first(record);
    while let Some(segment) = cursor {
        count += 1;
        cursor = next(segment);
    }
    count
}

/// Sum of every segment's meaningful length.
pub fn measure(record: Record) -> usize {
    let mut total = 0usize;
    let mut cursor = list::first(record);
    while let Some(segment) = cursor {
        total += segment_length(segment);
        cursor = next(segment);
    }
    total
}

/// Diagnostic listing: one line per segment, `<index> <length> <hex...>`.
pub fn dump(record: Record) -> String {
    let mut out = String::new();
    let mut index = 0usize;
    let mut cursor = list::first(record);
    while let Some(segment) = cursor {
        let payload = segment.payload().map(Buffer::payload).unwrap_or(&[]);
        out.push_str(&format!("{index}: {} bytes", payload.len()));
        for byte in payload {
            out.push_str(&format!(" {byte:02x}"));
        }
        out.push('\n');
        index += 1;
        cursor = next(segment);
    }
    out
}

/// Populates `out` with one `IoSlice` per segment, in list order. Returns
/// `None` (not an error) if `out` is shorter than [`enumerate`]; otherwise
/// returns the number of slices written.
pub fn vectorize<'a>(record: Record, out: &mut [IoSlice<'a>]) -> Option<usize> {
    let mut count = 0usize;
    let mut cursor = list::first(record);
    while let Some(segment) = cursor {
        if count >= out.len() {
            return None;
        }
        let payload = segment_payload(segment).unwrap_or(&[]);
        out[count] = IoSlice::new(payload);
        count += 1;
        cursor = next(segment);
    }
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_and_vectorize_match_segment_lengths() {
        let pool: Pool<Buffer> = Pool::new(16);
        let record = record_allocate(&pool);

        let sizes = [4usize, 8, 16];
        for &size in &sizes {
            let segment = segment_allocate(&pool, size);
            append(record, segment);
        }

        assert_eq!(enumerate(record), 3);
        assert_eq!(measure(record), 28);

        let mut iov = [IoSlice::new(&[]); 4];
        let filled = vectorize(record, &mut iov).unwrap();
        assert_eq!(filled, 3);
        for (slot, &expected) in iov.iter().zip(sizes.iter()).take(filled) {
            assert_eq!(slot.len(), expected);
        }

        record_free(&pool, record);
    }

    #[test]
    fn vectorize_returns_none_when_vector_too_short() {
        let pool: Pool<Buffer> = Pool::new(4);
        let record = record_allocate(&pool);
        for _ in 0..3 {
            append(record, segment_allocate(&pool, 4));
        }

        let mut iov = [IoSlice::new(&[]); 2];
        assert_eq!(vectorize(record, &mut iov), None);

        record_free(&pool, record);
    }

    #[test]
    fn record_segments_free_keeps_root_usable() {
        let pool: Pool<Buffer> = Pool::new(4);
        let record = record_allocate(&pool);
        append(record, segment_allocate(&pool, 4));
        append(record, segment_allocate(&pool, 4));

        record_segments_free(&pool, record);
        assert_eq!(enumerate(record), 0);

        append(record, segment_allocate(&pool, 2));
        assert_eq!(enumerate(record), 1);

        record_free(&pool, record);
    }
}
