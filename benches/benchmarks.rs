//! Performance benchmarks for the wsrv codec and handshake.
//!
//! Run with: `cargo bench`

use std::io::{self, Cursor, Read, Write};

use bytes::BytesMut;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use wsrv::protocol::handshake::{SessionBuilder, compute_accept_key};
use wsrv::protocol::mask::{apply_mask, apply_mask_fast};
use wsrv::protocol::{Frame, MessageReader, OpCode, encode_frame};
use wsrv::{ByteStream, Limits, negotiate};

const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

fn client_frame(payload_size: usize) -> Vec<u8> {
    let frame = Frame::new(true, OpCode::Text, vec![0xAB; payload_size]);
    let mut buf = BytesMut::with_capacity(frame.wire_size(true));
    frame.write(&mut buf, Some(MASK)).unwrap();
    buf.to_vec()
}

// =============================================================================
// Frame Decoding Benchmarks
// =============================================================================

fn bench_frame_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decoding");

    for (name, size) in [("small_10b", 10), ("medium_1kb", 1024), ("large_64kb", 65536)] {
        let wire = client_frame(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("{name}_parse"), |b| {
            b.iter(|| Frame::parse(black_box(&wire), usize::MAX))
        });

        group.bench_function(format!("{name}_read"), |b| {
            b.iter(|| {
                let mut reader = MessageReader::new(Limits::default());
                reader.read_message(&mut black_box(&wire[..]))
            })
        });
    }

    group.finish();
}

fn bench_fragmented_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented_message");

    let mut wire = BytesMut::new();
    Frame::new(false, OpCode::Text, vec![b'a'; 4096])
        .write(&mut wire, Some(MASK))
        .unwrap();
    for _ in 0..14 {
        Frame::new(false, OpCode::Continuation, vec![b'b'; 4096])
            .write(&mut wire, Some(MASK))
            .unwrap();
    }
    Frame::new(true, OpCode::Continuation, vec![b'c'; 4096])
        .write(&mut wire, Some(MASK))
        .unwrap();

    group.throughput(Throughput::Bytes(16 * 4096));
    group.bench_function("16x4kb", |b| {
        b.iter(|| wsrv::decode_message(&mut black_box(&wire[..])))
    });

    group.finish();
}

// =============================================================================
// Frame Encoding Benchmarks
// =============================================================================

fn bench_frame_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encoding");

    for (name, size) in [("small_10b", 10), ("medium_1kb", 1024), ("large_64kb", 65536)] {
        let payload = vec![0xAB; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(name, |b| {
            b.iter(|| encode_frame(OpCode::Text, black_box(&payload), true))
        });
    }

    group.finish();
}

// =============================================================================
// Masking Benchmarks
// =============================================================================

fn bench_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("masking");

    for size in [64usize, 1024, 65536] {
        let mut data = vec![0xAB; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("scalar_{size}"), |b| {
            b.iter(|| apply_mask(black_box(&mut data), MASK))
        });

        group.bench_function(format!("fast_{size}"), |b| {
            b.iter(|| apply_mask_fast(black_box(&mut data), MASK))
        });
    }

    group.finish();
}

// =============================================================================
// Handshake Benchmarks
// =============================================================================

struct MockStream {
    read_data: Cursor<Vec<u8>>,
    write_data: Vec<u8>,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_data.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const REQUEST: &[u8] = b"GET /echo/ HTTP/1.1\r\n\
    Host: localhost:25955\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Sec-WebSocket-Version: 13\r\n\
    Sec-WebSocket-Protocol: chat, echo\r\n\
    \r\n";

fn bench_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");

    group.bench_function("accept_key", |b| {
        b.iter(|| compute_accept_key(black_box("dGhlIHNhbXBsZSBub25jZQ==")))
    });

    group.bench_function("session_builder", |b| {
        b.iter(|| {
            let mut builder = SessionBuilder::new("/echo/", None);
            let mut lines = std::str::from_utf8(REQUEST).unwrap().lines();
            builder.request_line(lines.next().unwrap()).unwrap();
            for line in lines.take_while(|l| !l.is_empty()) {
                builder.header_line(line).unwrap();
            }
            builder.finish(&["echo"])
        })
    });

    group.bench_function("negotiate", |b| {
        b.iter(|| {
            let mut stream = ByteStream::new(MockStream {
                read_data: Cursor::new(REQUEST.to_vec()),
                write_data: Vec::with_capacity(256),
            });
            negotiate(&mut stream, "/echo/", None, &["echo"])
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_decoding,
    bench_fragmented_message,
    bench_frame_encoding,
    bench_masking,
    bench_handshake,
);
criterion_main!(benches);
