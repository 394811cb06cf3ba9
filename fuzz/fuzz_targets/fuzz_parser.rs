#![no_main]
use std::cell::RefCell;

use arbitrary::Arbitrary;
use jsonarena::{MonotonicResource, Parser, ParserOptions, PoolResource, Storage, Value};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::Map;

const HEADER: usize = 5; // 1 flag + 4-byte seed

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

static WS_TABLE: &[&[u8]] = &[b" ", b"\t", b"\n", b"\r"];

fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size < HEADER || seed.is_multiple_of(10) {
        data[0] = with_rng(|rng| rng.next_u32() as u8);
        data[1..5].copy_from_slice(&with_rng(|rng| rng.next_u32().to_le_bytes()));

        let mut prefix = HEADER;
        if prefix < max_size {
            let limit = max_size - prefix;
            prefix += append_whitespace(&mut data[prefix..], limit);
            let limit = max_size - prefix;
            prefix += append_value(&mut data[prefix..], size.max(16), limit);
            let limit = max_size - prefix;
            prefix += append_whitespace(&mut data[prefix..], limit);
        }
        prefix
    } else {
        fuzzer_mutate(data, size, max_size)
    }
}

fn append_whitespace(buf: &mut [u8], limit: usize) -> usize {
    with_rng(|rng| {
        if limit == 0 {
            return 0;
        }
        let mut written = 0;
        for _ in 0..rng.random_range(0..=limit.min(4)) {
            let w = WS_TABLE[rng.random_range(0..WS_TABLE.len())];
            if written + w.len() > limit {
                break;
            }
            buf[written..written + w.len()].copy_from_slice(w);
            written += w.len();
        }
        written
    })
}

fn append_value(data: &mut [u8], size: usize, limit: usize) -> usize {
    let value = loop {
        let s = with_rng(|rng| rng.random_range(size / 2..size * 2));
        let bytes: Vec<u8> = with_rng(|rng| (0..s).map(|_| rng.random::<u8>()).collect());
        if let Ok(value) = ArbitraryValue::arbitrary(&mut arbitrary::Unstructured::new(&bytes)) {
            break value;
        }
    };

    let serialized = serde_json::to_vec(&value.0).expect("Failed to serialize arbitrary value");
    let len = serialized.len().min(limit);
    data[..len].copy_from_slice(&serialized[..len]);
    len
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

#[derive(Debug)]
struct ArbitraryValue(serde_json::Value);

impl<'a> Arbitrary<'a> for ArbitraryValue {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        use serde_json::Value as J;

        let value = match u.choose_index(24)? {
            0 => J::Null,
            1 => J::Bool(u.arbitrary()?),
            2 => J::from(u.arbitrary::<i64>()?),
            3 => J::from(u.arbitrary::<u64>()?),
            4 => {
                let n: f64 = u.arbitrary()?;
                J::Number(serde_json::Number::from_f64(n).ok_or(arbitrary::Error::IncorrectFormat)?)
            }
            5..=12 => J::String(u.arbitrary()?),
            13..=18 => {
                let elems: Vec<ArbitraryValue> = u.arbitrary()?;
                J::Array(elems.into_iter().map(|v| v.0).collect())
            }
            _ => {
                let m: Vec<(String, ArbitraryValue)> = u.arbitrary()?;
                J::Object(Map::from_iter(m.into_iter().map(|(k, v)| (k, v.0))))
            }
        };
        Ok(ArbitraryValue(value))
    }
}

fn parse_chunks<'r>(
    options: ParserOptions,
    chunks: &[&[u8]],
    storage: Storage<'r>,
) -> Result<Value<'r>, jsonarena::ParserError> {
    let mut parser = Parser::new(options);
    parser.start(storage);
    for chunk in chunks {
        parser.write(chunk)?;
    }
    parser.finish(b"")?;
    parser.release()
}

fn parser(data: &[u8]) {
    if data.len() < HEADER {
        return;
    }

    let flags = data[0];
    let split_seed = u32::from_le_bytes(data[1..5].try_into().unwrap()) as usize;
    let data = &data[HEADER..];

    let options = ParserOptions {
        max_depth: if flags & 1 != 0 { 16 } else { jsonarena::DEFAULT_MAX_DEPTH },
        allow_control_characters: flags & 2 != 0,
        panic_on_error: false,
    };

    let whole = parse_chunks(options, &[data], Storage::system());

    // Chunks may cut through UTF-8 sequences and escapes alike.
    let mut chunks = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let size = (split_seed % rest.len()) + 1;
        let (chunk, tail) = rest.split_at(size);
        chunks.push(chunk);
        rest = tail;
    }
    let storage = if flags & 4 != 0 {
        Storage::new(PoolResource::new())
    } else {
        Storage::new(MonotonicResource::new())
    };
    let split = parse_chunks(options, &chunks, storage);

    match (&whole, &split) {
        (Ok(a), Ok(b)) => {
            assert_eq!(a, b);
            let text = a.to_string();
            let reparsed = jsonarena::parse(&text).expect("serialized value must parse");
            assert_eq!(&reparsed, a);
        }
        (Err(a), Err(b)) => assert_eq!(a, b),
        _ => panic!("whole {whole:?} but split {split:?}"),
    }

    // Anything serde_json accepts is accepted here too.
    if flags & 1 == 0 && serde_json::from_slice::<serde_json::Value>(data).is_ok() {
        assert!(whole.is_ok(), "rejected valid JSON: {whole:?}");
    }
}

fuzz_target!(|data: &[u8]| parser(data));
