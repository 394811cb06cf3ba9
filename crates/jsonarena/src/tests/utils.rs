use alloc::rc::Rc;
use core::{alloc::Layout, cell::Cell, ptr::NonNull};

use crate::{
    AllocError, MemoryResource, MonotonicResource, Parser, ParserError, ParserOptions,
    PoolResource, Storage, SystemResource, Value, parse,
};

/// Forwards to the global allocator until `budget` allocations have been
/// made, then fails every request. Tracks live allocations.
pub(crate) struct FailingResource {
    budget: usize,
    allocations: Cell<usize>,
    live: Cell<usize>,
    failed: Cell<bool>,
}

impl FailingResource {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            budget,
            allocations: Cell::new(0),
            live: Cell::new(0),
            failed: Cell::new(false),
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.live.get()
    }

    pub(crate) fn failed(&self) -> bool {
        self.failed.get()
    }
}

impl MemoryResource for FailingResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if self.allocations.get() >= self.budget {
            self.failed.set(true);
            return Err(AllocError);
        }
        self.allocations.set(self.allocations.get() + 1);
        self.live.set(self.live.get() + 1);
        SystemResource.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.live.set(self.live.get() - 1);
        unsafe { SystemResource.deallocate(ptr, layout) }
    }

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        core::ptr::addr_eq(self, other)
    }
}

/// Writes every chunk but the last, then finishes with the last one.
pub(crate) fn parse_chunks<'r>(
    chunks: &[&[u8]],
    storage: Storage<'r>,
) -> Result<Value<'r>, ParserError> {
    let mut parser = Parser::new(ParserOptions::default());
    parser.start(storage);
    let Some((last, init)) = chunks.split_last() else {
        parser.finish(b"")?;
        return parser.release();
    };
    for chunk in init {
        parser.write(chunk)?;
    }
    parser.finish(last)?;
    parser.release()
}

/// Parses `json` with a resource that fails the first allocation, then the
/// second, and so on until parsing succeeds. Every failure must be clean
/// and leak nothing.
pub(crate) fn fail_loop(json: &[u8], expected: &Value<'_>) {
    for budget in 0..10_000 {
        let resource = Rc::new(FailingResource::new(budget));
        match parse_chunks(&[json], Storage::from(resource.clone())) {
            Ok(value) => {
                assert_eq!(&value, expected);
                assert!(!resource.failed());
                drop(value);
                assert_eq!(resource.live(), 0, "leak after success");
                return;
            }
            Err(err) => {
                assert_eq!(err, ParserError::OutOfMemory);
                assert!(resource.failed());
                assert_eq!(resource.live(), 0, "leak after failure at {budget}");
            }
        }
    }
    panic!("no allocation budget was enough");
}

/// Parses `json` whole, at every two-way split point with each resource
/// kind, at every three-way split when it is short, and under allocation
/// failure; checks that every result agrees and that the tree round-trips
/// through `Display`.
pub(crate) fn grind(json: &str) -> Value<'static> {
    let bytes = json.as_bytes();
    let expected = parse(bytes).unwrap_or_else(|e| panic!("{json:?}: {e}"));

    for i in 1..bytes.len() {
        let (a, b) = bytes.split_at(i);
        for storage in [
            Storage::new(MonotonicResource::new()),
            Storage::new(PoolResource::new()),
            Storage::system(),
        ] {
            let kind = storage.kind();
            let split = parse_chunks(&[a, b], storage)
                .unwrap_or_else(|e| panic!("{json:?} split at {i} with {kind:?}: {e}"));
            assert_eq!(split, expected, "{json:?} split at {i} with {kind:?}");
        }
    }

    if bytes.len() <= 24 {
        for i in 1..bytes.len() {
            for j in i..bytes.len() {
                let chunks = [&bytes[..i], &bytes[i..j], &bytes[j..]];
                let split = parse_chunks(&chunks, Storage::new(MonotonicResource::new()))
                    .unwrap_or_else(|e| panic!("{json:?} split at {i}, {j}: {e}"));
                assert_eq!(split, expected, "{json:?} split at {i}, {j}");
            }
        }
    }

    fail_loop(bytes, &expected);

    let text = alloc::string::ToString::to_string(&expected);
    let reparsed = parse(&text).unwrap_or_else(|e| panic!("{text:?}: {e}"));
    assert_eq!(reparsed, expected, "round trip of {json:?} through {text:?}");

    expected
}

/// The error for `json` whole, checked to be the same at every split point.
pub(crate) fn grind_error(json: &[u8]) -> ParserError {
    let expected = parse_chunks(&[json], Storage::system())
        .expect_err("document should be rejected");
    for i in 1..json.len() {
        let (a, b) = json.split_at(i);
        let error = parse_chunks(&[a, b], Storage::new(MonotonicResource::new()))
            .expect_err("document should be rejected");
        assert_eq!(error, expected, "split at {i}");
    }
    expected
}
