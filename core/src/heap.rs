//! Heap objects and the runtime's substitute for a garbage collector.
//!
//! Every object the VM can hold a pointer to — compiled bytecode, interned
//! strings — is allocated through the host-supplied allocator and linked into
//! one intrusive, process-wide "all objects" list. There is no collection
//! during normal operation: objects live until [`Heap::teardown`] walks the
//! list and destructs everything at once. String objects are additionally
//! deduplicated by content so that pointer identity implies content equality
//! (see [`Heap::intern`]).

use alloc::vec::Vec;
use core::ptr::NonNull;

use allocator_api2::alloc::Allocator;
use allocator_api2::boxed::Box;
use hashbrown::HashMap;

use crate::instruction::Instruction;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Bytecode,
    String,
}

/// Intrusive list link shared by every heap object. Because it is always the
/// first field of its owner (`#[repr(C)]`), a `*mut ObjectHeader` and a
/// `*mut BytecodeObject`/`*mut StringObject` are mutually convertible by
/// simple pointer cast — the same trick C gets from struct-prefix
/// "inheritance", used here instead of a trait object so teardown needs no
/// vtable.
#[repr(C)]
pub struct ObjectHeader {
    pub next: Option<NonNull<ObjectHeader>>,
    pub kind: ObjectKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstantKind {
    Int,
    Float,
    String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineInfoEntry {
    pub offset: u64,
    pub line: u16,
}

/// Compiled output of one source unit: the instruction stream, its constant
/// pool (deduplicated per type by [`crate::codegen::CodeGenerator`]), and the
/// offset-to-line sidechannel used for runtime error reporting.
#[repr(C)]
pub struct BytecodeObject {
    pub header: ObjectHeader,
    pub code: Vec<Instruction>,
    pub constants: Vec<Value>,
    pub constant_kinds: Vec<ConstantKind>,
    pub line_info: Vec<LineInfoEntry>,
}

impl BytecodeObject {
    /// The source line of the instruction at `offset`, per the
    /// largest-offset-not-exceeding rule, or `None` if `line_info` is empty.
    pub fn line_for_offset(&self, offset: usize) -> Option<u16> {
        self.line_info
            .iter()
            .rev()
            .find(|entry| entry.offset as usize <= offset)
            .map(|entry| entry.line)
    }
}

/// An interned, immutable byte string.
#[repr(C)]
pub struct StringObject {
    pub header: ObjectHeader,
    pub bytes: Vec<u8>,
    pub hash: u64,
}

impl StringObject {
    pub fn as_str(&self) -> &str {
        // SAFETY: only ever constructed from `&str` in `Heap::intern`.
        unsafe { core::str::from_utf8_unchecked(&self.bytes) }
    }
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    // FNV-1a, matching the style of a small hand-rolled hash the original
    // runtime computes once at intern time and stores on the object.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Owns every heap object allocated by one runtime instance, plus the
/// interned-string set, over a host-supplied allocator `A`.
pub struct Heap<A: Allocator + Clone> {
    allocator: A,
    all_objects: Option<NonNull<ObjectHeader>>,
    interned: HashMap<u64, Vec<NonNull<StringObject>>>,
}

impl<A: Allocator + Clone> Heap<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            all_objects: None,
            interned: HashMap::new(),
        }
    }

    fn link(&mut self, header: NonNull<ObjectHeader>) {
        // SAFETY: `header` was just allocated and is not aliased yet.
        unsafe {
            (*header.as_ptr()).next = self.all_objects;
        }
        self.all_objects = Some(header);
    }

    pub fn alloc_bytecode(
        &mut self,
        code: Vec<Instruction>,
        constants: Vec<Value>,
        constant_kinds: Vec<ConstantKind>,
        line_info: Vec<LineInfoEntry>,
    ) -> NonNull<BytecodeObject> {
        let object = BytecodeObject {
            header: ObjectHeader {
                next: None,
                kind: ObjectKind::Bytecode,
            },
            code,
            constants,
            constant_kinds,
            line_info,
        };
        let boxed = Box::new_in(object, self.allocator.clone());
        let ptr = NonNull::new(Box::into_raw(boxed)).expect("box is never null");
        self.link(ptr.cast());
        ptr
    }

    /// Interns `text`, returning the existing object if an equal one has
    /// already been allocated so that string identity equals string content.
    pub fn intern(&mut self, text: &str) -> NonNull<StringObject> {
        let hash = hash_bytes(text.as_bytes());
        if let Some(bucket) = self.interned.get(&hash) {
            for &candidate in bucket {
                // SAFETY: every entry in `interned` points at a live StringObject.
                if unsafe { candidate.as_ref().as_str() } == text {
                    return candidate;
                }
            }
        }

        let mut bytes = Vec::new();
        bytes.extend_from_slice(text.as_bytes());
        let object = StringObject {
            header: ObjectHeader {
                next: None,
                kind: ObjectKind::String,
            },
            bytes,
            hash,
        };
        let boxed = Box::new_in(object, self.allocator.clone());
        let ptr = NonNull::new(Box::into_raw(boxed)).expect("box is never null");
        self.link(ptr.cast());
        self.interned.entry(hash).or_default().push(ptr);
        ptr
    }

    /// Walks the all-objects list and destructs everything, exactly once,
    /// when the owning runtime is torn down.
    ///
    /// # Safety
    /// Must be called at most once, and no pointer obtained from this heap
    /// may be dereferenced afterwards.
    pub unsafe fn teardown(&mut self) {
        let mut current = self.all_objects.take();
        while let Some(header) = current {
            // SAFETY: `header` was linked by `link` and not yet destructed.
            let kind = unsafe { header.as_ref().kind };
            current = unsafe { header.as_ref().next };
            match kind {
                ObjectKind::Bytecode => unsafe {
                    drop(Box::from_raw_in(
                        header.cast::<BytecodeObject>().as_ptr(),
                        self.allocator.clone(),
                    ));
                },
                ObjectKind::String => unsafe {
                    drop(Box::from_raw_in(
                        header.cast::<StringObject>().as_ptr(),
                        self.allocator.clone(),
                    ));
                },
            }
        }
        self.interned.clear();
    }
}

impl<A: Allocator + Clone> Drop for Heap<A> {
    fn drop(&mut self) {
        // SAFETY: `drop` runs at most once and nothing outlives the heap.
        unsafe { self.teardown() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocator_api2::alloc::Global;
    use pretty_assertions::assert_eq;

    #[test]
    fn interning_deduplicates_by_content() {
        let mut heap = Heap::new(Global);
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        let c = heap.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // SAFETY: heap is alive for the duration of this test.
        assert_eq!(unsafe { a.as_ref().as_str() }, "hello");
    }

    #[test]
    fn line_for_offset_picks_largest_not_exceeding() {
        let mut heap = Heap::new(Global);
        let ptr = heap.alloc_bytecode(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            alloc::vec![
                LineInfoEntry { offset: 0, line: 1 },
                LineInfoEntry { offset: 3, line: 2 },
            ],
        );
        // SAFETY: heap is alive for the duration of this test.
        let object = unsafe { ptr.as_ref() };
        assert_eq!(object.line_for_offset(0), Some(1));
        assert_eq!(object.line_for_offset(2), Some(1));
        assert_eq!(object.line_for_offset(3), Some(2));
        assert_eq!(object.line_for_offset(100), Some(2));
    }
}
