//! Minimal pickle (protocol 2) encoder for PyTorch state dicts.
//!
//! Emits only the opcodes `torch.load` needs to rebuild a dict of tensors
//! whose storages live in separate archive records.

/// Pickle opcodes used by the encoder.
mod op {
    pub const PROTO: u8 = 0x80;
    pub const STOP: u8 = b'.';
    pub const MARK: u8 = b'(';
    pub const TUPLE: u8 = b't';
    pub const EMPTY_TUPLE: u8 = b')';
    pub const EMPTY_DICT: u8 = b'}';
    pub const SETITEMS: u8 = b'u';
    pub const GLOBAL: u8 = b'c';
    pub const REDUCE: u8 = b'R';
    pub const BINPERSID: u8 = b'Q';
    pub const BINUNICODE: u8 = b'X';
    pub const BININT: u8 = b'J';
    pub const BININT1: u8 = b'K';
    pub const BININT2: u8 = b'M';
    pub const LONG1: u8 = 0x8a;
    pub const NEWFALSE: u8 = 0x89;
}

/// Storage reference for one tensor: `(storage, typename, key, location, numel)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRef<'a> {
    pub storage_type: &'a str,
    pub key: &'a str,
    pub numel: usize,
}

/// Append-only pickle byte stream.
#[derive(Debug, Default)]
pub struct Pickler {
    buf: Vec<u8>,
}

impl Pickler {
    /// Start a protocol 2 stream.
    pub fn new() -> Self {
        Self { buf: vec![op::PROTO, 2] }
    }

    pub fn mark(&mut self) {
        self.buf.push(op::MARK);
    }

    pub fn tuple(&mut self) {
        self.buf.push(op::TUPLE);
    }

    pub fn empty_tuple(&mut self) {
        self.buf.push(op::EMPTY_TUPLE);
    }

    pub fn empty_dict(&mut self) {
        self.buf.push(op::EMPTY_DICT);
    }

    pub fn set_items(&mut self) {
        self.buf.push(op::SETITEMS);
    }

    pub fn reduce(&mut self) {
        self.buf.push(op::REDUCE);
    }

    pub fn persistent_id(&mut self) {
        self.buf.push(op::BINPERSID);
    }

    pub fn bool_false(&mut self) {
        self.buf.push(op::NEWFALSE);
    }

    /// Push `module.name` onto the stack.
    pub fn global(&mut self, module: &str, name: &str) {
        self.buf.push(op::GLOBAL);
        self.buf.extend_from_slice(module.as_bytes());
        self.buf.push(b'\n');
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.push(b'\n');
    }

    pub fn string(&mut self, s: &str) {
        self.buf.push(op::BINUNICODE);
        self.buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Push an integer with the smallest encoding.
    pub fn int(&mut self, v: i64) {
        if (0..=0xff).contains(&v) {
            self.buf.push(op::BININT1);
            self.buf.push(v as u8);
        } else if (0..=0xffff).contains(&v) {
            self.buf.push(op::BININT2);
            self.buf.extend_from_slice(&(v as u16).to_le_bytes());
        } else if i32::try_from(v).is_ok() {
            self.buf.push(op::BININT);
            self.buf.extend_from_slice(&(v as i32).to_le_bytes());
        } else {
            let bytes = long_bytes(v);
            self.buf.push(op::LONG1);
            self.buf.push(bytes.len() as u8);
            self.buf.extend_from_slice(&bytes);
        }
    }

    /// Push a tuple of integers.
    pub fn int_tuple(&mut self, values: &[usize]) {
        if values.is_empty() {
            self.empty_tuple();
            return;
        }
        self.mark();
        for &v in values {
            self.int(v as i64);
        }
        self.tuple();
    }

    /// Push `collections.OrderedDict()`.
    pub fn empty_ordered_dict(&mut self) {
        self.global("collections", "OrderedDict");
        self.empty_tuple();
        self.reduce();
    }

    /// Push a tensor rebuilt by `torch._utils._rebuild_tensor_v2` from a
    /// contiguous storage.
    pub fn tensor(&mut self, storage: &StorageRef<'_>, shape: &[usize]) {
        self.global("torch._utils", "_rebuild_tensor_v2");
        self.mark();

        self.mark();
        self.string("storage");
        self.global("torch", storage.storage_type);
        self.string(storage.key);
        self.string("cpu");
        self.int(storage.numel as i64);
        self.tuple();
        self.persistent_id();

        self.int(0);
        self.int_tuple(shape);
        self.int_tuple(&contiguous_strides(shape));
        self.bool_false();
        self.empty_ordered_dict();

        self.tuple();
        self.reduce();
    }

    /// Terminate the stream and return its bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(op::STOP);
        self.buf
    }
}

/// Minimal two's-complement little-endian encoding for LONG1.
fn long_bytes(v: i64) -> Vec<u8> {
    let mut bytes = v.to_le_bytes().to_vec();
    while bytes.len() > 1 {
        let last = bytes[bytes.len() - 1];
        let prev_sign = bytes[bytes.len() - 2] & 0x80;
        if (last == 0x00 && prev_sign == 0) || (last == 0xff && prev_sign != 0) {
            bytes.pop();
        } else {
            break;
        }
    }
    bytes
}

/// Row-major strides, in elements.
pub fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}
