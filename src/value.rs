//! The four value kinds a key can be bound to, and their on-disk grammar.
//!
//! A value is a tagged variant rather than a trait object: the keyspace only
//! ever needs {type-tag, serialize, deserialize} to do its job, and every
//! other operation is reached after the caller has already matched on the
//! variant it expects. See redis's own `obj.rs` for the trait-object version
//! this was generalized away from.

use std::collections::{HashMap, HashSet, VecDeque};

pub type Bytes = Vec<u8>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
}

/// The name TYPE reports for a bound key.
pub const TYPE_STRING: &str = "string";
pub const TYPE_LIST: &str = "list";
pub const TYPE_SET: &str = "set";
pub const TYPE_HASH: &str = "hash";
pub const TYPE_NONE: &str = "none";

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => TYPE_STRING,
            Value::List(_) => TYPE_LIST,
            Value::Set(_) => TYPE_SET,
            Value::Hash(_) => TYPE_HASH,
        }
    }

    pub fn is_empty_aggregate(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Hash(h) => h.is_empty(),
        }
    }

    /// Single-byte tag used by the persistence file grammar.
    pub fn disk_tag(&self) -> u8 {
        match self {
            Value::Str(_) => b'S',
            Value::List(_) => b'L',
            Value::Set(_) => b'E',
            Value::Hash(_) => b'H',
        }
    }

    /// Encode the body following the tag. Does not include the leading
    /// `<tag> <key> ` prefix; that's `persist`'s job.
    pub fn encode_body(&self) -> Bytes {
        match self {
            Value::Str(s) => s.clone(),
            Value::List(l) => encode_elements(l.iter()),
            Value::Set(s) => encode_elements(s.iter()),
            Value::Hash(h) => {
                let mut out = Vec::new();
                for (f, v) in h.iter() {
                    out.extend_from_slice(f.len().to_string().as_bytes());
                    out.push(b':');
                    out.extend_from_slice(f);
                    out.push(b':');
                    out.extend_from_slice(v.len().to_string().as_bytes());
                    out.push(b':');
                    out.extend_from_slice(v);
                    out.push(b',');
                }
                out
            }
        }
    }

    /// Decode a body previously produced by `encode_body` for the given tag.
    /// Returns `None` on any malformed body; callers skip the whole line.
    pub fn decode_body(tag: u8, body: &[u8]) -> Option<Value> {
        match tag {
            b'S' => Some(Value::Str(body.to_vec())),
            b'L' => Some(Value::List(decode_elements(body)?.into_iter().collect())),
            b'E' => Some(Value::Set(decode_elements(body)?.into_iter().collect())),
            b'H' => {
                let mut map = HashMap::new();
                let mut rest = body;
                while !rest.is_empty() {
                    let (flen, r) = take_decimal(rest)?;
                    let r = expect_colon(r)?;
                    if r.len() < flen {
                        return None;
                    }
                    let (field, r) = r.split_at(flen);
                    let r = expect_colon(r)?;
                    let (vlen, r) = take_decimal(r)?;
                    let r = expect_colon(r)?;
                    if r.len() < vlen {
                        return None;
                    }
                    let (val, r) = r.split_at(vlen);
                    let r = expect_comma(r)?;
                    map.insert(field.to_vec(), val.to_vec());
                    rest = r;
                }
                Some(Value::Hash(map))
            }
            _ => None,
        }
    }

    // ---- List operations ----

    pub fn as_list(&self) -> Option<&VecDeque<Bytes>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut VecDeque<Bytes>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashSet<Bytes>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut HashSet<Bytes>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }
}

/// Resolve a signed, possibly negative, list/range index against a length.
/// Negative counts from the tail, -1 being the last element.
fn normalize_index(i: i64, len: usize) -> i64 {
    if i < 0 {
        i + len as i64
    } else {
        i
    }
}

/// `LINDEX` semantics: out-of-range is "absent", never an error.
pub fn list_index(list: &VecDeque<Bytes>, i: i64) -> Option<&Bytes> {
    let idx = normalize_index(i, list.len());
    if idx < 0 {
        return None;
    }
    list.get(idx as usize)
}

/// `LRANGE` semantics exactly as specified: normalize both bounds, clamp,
/// and return the empty sequence rather than erroring when start > end.
pub fn list_range(list: &VecDeque<Bytes>, start: i64, end: i64) -> Vec<Bytes> {
    let len = list.len() as i64;
    if len == 0 {
        return Vec::new();
    }
    let mut start = normalize_index(start, list.len());
    let mut end = normalize_index(end, list.len());
    if start < 0 {
        start = 0;
    }
    if end > len - 1 {
        end = len - 1;
    }
    if start > end {
        return Vec::new();
    }
    list.iter()
        .skip(start as usize)
        .take((end - start + 1) as usize)
        .cloned()
        .collect()
}

fn encode_elements<'a, I: Iterator<Item = &'a Bytes>>(elems: I) -> Bytes {
    let mut out = Vec::new();
    for e in elems {
        out.extend_from_slice(e.len().to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(e);
        out.push(b',');
    }
    out
}

fn decode_elements(body: &[u8]) -> Option<Vec<Bytes>> {
    let mut out = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let (len, r) = take_decimal(rest)?;
        let r = expect_colon(r)?;
        if r.len() < len {
            return None;
        }
        let (elem, r) = r.split_at(len);
        let r = expect_comma(r)?;
        out.push(elem.to_vec());
        rest = r;
    }
    Some(out)
}

fn take_decimal(buf: &[u8]) -> Option<(usize, &[u8])> {
    let end = buf.iter().position(|b| !b.is_ascii_digit())?;
    if end == 0 {
        return None;
    }
    let n: usize = std::str::from_utf8(&buf[..end]).ok()?.parse().ok()?;
    Some((n, &buf[end..]))
}

fn expect_colon(buf: &[u8]) -> Option<&[u8]> {
    if buf.first() == Some(&b':') {
        Some(&buf[1..])
    } else {
        None
    }
}

fn expect_comma(buf: &[u8]) -> Option<&[u8]> {
    if buf.first() == Some(&b',') {
        Some(&buf[1..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        s.as_bytes().to_vec()
    }

    #[test]
    fn list_range_normalizes_and_clamps() {
        let mut l = VecDeque::new();
        l.push_back(b("x"));
        l.push_back(b("y"));
        l.push_back(b("z"));
        assert_eq!(list_range(&l, 0, -1), vec![b("x"), b("y"), b("z")]);
        assert_eq!(list_range(&l, -2, -1), vec![b("y"), b("z")]);
        assert_eq!(list_range(&l, 5, 10), Vec::<Bytes>::new());
        assert_eq!(list_range(&l, 2, 0), Vec::<Bytes>::new());
    }

    #[test]
    fn list_index_out_of_range_is_absent_not_error() {
        let mut l = VecDeque::new();
        l.push_back(b("only"));
        assert_eq!(list_index(&l, -1), Some(&b("only")));
        assert_eq!(list_index(&l, 1), None);
        assert_eq!(list_index(&l, -2), None);
    }

    #[test]
    fn list_round_trips_through_disk_grammar() {
        let mut l = VecDeque::new();
        l.push_back(b("x"));
        l.push_back(b("y,z")); // embedded comma must not break framing
        let v = Value::List(l.clone());
        let body = v.encode_body();
        let decoded = Value::decode_body(b'L', &body).unwrap();
        assert_eq!(decoded.as_list().unwrap(), &l);
    }

    #[test]
    fn hash_round_trips_through_disk_grammar() {
        let mut h = HashMap::new();
        h.insert(b("name"), b("alice"));
        h.insert(b("city"), b("nowhere:special"));
        let v = Value::Hash(h.clone());
        let body = v.encode_body();
        let decoded = Value::decode_body(b'H', &body).unwrap();
        assert_eq!(decoded.as_hash().unwrap(), &h);
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(Value::decode_body(b'L', b"3:ab,").is_none());
        assert!(Value::decode_body(b'H', b"1:a:z:b,").is_none());
    }
}
