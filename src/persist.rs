//! Load-on-start / flush-on-shutdown snapshot of the keyspace to a flat,
//! self-describing line-oriented file: `<tag> <key> <body>\n` per live
//! key, tags `S`/`L`/`E`/`H` from `value::Value::disk_tag`.
//!
//! A missing file is not an error (`load` simply leaves the store empty);
//! a malformed *line* in an openable file is skipped rather than aborting
//! the whole load.

use std::fs::File;
use std::io::{Read, Write};

use crate::keyspace::Store;
use crate::log::{log, LogLevel};
use crate::value::Value;

/// Returns `true` if the file existed and was read (even if some lines were
/// skipped as malformed).
pub fn load(store: &Store, path: &str) -> bool {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            log(LogLevel::Notice, &format!("no persistence file at '{path}' ({e}), starting empty"));
            return false;
        }
    };

    let mut buf = Vec::new();
    if let Err(e) = file.read_to_end(&mut buf) {
        log(LogLevel::Warning, &format!("failed reading persistence file '{path}': {e}"));
        return false;
    }

    let mut loaded = 0usize;
    let mut skipped = 0usize;
    for line in buf.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some((key, value)) => {
                store.load_entry(key, value);
                loaded += 1;
            }
            None => skipped += 1,
        }
    }

    log(
        LogLevel::Notice,
        &format!("loaded {loaded} keys from '{path}' ({skipped} malformed lines skipped)"),
    );
    true
}

fn parse_line(line: &[u8]) -> Option<(Vec<u8>, Value)> {
    let mut parts = line.splitn(3, |&b| b == b' ');
    let tag = parts.next()?;
    let key = parts.next()?;
    let body = parts.next().unwrap_or(b"");
    if tag.len() != 1 || key.is_empty() {
        return None;
    }
    let value = Value::decode_body(tag[0], body)?;
    Some((key.to_vec(), value))
}

/// Overwrites `path` with a full snapshot of every live key. Not appended,
/// not a log: a clean restart replaces the file entirely.
pub fn save(store: &Store, path: &str) -> bool {
    let snapshot = store.snapshot();

    let mut out = Vec::new();
    for (key, value) in &snapshot {
        out.push(value.disk_tag());
        out.push(b' ');
        out.extend_from_slice(key);
        out.push(b' ');
        out.extend_from_slice(&value.encode_body());
        out.push(b'\n');
    }

    match File::create(path).and_then(|mut f| f.write_all(&out)) {
        Ok(()) => {
            log(LogLevel::Notice, &format!("saved {} keys to '{path}'", snapshot.len()));
            true
        }
        Err(e) => {
            log(LogLevel::Warning, &format!("failed writing persistence file '{path}': {e}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn round_trips_every_variant_through_a_file() {
        let path = std::env::temp_dir().join(format!("blinkdb_persist_test_{}.txt", std::process::id()));
        let path = path.to_str().unwrap();

        let store = Store::new(1000, 10_000);
        store.set(b"greet", b("hello"));
        store.rpush(b"l", b("x")).unwrap();
        store.rpush(b"l", b("y")).unwrap();
        store.sadd(b"s", b("m1")).unwrap();
        store.hset(b"h", b("f"), b("v")).unwrap();

        assert!(save(&store, path));

        let restored = Store::new(1000, 10_000);
        assert!(load(&restored, path));

        assert_eq!(restored.get(b"greet").unwrap(), Some(b("hello")));
        assert_eq!(restored.lrange(b"l", 0, -1).unwrap(), vec![b("x"), b("y")]);
        assert_eq!(restored.smembers(b"s").unwrap(), vec![b("m1")]);
        assert_eq!(restored.hget(b"h", b"f").unwrap(), Some(b("v")));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_loads_as_empty_without_erroring() {
        let store = Store::new(1000, 10_000);
        assert!(!load(&store, "/nonexistent/blinkdb_path_xyz.txt"));
        assert_eq!(store.live_key_count(), 0);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let path = std::env::temp_dir().join(format!("blinkdb_persist_bad_{}.txt", std::process::id()));
        let path = path.to_str().unwrap();
        std::fs::write(path, b"S good hello\nXGARBAGE\nL bad 3:ab,\n").unwrap();

        let store = Store::new(1000, 10_000);
        assert!(load(&store, path));
        assert_eq!(store.get(b"good").unwrap(), Some(b("hello")));
        assert_eq!(store.type_of(b"bad"), crate::value::TYPE_NONE);

        let _ = std::fs::remove_file(path);
    }
}
