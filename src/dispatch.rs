//! Token-list → engine-operation table, shaping replies into the RESP
//! reply subset this server speaks. Table-driven: each entry carries only
//! a name, a minimum arity, and a plain handler function, with no
//! bulk/inline framing distinction or OOM-denial flag since none of these
//! commands need either.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::keyspace::Store;
use crate::value::Bytes;

/// A reply shaped per the RESP reply subset this server speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Vec<Bytes>),
}

impl Reply {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Reply::Simple(s) => format!("+{s}\r\n").into_bytes(),
            Reply::Error(s) => format!("-{s}\r\n").into_bytes(),
            Reply::Integer(n) => format!(":{n}\r\n").into_bytes(),
            Reply::Bulk(None) => b"$-1\r\n".to_vec(),
            Reply::Bulk(Some(b)) => {
                let mut out = format!("${}\r\n", b.len()).into_bytes();
                out.extend_from_slice(b);
                out.extend_from_slice(b"\r\n");
                out
            }
            Reply::Array(items) => {
                let mut out = format!("*{}\r\n", items.len()).into_bytes();
                for item in items {
                    out.extend_from_slice(format!("${}\r\n", item.len()).as_bytes());
                    out.extend_from_slice(item);
                    out.extend_from_slice(b"\r\n");
                }
                out
            }
        }
    }
}

type CommandProc = fn(&Store, &[Bytes]) -> Reply;

struct Command {
    arity: usize,
    proc: CommandProc,
}

static CMD_TABLE: Lazy<HashMap<&'static str, Command>> = Lazy::new(|| {
    HashMap::from([
        ("ping", Command { arity: 1, proc: ping_command }),
        ("set", Command { arity: 3, proc: set_command }),
        ("get", Command { arity: 2, proc: get_command }),
        ("del", Command { arity: 2, proc: del_command }),
        ("type", Command { arity: 2, proc: type_command }),
        ("lpush", Command { arity: 3, proc: lpush_command }),
        ("rpush", Command { arity: 3, proc: rpush_command }),
        ("lpop", Command { arity: 2, proc: lpop_command }),
        ("rpop", Command { arity: 2, proc: rpop_command }),
        ("lindex", Command { arity: 3, proc: lindex_command }),
        ("llen", Command { arity: 2, proc: llen_command }),
        ("lrange", Command { arity: 4, proc: lrange_command }),
        ("sadd", Command { arity: 3, proc: sadd_command }),
        ("sismember", Command { arity: 3, proc: sismember_command }),
        ("srem", Command { arity: 3, proc: srem_command }),
        ("scard", Command { arity: 2, proc: scard_command }),
        ("smembers", Command { arity: 2, proc: smembers_command }),
        ("hset", Command { arity: 4, proc: hset_command }),
        ("hget", Command { arity: 3, proc: hget_command }),
        ("hexists", Command { arity: 3, proc: hexists_command }),
        ("hdel", Command { arity: 3, proc: hdel_command }),
        ("hlen", Command { arity: 2, proc: hlen_command }),
        ("hkeys", Command { arity: 2, proc: hkeys_command }),
        ("hvals", Command { arity: 2, proc: hvals_command }),
        ("hgetall", Command { arity: 2, proc: hgetall_command }),
    ])
});

/// Unknown commands and arity violations never reach the engine at all.
pub fn dispatch(store: &Store, tokens: &[Bytes]) -> Reply {
    let Some(first) = tokens.first() else {
        return Reply::Error("ERR empty command".to_string());
    };
    let name = String::from_utf8_lossy(first).to_ascii_lowercase();

    match CMD_TABLE.get(name.as_str()) {
        None => Reply::Error(format!("ERR unknown command '{name}'")),
        Some(cmd) => {
            if tokens.len() < cmd.arity {
                Reply::Error(format!("ERR wrong number of arguments for '{name}' command"))
            } else {
                (cmd.proc)(store, tokens)
            }
        }
    }
}

fn parse_i64(tok: &[u8]) -> Result<i64, Reply> {
    std::str::from_utf8(tok)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Reply::Error("ERR value is not an integer or out of range".to_string()))
}

fn wrong_type(e: crate::error::EngineError) -> Reply {
    Reply::Error(e.to_string())
}

fn ping_command(_store: &Store, _tokens: &[Bytes]) -> Reply {
    Reply::Simple("PONG".to_string())
}

fn set_command(store: &Store, tokens: &[Bytes]) -> Reply {
    store.set(&tokens[1], tokens[2].clone());
    Reply::Simple("OK".to_string())
}

fn get_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.get(&tokens[1]) {
        Ok(v) => Reply::Bulk(v),
        Err(e) => wrong_type(e),
    }
}

fn del_command(store: &Store, tokens: &[Bytes]) -> Reply {
    // Reply is unconditionally :1, whether or not the key actually existed.
    store.del(&tokens[1]);
    Reply::Integer(1)
}

fn type_command(store: &Store, tokens: &[Bytes]) -> Reply {
    Reply::Simple(store.type_of(&tokens[1]).to_string())
}

fn lpush_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.lpush(&tokens[1], tokens[2].clone()) {
        Ok(n) => Reply::Integer(n),
        Err(e) => wrong_type(e),
    }
}

fn rpush_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.rpush(&tokens[1], tokens[2].clone()) {
        Ok(n) => Reply::Integer(n),
        Err(e) => wrong_type(e),
    }
}

fn lpop_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.lpop(&tokens[1]) {
        Ok(v) => Reply::Bulk(v),
        Err(e) => wrong_type(e),
    }
}

fn rpop_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.rpop(&tokens[1]) {
        Ok(v) => Reply::Bulk(v),
        Err(e) => wrong_type(e),
    }
}

fn lindex_command(store: &Store, tokens: &[Bytes]) -> Reply {
    let idx = match parse_i64(&tokens[2]) {
        Ok(i) => i,
        Err(r) => return r,
    };
    match store.lindex(&tokens[1], idx) {
        Ok(v) => Reply::Bulk(v),
        Err(e) => wrong_type(e),
    }
}

fn llen_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.llen(&tokens[1]) {
        Ok(n) => Reply::Integer(n),
        Err(e) => wrong_type(e),
    }
}

fn lrange_command(store: &Store, tokens: &[Bytes]) -> Reply {
    let start = match parse_i64(&tokens[2]) {
        Ok(i) => i,
        Err(r) => return r,
    };
    let end = match parse_i64(&tokens[3]) {
        Ok(i) => i,
        Err(r) => return r,
    };
    match store.lrange(&tokens[1], start, end) {
        Ok(v) => Reply::Array(v),
        Err(e) => wrong_type(e),
    }
}

fn sadd_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.sadd(&tokens[1], tokens[2].clone()) {
        Ok(true) => Reply::Integer(1),
        Ok(false) => Reply::Integer(0),
        Err(e) => wrong_type(e),
    }
}

fn sismember_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.sismember(&tokens[1], &tokens[2]) {
        Ok(true) => Reply::Integer(1),
        Ok(false) => Reply::Integer(0),
        Err(e) => wrong_type(e),
    }
}

fn srem_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.srem(&tokens[1], &tokens[2]) {
        Ok(true) => Reply::Integer(1),
        Ok(false) => Reply::Integer(0),
        Err(e) => wrong_type(e),
    }
}

fn scard_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.scard(&tokens[1]) {
        Ok(n) => Reply::Integer(n),
        Err(e) => wrong_type(e),
    }
}

fn smembers_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.smembers(&tokens[1]) {
        Ok(v) => Reply::Array(v),
        Err(e) => wrong_type(e),
    }
}

fn hset_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.hset(&tokens[1], tokens[2].clone(), tokens[3].clone()) {
        Ok(true) => Reply::Integer(1),
        Ok(false) => Reply::Integer(0),
        Err(e) => wrong_type(e),
    }
}

fn hget_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.hget(&tokens[1], &tokens[2]) {
        Ok(v) => Reply::Bulk(v),
        Err(e) => wrong_type(e),
    }
}

fn hexists_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.hexists(&tokens[1], &tokens[2]) {
        Ok(true) => Reply::Integer(1),
        Ok(false) => Reply::Integer(0),
        Err(e) => wrong_type(e),
    }
}

fn hdel_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.hdel(&tokens[1], &tokens[2]) {
        Ok(true) => Reply::Integer(1),
        Ok(false) => Reply::Integer(0),
        Err(e) => wrong_type(e),
    }
}

fn hlen_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.hlen(&tokens[1]) {
        Ok(n) => Reply::Integer(n),
        Err(e) => wrong_type(e),
    }
}

fn hkeys_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.hkeys(&tokens[1]) {
        Ok(v) => Reply::Array(v),
        Err(e) => wrong_type(e),
    }
}

fn hvals_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.hvals(&tokens[1]) {
        Ok(v) => Reply::Array(v),
        Err(e) => wrong_type(e),
    }
}

fn hgetall_command(store: &Store, tokens: &[Bytes]) -> Reply {
    match store.hgetall(&tokens[1]) {
        Ok(v) => Reply::Array(v),
        Err(e) => wrong_type(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        s.as_bytes().to_vec()
    }

    fn toks(args: &[&str]) -> Vec<Bytes> {
        args.iter().map(|s| b(s)).collect()
    }

    #[test]
    fn scenario_string_basics() {
        let s = Store::new(1000, 10_000);
        assert_eq!(dispatch(&s, &toks(&["SET", "greet", "hello"])).to_bytes(), b"+OK\r\n");
        assert_eq!(dispatch(&s, &toks(&["GET", "greet"])).to_bytes(), b"$5\r\nhello\r\n");
        assert_eq!(dispatch(&s, &toks(&["DEL", "greet"])).to_bytes(), b":1\r\n");
        assert_eq!(dispatch(&s, &toks(&["GET", "greet"])).to_bytes(), b"$-1\r\n");
    }

    #[test]
    fn scenario_type_mismatch() {
        let s = Store::new(1000, 10_000);
        assert_eq!(dispatch(&s, &toks(&["SET", "a", "1"])).to_bytes(), b"+OK\r\n");
        assert_eq!(
            dispatch(&s, &toks(&["LPUSH", "a", "2"])).to_bytes(),
            b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n".to_vec()
        );
    }

    #[test]
    fn scenario_list_range() {
        let s = Store::new(1000, 10_000);
        assert_eq!(dispatch(&s, &toks(&["RPUSH", "l", "x"])).to_bytes(), b":1\r\n");
        assert_eq!(dispatch(&s, &toks(&["RPUSH", "l", "y"])).to_bytes(), b":2\r\n");
        assert_eq!(dispatch(&s, &toks(&["RPUSH", "l", "z"])).to_bytes(), b":3\r\n");
        assert_eq!(
            dispatch(&s, &toks(&["LRANGE", "l", "0", "-1"])).to_bytes(),
            b"*3\r\n$1\r\nx\r\n$1\r\ny\r\n$1\r\nz\r\n".to_vec()
        );
        assert_eq!(dispatch(&s, &toks(&["LINDEX", "l", "-1"])).to_bytes(), b"$1\r\nz\r\n");
    }

    #[test]
    fn scenario_set_dedup_and_empty_removal() {
        let s = Store::new(1000, 10_000);
        assert_eq!(dispatch(&s, &toks(&["SADD", "s", "a"])).to_bytes(), b":1\r\n");
        assert_eq!(dispatch(&s, &toks(&["SADD", "s", "a"])).to_bytes(), b":0\r\n");
        assert_eq!(dispatch(&s, &toks(&["SREM", "s", "a"])).to_bytes(), b":1\r\n");
        assert_eq!(dispatch(&s, &toks(&["TYPE", "s"])).to_bytes(), b"+none\r\n");
    }

    #[test]
    fn scenario_hash_round_trip() {
        let s = Store::new(1000, 10_000);
        assert_eq!(dispatch(&s, &toks(&["HSET", "u", "name", "alice"])).to_bytes(), b":1\r\n");
        assert_eq!(dispatch(&s, &toks(&["HSET", "u", "name", "alice"])).to_bytes(), b":0\r\n");
        assert_eq!(dispatch(&s, &toks(&["HGET", "u", "name"])).to_bytes(), b"$5\r\nalice\r\n");
        assert_eq!(dispatch(&s, &toks(&["HLEN", "u"])).to_bytes(), b":1\r\n");
    }

    #[test]
    fn scenario_eviction_at_small_capacity() {
        let s = Store::new(2, 10_000);
        dispatch(&s, &toks(&["SET", "k1", "v1"]));
        dispatch(&s, &toks(&["SET", "k2", "v2"]));
        dispatch(&s, &toks(&["SET", "k3", "v3"]));
        assert_eq!(dispatch(&s, &toks(&["GET", "k1"])).to_bytes(), b"$-1\r\n");
        assert_eq!(dispatch(&s, &toks(&["GET", "k2"])).to_bytes(), b"$2\r\nv2\r\n");
        assert_eq!(dispatch(&s, &toks(&["GET", "k3"])).to_bytes(), b"$2\r\nv3\r\n");
    }

    #[test]
    fn unknown_command_and_arity_errors() {
        let s = Store::new(1000, 10_000);
        assert_eq!(
            dispatch(&s, &toks(&["FROBNICATE", "x"])).to_bytes(),
            b"-ERR unknown command 'frobnicate'\r\n".to_vec()
        );
        assert_eq!(
            dispatch(&s, &toks(&["SET", "onlykey"])).to_bytes(),
            b"-ERR wrong number of arguments for 'set' command\r\n".to_vec()
        );
    }

    #[test]
    fn case_insensitive_command_names() {
        let s = Store::new(1000, 10_000);
        assert_eq!(dispatch(&s, &toks(&["ping"])).to_bytes(), b"+PONG\r\n");
        assert_eq!(dispatch(&s, &toks(&["PiNg"])).to_bytes(), b"+PONG\r\n");
    }

    #[test]
    fn missing_key_defaults_match_wire_table() {
        let s = Store::new(1000, 10_000);
        assert_eq!(dispatch(&s, &toks(&["LLEN", "nope"])).to_bytes(), b":0\r\n");
        assert_eq!(dispatch(&s, &toks(&["LRANGE", "nope", "0", "-1"])).to_bytes(), b"*0\r\n");
        assert_eq!(dispatch(&s, &toks(&["SCARD", "nope"])).to_bytes(), b":0\r\n");
        assert_eq!(dispatch(&s, &toks(&["SISMEMBER", "nope", "x"])).to_bytes(), b":0\r\n");
        assert_eq!(dispatch(&s, &toks(&["SMEMBERS", "nope"])).to_bytes(), b"*0\r\n");
        assert_eq!(dispatch(&s, &toks(&["HLEN", "nope"])).to_bytes(), b":0\r\n");
        assert_eq!(dispatch(&s, &toks(&["HGETALL", "nope"])).to_bytes(), b"*0\r\n");
        assert_eq!(dispatch(&s, &toks(&["TYPE", "nope"])).to_bytes(), b"+none\r\n");
    }
}
