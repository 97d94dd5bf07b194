//! In-process store speaking RESP2 over TCP, keeping enough of the data
//! model (strings, lists, sets, hashes, expirations, 16 databases,
//! passwords, `SCAN`) for the collections to be exercised end to end.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use skv_client::{ConnectionPool, PoolConfig};

const DATABASES: usize = 16;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

enum Value {
    Str(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    Hash(BTreeMap<String, String>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::List(items) => items.is_empty(),
            Value::Set(members) => members.is_empty(),
            Value::Hash(fields) => fields.is_empty(),
        }
    }
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

struct StoreState {
    databases: Vec<BTreeMap<String, Entry>>,
    password: Option<String>,
}

impl StoreState {
    fn db(&mut self, index: usize) -> &mut BTreeMap<String, Entry> {
        let now = Instant::now();
        let db = &mut self.databases[index];
        db.retain(|_, entry| entry.expires_at.map_or(true, |deadline| deadline > now));
        db
    }
}

enum Reply {
    Simple(&'static str),
    Error(String),
    Int(i64),
    Bulk(Option<String>),
    Array(Vec<Reply>),
}

impl Reply {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Simple(text) => out.extend_from_slice(format!("+{text}\r\n").as_bytes()),
            Reply::Error(text) => out.extend_from_slice(format!("-{text}\r\n").as_bytes()),
            Reply::Int(value) => out.extend_from_slice(format!(":{value}\r\n").as_bytes()),
            Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
            Reply::Bulk(Some(data)) => {
                out.extend_from_slice(format!("${}\r\n{data}\r\n", data.len()).as_bytes())
            }
            Reply::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

fn bulk(text: impl Into<String>) -> Reply {
    Reply::Bulk(Some(text.into()))
}

fn strings(items: impl IntoIterator<Item = String>) -> Reply {
    Reply::Array(items.into_iter().map(bulk).collect())
}

fn wrong_type() -> Reply {
    Reply::Error("WRONGTYPE Operation against a key holding the wrong kind of value".to_string())
}

fn syntax_error() -> Reply {
    Reply::Error("ERR syntax error".to_string())
}

fn not_integer() -> Reply {
    Reply::Error("ERR value is not an integer or out of range".to_string())
}

pub struct FakeStore {
    addr: String,
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    pub fn start() -> Self {
        Self::launch(None)
    }

    pub fn start_with_password(password: &str) -> Self {
        Self::launch(Some(password.to_string()))
    }

    fn launch(password: Option<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let state = Arc::new(Mutex::new(StoreState {
            databases: (0..DATABASES).map(|_| BTreeMap::new()).collect(),
            password,
        }));

        let shared = state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                let state = shared.clone();
                thread::spawn(move || serve(stream, state));
            }
        });

        FakeStore { addr, state }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn pool(&self) -> ConnectionPool {
        ConnectionPool::new(PoolConfig {
            addr: self.addr.clone(),
            read_timeout: Some(Duration::from_secs(2)),
            write_timeout: Some(Duration::from_secs(2)),
            connect_timeout: Some(Duration::from_secs(2)),
            ..PoolConfig::default()
        })
    }

    /// Live keys of `database`, sorted.
    pub fn keys(&self, database: usize) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        state.db(database).keys().cloned().collect()
    }

    /// Stores a raw string, bypassing the client.
    pub fn put(&self, database: usize, key: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        state.db(database).insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
    }
}

struct Session {
    database: usize,
    authenticated: bool,
}

fn serve(stream: TcpStream, state: Arc<Mutex<StoreState>>) {
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(_) => return,
    };
    let mut reader = BufReader::new(stream);
    let mut session = Session {
        database: 0,
        authenticated: state.lock().unwrap().password.is_none(),
    };
    let mut out = Vec::new();

    while let Ok(args) = read_command(&mut reader) {
        let reply = {
            let mut state = state.lock().unwrap();
            dispatch(&mut state, &mut session, &args)
        };
        out.clear();
        reply.encode(&mut out);
        if writer.write_all(&out).and_then(|_| writer.flush()).is_err() {
            return;
        }
    }
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    let count: usize = line
        .trim_end()
        .strip_prefix('*')
        .and_then(|n| n.parse().ok())
        .ok_or(std::io::ErrorKind::InvalidData)?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line)?;
        let len: usize = line
            .trim_end()
            .strip_prefix('$')
            .and_then(|n| n.parse().ok())
            .ok_or(std::io::ErrorKind::InvalidData)?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        data.truncate(len);
        args.push(String::from_utf8_lossy(&data).into_owned());
    }
    Ok(args)
}

fn dispatch(state: &mut StoreState, session: &mut Session, args: &[String]) -> Reply {
    let Some(name) = args.first() else {
        return Reply::Error("ERR empty command".to_string());
    };
    let cmd = name.to_ascii_uppercase();
    let args = &args[1..];

    if cmd == "AUTH" {
        return match (&state.password, args) {
            (None, _) => Reply::Error(
                "ERR AUTH <password> called without any password configured for the default user."
                    .to_string(),
            ),
            (Some(expected), [given]) if given == expected => {
                session.authenticated = true;
                Reply::Simple("OK")
            }
            _ => Reply::Error(
                "WRONGPASS invalid username-password pair or user is disabled.".to_string(),
            ),
        };
    }
    if !session.authenticated {
        return Reply::Error("NOAUTH Authentication required.".to_string());
    }

    match (cmd.as_str(), args) {
        ("PING", []) => Reply::Simple("PONG"),
        ("SELECT", [index]) => match index.parse::<usize>() {
            Ok(index) if index < DATABASES => {
                session.database = index;
                Reply::Simple("OK")
            }
            _ => Reply::Error("ERR DB index is out of range".to_string()),
        },
        _ => data_command(state.db(session.database), &cmd, args),
    }
}

fn data_command(db: &mut BTreeMap<String, Entry>, cmd: &str, args: &[String]) -> Reply {
    let reply = match (cmd, args) {
        ("GET", [key]) => match db.get(key).map(|entry| &entry.value) {
            None => Reply::Bulk(None),
            Some(Value::Str(value)) => bulk(value.clone()),
            Some(_) => wrong_type(),
        },
        ("SET", [key, value, options @ ..]) => {
            let expires_at = match options {
                [] => None,
                [unit, amount] => {
                    let Ok(amount) = amount.parse::<u64>() else {
                        return not_integer();
                    };
                    match unit.to_ascii_uppercase().as_str() {
                        "PX" => Some(Instant::now() + Duration::from_millis(amount)),
                        "EX" => Some(Instant::now() + Duration::from_secs(amount)),
                        _ => return syntax_error(),
                    }
                }
                _ => return syntax_error(),
            };
            db.insert(
                key.clone(),
                Entry {
                    value: Value::Str(value.clone()),
                    expires_at,
                },
            );
            Reply::Simple("OK")
        }
        ("DEL", keys) if !keys.is_empty() => {
            Reply::Int(keys.iter().filter(|key| db.remove(*key).is_some()).count() as i64)
        }
        ("EXISTS", keys) if !keys.is_empty() => {
            Reply::Int(keys.iter().filter(|key| db.contains_key(*key)).count() as i64)
        }
        ("INCR", [key]) => {
            let entry = db.entry(key.clone()).or_insert_with(|| Entry {
                value: Value::Str("0".to_string()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Str(text) => match text.parse::<i64>() {
                    Ok(current) => {
                        *text = (current + 1).to_string();
                        Reply::Int(current + 1)
                    }
                    Err(_) => not_integer(),
                },
                _ => wrong_type(),
            }
        }
        ("PTTL", [key]) => match db.get(key) {
            None => Reply::Int(-2),
            Some(Entry { expires_at: None, .. }) => Reply::Int(-1),
            Some(Entry {
                expires_at: Some(deadline),
                ..
            }) => Reply::Int(deadline.saturating_duration_since(Instant::now()).as_millis() as i64),
        },
        ("PEXPIRE", [key, millis]) => {
            let Ok(millis) = millis.parse::<u64>() else {
                return not_integer();
            };
            match db.get_mut(key) {
                Some(entry) => {
                    entry.expires_at = Some(Instant::now() + Duration::from_millis(millis));
                    Reply::Int(1)
                }
                None => Reply::Int(0),
            }
        }
        ("SCAN", [cursor, options @ ..]) => scan(db, cursor, options),
        ("RPUSH", [key, values @ ..]) if !values.is_empty() => {
            match &mut collection(db, key, || Value::List(VecDeque::new())).value {
                Value::List(items) => {
                    items.extend(values.iter().cloned());
                    Reply::Int(items.len() as i64)
                }
                _ => wrong_type(),
            }
        }
        ("LRANGE", [key, start, stop]) => {
            let (Ok(start), Ok(stop)) = (start.parse::<i64>(), stop.parse::<i64>()) else {
                return not_integer();
            };
            match db.get(key).map(|entry| &entry.value) {
                None => Reply::Array(Vec::new()),
                Some(Value::List(items)) => strings(range(items, start, stop)),
                Some(_) => wrong_type(),
            }
        }
        ("LLEN", [key]) => match db.get(key).map(|entry| &entry.value) {
            None => Reply::Int(0),
            Some(Value::List(items)) => Reply::Int(items.len() as i64),
            Some(_) => wrong_type(),
        },
        ("SADD", [key, members @ ..]) if !members.is_empty() => {
            match &mut collection(db, key, || Value::Set(BTreeSet::new())).value {
                Value::Set(set) => Reply::Int(
                    members
                        .iter()
                        .filter(|member| set.insert((*member).clone()))
                        .count() as i64,
                ),
                _ => wrong_type(),
            }
        }
        ("SISMEMBER", [key, member]) => match db.get(key).map(|entry| &entry.value) {
            None => Reply::Int(0),
            Some(Value::Set(set)) => Reply::Int(set.contains(member) as i64),
            Some(_) => wrong_type(),
        },
        ("SMEMBERS", [key]) => match db.get(key).map(|entry| &entry.value) {
            None => Reply::Array(Vec::new()),
            Some(Value::Set(set)) => strings(set.iter().cloned()),
            Some(_) => wrong_type(),
        },
        ("SCARD", [key]) => match db.get(key).map(|entry| &entry.value) {
            None => Reply::Int(0),
            Some(Value::Set(set)) => Reply::Int(set.len() as i64),
            Some(_) => wrong_type(),
        },
        ("SREM", [key, members @ ..]) if !members.is_empty() => {
            match db.get_mut(key).map(|entry| &mut entry.value) {
                None => Reply::Int(0),
                Some(Value::Set(set)) => {
                    Reply::Int(members.iter().filter(|member| set.remove(*member)).count() as i64)
                }
                Some(_) => wrong_type(),
            }
        }
        ("HSET", [key, field, value]) => {
            match &mut collection(db, key, || Value::Hash(BTreeMap::new())).value {
                Value::Hash(fields) => {
                    Reply::Int(fields.insert(field.clone(), value.clone()).is_none() as i64)
                }
                _ => wrong_type(),
            }
        }
        ("HGET", [key, field]) => match db.get(key).map(|entry| &entry.value) {
            None => Reply::Bulk(None),
            Some(Value::Hash(fields)) => Reply::Bulk(fields.get(field).cloned()),
            Some(_) => wrong_type(),
        },
        ("HEXISTS", [key, field]) => match db.get(key).map(|entry| &entry.value) {
            None => Reply::Int(0),
            Some(Value::Hash(fields)) => Reply::Int(fields.contains_key(field) as i64),
            Some(_) => wrong_type(),
        },
        ("HKEYS", [key]) => match db.get(key).map(|entry| &entry.value) {
            None => Reply::Array(Vec::new()),
            Some(Value::Hash(fields)) => strings(fields.keys().cloned()),
            Some(_) => wrong_type(),
        },
        ("HDEL", [key, fields @ ..]) if !fields.is_empty() => {
            match db.get_mut(key).map(|entry| &mut entry.value) {
                None => Reply::Int(0),
                Some(Value::Hash(stored)) => Reply::Int(
                    fields
                        .iter()
                        .filter(|field| stored.remove(*field).is_some())
                        .count() as i64,
                ),
                Some(_) => wrong_type(),
            }
        }
        _ => Reply::Error(format!("ERR unknown command or wrong arguments for '{cmd}'")),
    };

    // Containers that became empty disappear, as in the real store.
    if let Some(key) = args.first() {
        if db.get(key).map_or(false, |entry| entry.value.is_empty()) {
            db.remove(key);
        }
    }
    reply
}

fn collection<'a>(
    db: &'a mut BTreeMap<String, Entry>,
    key: &str,
    empty: impl FnOnce() -> Value,
) -> &'a mut Entry {
    db.entry(key.to_string()).or_insert_with(|| Entry {
        value: empty(),
        expires_at: None,
    })
}

fn range(items: &VecDeque<String>, start: i64, stop: i64) -> Vec<String> {
    let len = items.len() as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return Vec::new();
    }
    items
        .iter()
        .skip(start as usize)
        .take((stop - start + 1) as usize)
        .cloned()
        .collect()
}

/// Cursor = position in the sorted key space.
fn scan(db: &BTreeMap<String, Entry>, cursor: &str, options: &[String]) -> Reply {
    let Ok(cursor) = cursor.parse::<usize>() else {
        return Reply::Error("ERR invalid cursor".to_string());
    };
    let mut pattern = "*".to_string();
    let mut count = 10usize;
    for pair in options.chunks(2) {
        match pair {
            [name, value] if name.eq_ignore_ascii_case("MATCH") => pattern = value.clone(),
            [name, value] if name.eq_ignore_ascii_case("COUNT") => {
                count = value.parse::<usize>().unwrap_or(10).max(1)
            }
            _ => return syntax_error(),
        }
    }

    let keys: Vec<&String> = db.keys().collect();
    let end = (cursor + count).min(keys.len());
    let page = keys
        .get(cursor..end)
        .unwrap_or_default()
        .iter()
        .filter(|key| glob_match(&pattern, key))
        .map(|key| (*key).clone());
    let next = if end >= keys.len() { 0 } else { end };
    Reply::Array(vec![bulk(next.to_string()), strings(page)])
}

/// Glob matching with `*`, `?` and backslash escapes.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_from(&pattern, &text)
}

fn glob_from(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|skip| glob_from(rest, &text[skip..])),
        Some(('?', rest)) => !text.is_empty() && glob_from(rest, &text[1..]),
        Some(('\\', rest)) if !rest.is_empty() => {
            text.first() == Some(&rest[0]) && glob_from(&rest[1..], &text[1..])
        }
        Some((ch, rest)) => text.first() == Some(ch) && glob_from(rest, &text[1..]),
    }
}
