use std::collections::HashMap;

/// Storage behind the bootstrap `put`/`get` commands.
pub trait KvsBackend {
    /// Insert or overwrite `key`.
    fn put(&mut self, key: &str, value: &str);

    /// Current value of `key`; `None` is a normal answer before anyone published it.
    fn get(&self, key: &str) -> Option<&str>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store shared by every rank of one session.
#[derive(Debug, Default, Clone)]
pub struct BootstrapKvs {
    entries: HashMap<String, String>,
}

impl BootstrapKvs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvsBackend for BootstrapKvs {
    fn put(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
