//! Line codec: `cmd=<name> key=value key=value\n`.

/// Longest key accepted by `put`.
pub const KEYLEN_MAX: usize = 64;
/// Longest value accepted by `put`.
pub const VALLEN_MAX: usize = 1024;
/// Longest kvsname advertised to clients.
pub const KVSNAME_MAX: usize = 64;

/// A decoded request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub cmd: &'a str,
    fields: Vec<(&'a str, &'a str)>,
    /// Everything after the `cmd=` token, untouched.
    pub rest: &'a str,
}

impl<'a> Request<'a> {
    /// Decode one line. Returns `None` unless it starts with a `cmd=` token.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']).trim_start();
        let (first, rest) = match line.split_once(char::is_whitespace) {
            Some((first, rest)) => (first, rest.trim_start()),
            None => (line, ""),
        };
        let cmd = first.strip_prefix("cmd=")?;
        if cmd.is_empty() {
            return None;
        }
        let fields = rest
            .split_whitespace()
            .filter_map(|tok| tok.split_once('='))
            .collect();
        Some(Self { cmd, fields, rest })
    }

    /// Value of `key`; the last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

/// Build a response line (newline terminated).
pub fn response(cmd: &str, fields: &[(&str, &str)]) -> String {
    let mut out = format!("cmd={cmd}");
    for (k, v) in fields {
        out.push_str(&format!(" {k}={v}"));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_and_fields() {
        let req = Request::parse("cmd=put kvsname=kindle key=k0 value=a=b\n").unwrap();
        assert_eq!(req.cmd, "put");
        assert_eq!(req.get("kvsname"), Some("kindle"));
        assert_eq!(req.get("key"), Some("k0"));
        assert_eq!(req.get("value"), Some("a=b"));
        assert_eq!(req.get("missing"), None);
    }

    #[test]
    fn bare_command_has_no_fields() {
        let req = Request::parse("cmd=barrier_in").unwrap();
        assert_eq!(req.cmd, "barrier_in");
        assert_eq!(req.rest, "");
    }

    #[test]
    fn lines_without_cmd_are_rejected() {
        assert!(Request::parse("").is_none());
        assert!(Request::parse("hello world").is_none());
        assert!(Request::parse("cmd= key=x").is_none());
        assert!(Request::parse("mcmd=spawn nprocs=2").is_none());
    }

    #[test]
    fn response_is_newline_terminated() {
        assert_eq!(
            response("put_result", &[("rc", "0")]),
            "cmd=put_result rc=0\n"
        );
        assert_eq!(response("barrier_out", &[]), "cmd=barrier_out\n");
    }
}
