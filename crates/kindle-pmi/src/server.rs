use kindle_model::Rank;
use tracing::{debug, info};

use crate::{
    error::ProtocolError,
    kvs::{BootstrapKvs, KvsBackend},
    wire::{self, KEYLEN_MAX, KVSNAME_MAX, Request, VALLEN_MAX},
};

const PMI_VERSION: &str = "1";
const PMI_SUBVERSION: &str = "1";
const RC_OK: &str = "0";
const RC_FAIL: &str = "-1";

/// Static parameters of a bootstrap server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Number of ranks taking part; also the barrier width.
    pub size: u32,
    pub appnum: i32,
    pub kvsname: String,
    /// Echo every request and response under the `kindle.pmi.trace` target.
    pub trace: bool,
}

impl ServerConfig {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            appnum: 0,
            kvsname: "-".to_string(),
            trace: false,
        }
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

/// Whether the requester's bootstrap conversation is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// More requests are expected on this channel.
    Pending,
    /// The requester finalized; its channel may be closed once the reply is sent.
    Finished,
}

/// A response line addressed to one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound<C> {
    pub client: C,
    pub rank: Rank,
    pub line: String,
}

/// Result of one request: the outcome for the requester plus every line to deliver.
///
/// A barrier release addresses all participants, so `messages` may name
/// clients other than the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<C> {
    pub outcome: Outcome,
    pub messages: Vec<Outbound<C>>,
}

/// PMI-1 simple server.
///
/// `C` is the caller's correlation token for a client; it is handed back in
/// [`Outbound`] so the caller knows where to write.
pub struct SimpleServer<C, K = BootstrapKvs> {
    cfg: ServerConfig,
    kvs: K,
    barrier: Vec<(C, Rank)>,
}

impl<C, K> SimpleServer<C, K>
where
    C: Copy + Eq,
    K: KvsBackend,
{
    pub fn new(cfg: ServerConfig, kvs: K) -> Self {
        Self {
            cfg,
            kvs,
            barrier: Vec::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.cfg
    }

    pub fn kvs(&self) -> &K {
        &self.kvs
    }

    /// Unconditionally store `key`.
    pub fn put(&mut self, key: &str, value: &str) {
        self.kvs.put(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.kvs.get(key)
    }

    /// Clients currently parked in the barrier.
    pub fn barrier_waiting(&self) -> usize {
        self.barrier.len()
    }

    /// Handle one request line from `client` (protocol identity `rank`).
    pub fn request(
        &mut self,
        line: &str,
        client: C,
        rank: Rank,
    ) -> Result<Reply<C>, ProtocolError> {
        if self.cfg.trace {
            info!(target: "kindle.pmi.trace", "{rank}: <- {}", line.trim_end());
        }

        let req = Request::parse(line).ok_or_else(|| ProtocolError::Malformed {
            rank,
            line: line.trim_end().to_string(),
        })?;

        let mut outcome = Outcome::Pending;
        let messages = match req.cmd {
            "init" => self.reply(
                client,
                rank,
                "response_to_init",
                &[
                    ("rc", RC_OK),
                    ("pmi_version", PMI_VERSION),
                    ("pmi_subversion", PMI_SUBVERSION),
                ],
            ),
            "get_maxes" => self.reply(
                client,
                rank,
                "maxes",
                &[
                    ("rc", RC_OK),
                    ("kvsname_max", KVSNAME_MAX.to_string().as_str()),
                    ("keylen_max", KEYLEN_MAX.to_string().as_str()),
                    ("vallen_max", VALLEN_MAX.to_string().as_str()),
                ],
            ),
            "get_appnum" => self.reply(
                client,
                rank,
                "appnum",
                &[("rc", RC_OK), ("appnum", self.cfg.appnum.to_string().as_str())],
            ),
            "get_universe_size" => self.reply(
                client,
                rank,
                "universe_size",
                &[("rc", RC_OK), ("size", self.cfg.size.to_string().as_str())],
            ),
            "get_my_kvsname" => self.reply(
                client,
                rank,
                "my_kvsname",
                &[("rc", RC_OK), ("kvsname", self.cfg.kvsname.as_str())],
            ),
            "put" => self.handle_put(&req, client, rank)?,
            "get" => self.handle_get(&req, client, rank)?,
            "barrier_in" => self.handle_barrier(client, rank)?,
            "finalize" => {
                outcome = Outcome::Finished;
                self.reply(client, rank, "finalize_ack", &[("rc", RC_OK)])
            }
            "abort" => {
                return Err(ProtocolError::Aborted {
                    rank,
                    message: req.rest.to_string(),
                });
            }
            other => {
                return Err(ProtocolError::UnknownCommand {
                    rank,
                    cmd: other.to_string(),
                });
            }
        };

        if self.cfg.trace {
            for m in &messages {
                info!(target: "kindle.pmi.trace", "{}: -> {}", m.rank, m.line.trim_end());
            }
        }
        Ok(Reply { outcome, messages })
    }

    fn handle_put(
        &mut self,
        req: &Request<'_>,
        client: C,
        rank: Rank,
    ) -> Result<Vec<Outbound<C>>, ProtocolError> {
        let key = required(req, rank, "key")?;
        let value = req.get("value").unwrap_or("");
        if key.len() > KEYLEN_MAX || value.len() > VALLEN_MAX {
            debug!(target: "kindle.pmi", rank, key, "put rejected: key or value too long");
            return Ok(self.reply(client, rank, "put_result", &[("rc", RC_FAIL)]));
        }
        self.kvs.put(key, value);
        Ok(self.reply(client, rank, "put_result", &[("rc", RC_OK)]))
    }

    fn handle_get(
        &mut self,
        req: &Request<'_>,
        client: C,
        rank: Rank,
    ) -> Result<Vec<Outbound<C>>, ProtocolError> {
        let key = required(req, rank, "key")?;
        let line = match self.kvs.get(key) {
            Some(value) => wire::response("get_result", &[("rc", RC_OK), ("value", value)]),
            None => wire::response("get_result", &[("rc", RC_FAIL)]),
        };
        Ok(vec![Outbound { client, rank, line }])
    }

    fn handle_barrier(&mut self, client: C, rank: Rank) -> Result<Vec<Outbound<C>>, ProtocolError> {
        if self.barrier.iter().any(|(c, _)| *c == client) {
            return Err(ProtocolError::DuplicateBarrier { rank });
        }
        self.barrier.push((client, rank));
        if self.barrier.len() < self.cfg.size as usize {
            return Ok(Vec::new());
        }

        debug!(target: "kindle.pmi", size = self.cfg.size, "barrier complete");
        let line = wire::response("barrier_out", &[("rc", RC_OK)]);
        Ok(self
            .barrier
            .drain(..)
            .map(|(client, rank)| Outbound {
                client,
                rank,
                line: line.clone(),
            })
            .collect())
    }

    fn reply(&self, client: C, rank: Rank, cmd: &str, fields: &[(&str, &str)]) -> Vec<Outbound<C>> {
        vec![Outbound {
            client,
            rank,
            line: wire::response(cmd, fields),
        }]
    }
}

fn required<'a>(
    req: &Request<'a>,
    rank: Rank,
    key: &'static str,
) -> Result<&'a str, ProtocolError> {
    req.get(key).ok_or_else(|| ProtocolError::MissingField {
        rank,
        cmd: req.cmd.to_string(),
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MapBlock, PROCESS_MAPPING_KEY, encode_process_mapping};

    fn server(size: u32) -> SimpleServer<Rank> {
        SimpleServer::new(ServerConfig::new(size), BootstrapKvs::new())
    }

    fn single(reply: &Reply<Rank>) -> &str {
        assert_eq!(reply.messages.len(), 1);
        &reply.messages[0].line
    }

    #[test]
    fn init_handshake() {
        let mut srv = server(2);
        let reply = srv
            .request("cmd=init pmi_version=1 pmi_subversion=1\n", 0, 0)
            .unwrap();
        assert_eq!(reply.outcome, Outcome::Pending);
        assert_eq!(
            single(&reply),
            "cmd=response_to_init rc=0 pmi_version=1 pmi_subversion=1\n"
        );
    }

    #[test]
    fn tracing_does_not_change_replies() {
        let script: &[(&str, Rank)] = &[
            ("cmd=init pmi_version=1 pmi_subversion=1", 0),
            ("cmd=init pmi_version=1 pmi_subversion=1", 1),
            ("cmd=put kvsname=- key=card0 value=tcp://a", 0),
            ("cmd=barrier_in", 0),
            ("cmd=barrier_in", 1),
            ("cmd=get kvsname=- key=card0", 1),
            ("cmd=get kvsname=- key=unset", 1),
            ("cmd=finalize", 0),
            ("cmd=finalize", 1),
        ];
        let mut plain = server(2);
        let mut traced =
            SimpleServer::new(ServerConfig::new(2).with_trace(true), BootstrapKvs::new());
        assert!(traced.config().trace);

        for (line, rank) in script {
            let want = plain.request(line, *rank, *rank).unwrap();
            let got = traced.request(line, *rank, *rank).unwrap();
            assert_eq!(got, want, "{line}");
        }
        assert_eq!(traced.get("card0"), Some("tcp://a"));
    }

    #[test]
    fn info_queries() {
        let mut srv = server(3);
        let r = srv.request("cmd=get_maxes", 1, 1).unwrap();
        assert_eq!(
            single(&r),
            "cmd=maxes rc=0 kvsname_max=64 keylen_max=64 vallen_max=1024\n"
        );
        let r = srv.request("cmd=get_universe_size", 1, 1).unwrap();
        assert_eq!(single(&r), "cmd=universe_size rc=0 size=3\n");
        let r = srv.request("cmd=get_appnum", 1, 1).unwrap();
        assert_eq!(single(&r), "cmd=appnum rc=0 appnum=0\n");
        let r = srv.request("cmd=get_my_kvsname", 1, 1).unwrap();
        assert_eq!(single(&r), "cmd=my_kvsname rc=0 kvsname=-\n");
    }

    #[test]
    fn put_then_get_from_another_rank() {
        let mut srv = server(2);
        let r = srv
            .request("cmd=put kvsname=- key=business-card value=tcp://10.0.0.1:99", 0, 0)
            .unwrap();
        assert_eq!(single(&r), "cmd=put_result rc=0\n");

        let r = srv
            .request("cmd=get kvsname=- key=business-card", 1, 1)
            .unwrap();
        assert_eq!(r.messages[0].client, 1);
        assert_eq!(single(&r), "cmd=get_result rc=0 value=tcp://10.0.0.1:99\n");
    }

    #[test]
    fn get_of_unset_key_is_absence_not_error() {
        let mut srv = server(1);
        let r = srv.request("cmd=get kvsname=- key=nope", 0, 0).unwrap();
        assert_eq!(r.outcome, Outcome::Pending);
        assert_eq!(single(&r), "cmd=get_result rc=-1\n");
    }

    #[test]
    fn oversized_put_is_refused_without_storing() {
        let mut srv = server(1);
        let key = "k".repeat(KEYLEN_MAX + 1);
        let r = srv
            .request(&format!("cmd=put kvsname=- key={key} value=v"), 0, 0)
            .unwrap();
        assert_eq!(single(&r), "cmd=put_result rc=-1\n");
        assert!(srv.kvs().is_empty());
    }

    #[test]
    fn barrier_releases_only_when_everyone_entered() {
        let mut srv = server(3);
        assert!(srv.request("cmd=barrier_in", 0, 0).unwrap().messages.is_empty());
        assert!(srv.request("cmd=barrier_in", 2, 2).unwrap().messages.is_empty());
        assert_eq!(srv.barrier_waiting(), 2);

        let r = srv.request("cmd=barrier_in", 1, 1).unwrap();
        let mut released: Vec<_> = r.messages.iter().map(|m| m.client).collect();
        released.sort();
        assert_eq!(released, vec![0, 1, 2]);
        assert!(r.messages.iter().all(|m| m.line == "cmd=barrier_out rc=0\n"));
        assert_eq!(srv.barrier_waiting(), 0);
    }

    #[test]
    fn double_barrier_entry_is_a_protocol_error() {
        let mut srv = server(2);
        srv.request("cmd=barrier_in", 0, 0).unwrap();
        assert!(matches!(
            srv.request("cmd=barrier_in", 0, 0),
            Err(ProtocolError::DuplicateBarrier { rank: 0 })
        ));
    }

    #[test]
    fn finalize_finishes_the_conversation() {
        let mut srv = server(1);
        let r = srv.request("cmd=finalize", 0, 0).unwrap();
        assert_eq!(r.outcome, Outcome::Finished);
        assert_eq!(single(&r), "cmd=finalize_ack rc=0\n");
    }

    #[test]
    fn malformed_and_unknown_requests_fail() {
        let mut srv = server(1);
        assert!(matches!(
            srv.request("garbage", 0, 0),
            Err(ProtocolError::Malformed { .. })
        ));
        assert!(matches!(
            srv.request("cmd=spawn nprocs=2", 0, 0),
            Err(ProtocolError::UnknownCommand { .. })
        ));
        assert!(matches!(
            srv.request("cmd=get kvsname=-", 0, 0),
            Err(ProtocolError::MissingField { key: "key", .. })
        ));
        assert_eq!(
            srv.request("cmd=abort exitcode=1", 0, 0),
            Err(ProtocolError::Aborted {
                rank: 0,
                message: "exitcode=1".into()
            })
        );
    }

    #[test]
    fn clique_descriptor_is_visible_to_every_rank() {
        let mut srv = server(4);
        srv.put(
            PROCESS_MAPPING_KEY,
            &encode_process_mapping(&[MapBlock::single_node(4)]),
        );
        for rank in 0..4 {
            let r = srv
                .request("cmd=get kvsname=- key=PMI_process_mapping", rank, rank)
                .unwrap();
            assert_eq!(single(&r), "cmd=get_result rc=0 value=(vector,(0,1,4))\n");
        }
    }
}
