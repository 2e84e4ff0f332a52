//! End-to-end sessions driving real `/bin/sh` brokers.
//!
//! The broker path is a plain name that the shell sees as `$0`; the script
//! itself comes in through the wrapper prefix.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use kindle_core::{ControlClient, Session, SessionError};
use kindle_model::{ConfigError, EventKind, SessionEvent, StartConfig, Subscribe};
use kindle_pmi::ProtocolError;

#[derive(Default)]
struct Recorder(Mutex<Vec<(SessionEvent, Instant)>>);

impl Recorder {
    fn kinds(&self) -> Vec<EventKind> {
        self.0.lock().unwrap().iter().map(|(e, _)| e.kind).collect()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    fn first(&self, kind: EventKind) -> Option<(SessionEvent, Instant)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(e, _)| e.kind == kind)
            .cloned()
    }
}

impl Subscribe for Recorder {
    fn on_event(&self, event: &SessionEvent) {
        self.0.lock().unwrap().push((event.clone(), Instant::now()));
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn config(size: u32, script: &str) -> StartConfig {
    StartConfig::default()
        .with_size(size)
        .with_wrap(["/bin/sh", "-c", script])
        .with_broker("kindle-broker")
}

fn session(cfg: StartConfig) -> (Session, Arc<Recorder>) {
    let rec = Arc::new(Recorder::default());
    let session = Session::new(cfg).unwrap().with_subscriber(rec.clone());
    (session, rec)
}

async fn run(cfg: StartConfig) -> (Result<i32, SessionError>, Arc<Recorder>) {
    let (mut session, rec) = session(cfg);
    let res = session.run().await;
    session.shutdown().unwrap();
    (res, rec)
}

#[tokio::test]
async fn all_brokers_exit_cleanly() {
    let (res, rec) = run(config(3, "exit 0")).await;
    assert_eq!(res.unwrap(), 0);
    assert_eq!(rec.count(EventKind::ClientSpawned), 3);
    assert_eq!(rec.count(EventKind::ClientCompleted), 3);
    assert_eq!(rec.count(EventKind::KillTimerFired), 0);
    assert_eq!(rec.kinds().last(), Some(&EventKind::SessionFinished));
}

#[tokio::test]
async fn exit_code_is_the_maximum() {
    let script = r#"[ "$PMI_RANK" = 1 ] && exit 5; exit 0"#;
    let (res, _) = run(config(3, script)).await;
    assert_eq!(res.unwrap(), 5);
}

#[tokio::test]
async fn signal_death_dominates_exit_codes() {
    let script = r#"if [ "$PMI_RANK" = 0 ]; then kill -9 $$; fi; exit 3"#;
    let (res, rec) = run(config(2, script)).await;
    assert_eq!(res.unwrap(), 137);

    let (exited, _) = rec
        .0
        .lock()
        .unwrap()
        .iter()
        .find(|(e, _)| e.kind == EventKind::ClientExited && e.rank == Some(0))
        .cloned()
        .unwrap();
    assert_eq!(exited.status, Some(137));
    assert_eq!(exited.reason.as_deref(), Some("Killed"));
}

#[tokio::test]
async fn kill_timer_reaps_survivors() {
    let script = r#"[ "$PMI_RANK" = 0 ] && exit 0; exec sleep 30"#;
    let timeout = Duration::from_millis(300);
    let started = Instant::now();
    let (res, rec) = run(config(3, script).with_kill_timeout(timeout)).await;

    assert_eq!(res.unwrap(), 137);
    assert!(started.elapsed() < Duration::from_secs(10));

    let (_, armed) = rec.first(EventKind::KillTimerArmed).unwrap();
    let (fired, at) = rec.first(EventKind::KillTimerFired).unwrap();
    assert!(at.duration_since(armed) >= timeout);
    assert_eq!(fired.remaining, Some(2));
}

#[tokio::test]
async fn timer_is_disarmed_when_everyone_leaves() {
    let script = r#"[ "$PMI_RANK" = 0 ] && exit 0; sleep 1; exit 0"#;
    let started = Instant::now();
    let (res, rec) = run(config(3, script)).await;

    assert_eq!(res.unwrap(), 0);
    assert!(started.elapsed() < Duration::from_secs(15));
    assert_eq!(rec.count(EventKind::KillTimerArmed), 1);
    assert_eq!(rec.count(EventKind::KillTimerDisarmed), 1);
    assert_eq!(rec.count(EventKind::KillTimerFired), 0);
}

#[tokio::test]
async fn status_lists_live_brokers_in_rank_order() {
    let script = r#"[ "$PMI_RANK" -lt 3 ] && exit 0; exec sleep 3"#;
    let (mut session, _) = session(config(5, script));
    let path = session.control_path().to_path_buf();

    let poll = async {
        let mut client = ControlClient::connect(&path).await.unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let pids = client.status().await.unwrap();
            if pids.len() == 2 || Instant::now() > deadline {
                return pids;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    let (res, live) = tokio::join!(session.run(), poll);

    assert_eq!(res.unwrap(), 0);
    assert_eq!(live.len(), 2);
    assert!(live[0] != live[1]);

    // Still served after the loop returned, with nothing live.
    let mut client = ControlClient::connect(&path).await.unwrap();
    assert!(client.status().await.unwrap().is_empty());
    client.disconnect().await.unwrap();

    session.shutdown().unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn missing_broker_counts_as_127() {
    let cfg = StartConfig::default()
        .with_size(1)
        .with_broker("/nonexistent/kindle-broker")
        .with_kill_timeout(Duration::ZERO);
    let (mut session, rec) = session(cfg);
    let dir = session.scratch_path().to_path_buf();
    let res = session.run().await;
    session.shutdown().unwrap();

    assert_eq!(res.unwrap(), 127);
    assert_eq!(rec.count(EventKind::ClientFailed), 1);
    assert_eq!(rec.count(EventKind::ClientSpawned), 0);
    assert_eq!(rec.count(EventKind::KillTimerArmed), 0);
    assert!(!dir.exists());
}

#[tokio::test]
async fn zero_timeout_kills_on_first_departure() {
    let script = r#"[ "$PMI_RANK" = 0 ] && exit 0; exec sleep 30"#;
    let started = Instant::now();
    let (res, rec) = run(config(3, script).with_kill_timeout(Duration::ZERO)).await;

    assert_eq!(res.unwrap(), 137);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(rec.count(EventKind::ClientCompleted), 3);
    assert!(rec.count(EventKind::KillTimerFired) >= 1);
}

const PMI_SCRIPT: &str = r#"
pmi() { printf '%s\n' "$1" >&3; read -r reply <&3; }
pmi "cmd=init pmi_version=1 pmi_subversion=1"
[ "$reply" = "cmd=response_to_init rc=0 pmi_version=1 pmi_subversion=1" ] || exit 10
pmi "cmd=put kvsname=- key=card$PMI_RANK value=hello$PMI_RANK"
[ "$reply" = "cmd=put_result rc=0" ] || exit 11
pmi "cmd=barrier_in"
[ "$reply" = "cmd=barrier_out rc=0" ] || exit 12
peer=$(( (PMI_RANK + 1) % PMI_SIZE ))
pmi "cmd=get kvsname=- key=card$peer"
[ "$reply" = "cmd=get_result rc=0 value=hello$peer" ] || exit 13
pmi "cmd=get kvsname=- key=PMI_process_mapping"
[ "$reply" = "cmd=get_result rc=0 value=$EXPECT_MAPPING" ] || exit 14
pmi "cmd=finalize"
[ "$reply" = "cmd=finalize_ack rc=0" ] || exit 15
exit 0
"#;

#[tokio::test]
async fn brokers_exchange_keys_through_the_bootstrap_server() {
    let script = format!("EXPECT_MAPPING='(vector,(0,1,2))'\n{PMI_SCRIPT}");
    let mut cfg = config(2, &script);
    cfg.trace_pmi = true;
    let (res, rec) = run(cfg).await;
    assert_eq!(res.unwrap(), 0);
    assert_eq!(rec.count(EventKind::BootstrapFinished), 2);
}

#[tokio::test]
async fn noclique_leaves_the_mapping_unset() {
    let script = r#"
printf 'cmd=get kvsname=- key=PMI_process_mapping\n' >&3
read -r reply <&3
[ "$reply" = "cmd=get_result rc=-1" ] || exit 20
"#;
    let mut cfg = config(1, script);
    cfg.noclique = true;
    let (res, _) = run(cfg).await;
    assert_eq!(res.unwrap(), 0);
}

#[tokio::test]
async fn protocol_violation_kills_everyone() {
    let script = r#"[ "$PMI_RANK" = 0 ] && printf 'cmd=spawn nprocs=4\n' >&3; exec sleep 30"#;
    let started = Instant::now();
    let (res, _) = run(config(2, script)).await;

    assert!(matches!(
        res,
        Err(SessionError::Protocol(ProtocolError::UnknownCommand { rank: 0, .. }))
    ));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn noexec_spawns_nothing() {
    let mut cfg = config(4, "exit 1");
    cfg.noexec = true;
    cfg.verbose = true;
    let (res, rec) = run(cfg).await;
    assert_eq!(res.unwrap(), 0);
    assert_eq!(rec.count(EventKind::ClientSpawned), 0);
}

#[tokio::test]
async fn invalid_config_fails_before_anything_exists() {
    assert!(matches!(
        Session::new(config(0, "exit 0")),
        Err(SessionError::Config(ConfigError::InvalidSize))
    ));
    assert!(matches!(
        Session::new(StartConfig::default().with_broker("kindle-broker")),
        Err(SessionError::NoRanks)
    ));
}

#[tokio::test]
async fn owned_scratch_area_is_removed_at_shutdown() {
    let (session, _) = session(config(1, "exit 0"));
    let dir = session.scratch_path().to_path_buf();
    assert!(dir.is_dir());
    assert!(session.control_path().starts_with(&dir));
    session.shutdown().unwrap();
    assert!(!dir.exists());
}

#[tokio::test]
async fn brokers_see_their_rundir_and_uri() {
    let script = r#"
case "$KINDLE_START_URI" in local://*/start) ;; *) exit 1 ;; esac
uri=${KINDLE_START_URI#local://}
[ "$1" = "--setattr=rundir=${uri%/start}" ] || exit 2
[ "$PMI_FD" = 3 ] || exit 3
[ "$PMI_SIZE" = 2 ] || exit 4
exit 0
"#;
    let (res, _) = run(config(2, script)).await;
    assert_eq!(res.unwrap(), 0);
}
