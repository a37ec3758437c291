//! Worker runs against the in-process gateway

use std::sync::Arc;
use std::time::Duration;

use prost::Message;

use farm_runner::domain::{AccountRepository, LandRepository, NewAccount};
use farm_runner::protocol::messages::{FriendAddedNotify, FriendInfo, LandInfo, LandsNotify};
use farm_runner::scheduler::{AccountWorker, LandSyncRoutine, Worker};

use crate::common::{session_factory, FakeConnector, MemoryStore, TEST_GID};

const WINDOW: Duration = Duration::from_secs(5);

async fn seed(store: &Arc<MemoryStore>) -> i64 {
    store
        .create(&NewAccount {
            code: "test-code".into(),
            platform: "qq".into(),
            name: String::new(),
        })
        .await
        .unwrap()
        .id
}

fn worker(connector: Arc<FakeConnector>, store: &Arc<MemoryStore>) -> AccountWorker {
    let routine = Arc::new(LandSyncRoutine::new(store.clone(), WINDOW));
    AccountWorker::new(session_factory(connector), store.clone(), routine)
}

#[tokio::test(start_paused = true)]
async fn test_worker_records_login_stats_and_pushed_lands() {
    let (connector, mut peers) = FakeConnector::new();
    let store = MemoryStore::new();
    let id = seed(&store).await;
    let worker = worker(connector, &store);

    let gateway = tokio::spawn(async move {
        let mut peer = peers.recv().await.unwrap();
        peer.accept_login().await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        let lands = LandsNotify {
            host_gid: 0,
            lands: vec![
                LandInfo {
                    id: 1,
                    plant_id: 2001,
                    plant_name: "carrot".into(),
                    mature_time: 4_000_000_000,
                    phase: 3,
                },
                LandInfo {
                    id: 2,
                    plant_id: 2002,
                    plant_name: "wheat".into(),
                    mature_time: 4_000_000_600,
                    phase: 2,
                },
            ],
        };
        peer.push("gamepb.plantpb.LandsNotify", lands.encode_to_vec());
        let friends = FriendAddedNotify {
            friends: vec![FriendInfo {
                gid: 77,
                name: "neighbor".into(),
                remark: String::new(),
                level: 5,
            }],
        };
        peer.push("gamepb.friendpb.FriendAddedNotify", friends.encode_to_vec());
        let visited = LandsNotify {
            host_gid: 77,
            lands: vec![LandInfo {
                id: 4,
                plant_id: 2003,
                plant_name: "pumpkin".into(),
                mature_time: 3_900_000_000,
                phase: 3,
            }],
        };
        peer.push("gamepb.plantpb.LandsNotify", visited.encode_to_vec());

        // Hold the connection until the worker hangs up
        while peer.next_request().await.is_some() {}
    });

    worker.run(id).await.unwrap();
    gateway.await.unwrap();

    let account = store.account(id).unwrap();
    assert_eq!(account.gid, Some(TEST_GID));
    assert_eq!(account.name, "farmer");
    assert_eq!(account.level, 12);
    assert_eq!(account.gold, 3400);

    let lands = store.own_lands(id).await.unwrap();
    assert_eq!(lands.len(), 2);
    assert_eq!(lands[0].plant_name, "carrot");
    // The visited farm belongs to the friend already recorded
    assert_eq!(store.friend_count(id), 1);
    assert_eq!(store.next_maturity(id, 0).await.unwrap(), Some(3_900_000_000));
}

#[tokio::test(start_paused = true)]
async fn test_worker_fails_for_unknown_account() {
    let (connector, _peers) = FakeConnector::new();
    let store = MemoryStore::new();
    let worker = worker(connector, &store);

    let err = worker.run(404).await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test(start_paused = true)]
async fn test_worker_reports_login_failure() {
    let store = MemoryStore::new();
    let id = seed(&store).await;
    let worker = worker(FakeConnector::refusing(), &store);

    let err = worker.run(id).await.unwrap_err();
    assert!(err.to_string().contains("login failed"));
    assert_eq!(store.account(id).unwrap().gid, None);
}

#[tokio::test(start_paused = true)]
async fn test_worker_run_fails_when_kicked_during_routine() {
    let (connector, mut peers) = FakeConnector::new();
    let store = MemoryStore::new();
    let id = seed(&store).await;
    let worker = worker(connector, &store);

    tokio::spawn(async move {
        let mut peer = peers.recv().await.unwrap();
        peer.accept_login().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        peer.push("gamepb.userpb.KickoutNotify", Vec::new());
        while peer.next_request().await.is_some() {}
    });

    let err = worker.run(id).await.unwrap_err();
    assert!(err.to_string().contains("session ended"));
    // Stats from the login are kept
    assert_eq!(store.account(id).unwrap().gid, Some(TEST_GID));
}
