//! Application wiring over an in-memory SQLite store

use std::time::Duration;

use prost::Message;

use farm_runner::domain::{LandRecord, NewAccount};
use farm_runner::protocol::messages::{LandInfo, LandsNotify};
use farm_runner::startup::Application;

use crate::common::{settings, FakeConnector, TEST_GID};

fn new_account() -> NewAccount {
    NewAccount {
        code: "test-code".into(),
        platform: "qq".into(),
        name: "alt".into(),
    }
}

#[tokio::test]
async fn test_run_once_persists_stats_and_lands() {
    let (connector, mut peers) = FakeConnector::new();
    let mut settings = settings("sqlite::memory:");
    settings.session.observe_window_secs = 1;
    let app = Application::build_with_connector(settings, connector).await.unwrap();
    let account = app.accounts.create(&new_account()).await.unwrap();

    tokio::spawn(async move {
        let mut peer = peers.recv().await.unwrap();
        peer.accept_login().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let lands = LandsNotify {
            host_gid: TEST_GID,
            lands: vec![LandInfo {
                id: 3,
                plant_id: 2001,
                plant_name: "carrot".into(),
                mature_time: 4_000_000_000,
                phase: 3,
            }],
        };
        peer.push("gamepb.plantpb.LandsNotify", lands.encode_to_vec());
        while peer.next_request().await.is_some() {}
    });

    app.run_once(account.id).await.unwrap();

    let stored = app.accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(stored.gid, Some(TEST_GID));
    assert_eq!(stored.name, "farmer");
    assert_eq!(stored.level, 12);

    let lands = app.lands.own_lands(account.id).await.unwrap();
    assert_eq!(lands.len(), 1);
    assert_eq!(lands[0].land_id, 3);
    assert_eq!(
        app.lands.next_maturity(account.id, 0).await.unwrap(),
        Some(4_000_000_000)
    );
}

#[tokio::test]
async fn test_scheduler_arms_stored_accounts() {
    let (connector, _peers) = FakeConnector::new();
    let app = Application::build_with_connector(settings("sqlite::memory:"), connector)
        .await
        .unwrap();
    let first = app.accounts.create(&new_account()).await.unwrap();
    let second = app.accounts.create(&new_account()).await.unwrap();

    let armed = app.scheduler.start().await.unwrap();
    assert_eq!(armed, 2);
    let status = app.scheduler.status();
    assert!(status.running);
    assert_eq!(status.account_ids, vec![first.id, second.id]);

    assert!(app.scheduler.remove_account(first.id));
    assert_eq!(app.scheduler.status().account_ids, vec![second.id]);

    app.scheduler.stop();
    assert!(!app.scheduler.is_running());
    assert!(app.scheduler.status().account_ids.is_empty());
}

#[tokio::test]
async fn test_report_lists_lands_and_next_maturity() {
    let (connector, _peers) = FakeConnector::new();
    let app = Application::build_with_connector(settings("sqlite::memory:"), connector)
        .await
        .unwrap();
    let farmer = app.accounts.create(&new_account()).await.unwrap();
    let idle = app.accounts.create(&new_account()).await.unwrap();

    let future = app.clock.now_secs() + 3600;
    for (land_id, mature_time) in [(1, future + 600), (2, future)] {
        let land = LandRecord {
            land_id,
            plant_id: 2001,
            plant_name: "carrot".into(),
            mature_time,
            phase: 3,
        };
        app.lands.upsert_own_land(farmer.id, &land).await.unwrap();
    }

    let reports = app.report().await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].account.id, farmer.id);
    assert_eq!(reports[0].lands, 2);
    assert_eq!(reports[0].next_maturity, Some(future));
    assert_eq!(reports[1].account.id, idle.id);
    assert_eq!(reports[1].lands, 0);
    assert_eq!(reports[1].next_maturity, None);
}
