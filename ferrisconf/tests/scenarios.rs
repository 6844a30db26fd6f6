//! End-to-end scenarios against simulated devices.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ferrisconf::model::{DhGroup, Encryption, EspIntegrity, IkeHash, IosXeIpsecOptions, JunosIpsecOptions};
use ferrisconf::sim::{SimulatedDevice, SimulatedLab};
use ferrisconf::{
    ChangeStatus, CommitOptions, Config, ConfirmStatus, DeviceBuilder, DeviceId, EventKind,
    IkeParameters, IpsecParameters, NetconfManager, OspfConfig, PeerParameters, Vendor,
};
use futures_util::future::join_all;
use secrecy::SecretString;
use tokio_test::{assert_err, assert_ok};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> Config {
    Config::default().with_template_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"))
}

struct Lab {
    manager: NetconfManager,
    lab: SimulatedLab,
}

impl Lab {
    fn new(devices: &[(&str, SimulatedDevice)]) -> Self {
        init_logging();
        let lab = SimulatedLab::new();
        for (host, device) in devices {
            lab.add(*host, device.clone());
        }
        let manager = NetconfManager::with_connector(config(), Arc::new(lab.clone())).unwrap();
        Self { manager, lab }
    }

    async fn connect(&self, host: &str, name: &str, vendor: Vendor) -> DeviceId {
        let spec = DeviceBuilder::new(host)
            .hostname(name)
            .vendor(vendor)
            .username("admin")
            .password("admin")
            .build(&config())
            .unwrap();
        self.manager.connect(spec).await.unwrap()
    }

    fn device(&self, host: &str) -> SimulatedDevice {
        self.lab.device(host).unwrap()
    }
}

fn ike() -> IkeParameters {
    IkeParameters {
        hash: "sha1".parse::<IkeHash>().unwrap(),
        encryption: "aes-128".parse::<Encryption>().unwrap(),
        dh_group: "group14".parse::<DhGroup>().unwrap(),
        lifetime_secs: 3600,
        psk: SecretString::from("s3cret-psk".to_string()),
    }
}

fn ipsec() -> IpsecParameters {
    IpsecParameters {
        integrity: "sha-hmac".parse::<EspIntegrity>().unwrap(),
        encryption: "aes-128".parse::<Encryption>().unwrap(),
        lifetime_secs: 3600,
    }
}

fn peers() -> (PeerParameters, PeerParameters) {
    let a = PeerParameters {
        lan_interface: "GigabitEthernet2".into(),
        wan_interface: "GigabitEthernet1".into(),
        local_network: "192.168.1.0/24".parse().unwrap(),
        remote_network: "192.168.2.0/24".parse().unwrap(),
        local_peer: "203.0.113.1".parse().unwrap(),
        remote_peer: "203.0.113.2".parse().unwrap(),
        ios_xe: IosXeIpsecOptions::default(),
        junos: JunosIpsecOptions::default(),
    };
    let b = PeerParameters {
        local_network: a.remote_network,
        remote_network: a.local_network,
        local_peer: a.remote_peer,
        remote_peer: a.local_peer,
        ..a.clone()
    };
    (a, b)
}

#[tokio::test]
async fn scenario_set_hostname() {
    let lab = Lab::new(&[("10.0.0.1", SimulatedDevice::ios_xe("r1"))]);
    let r1 = lab.connect("10.0.0.1", "r1", Vendor::IosXe).await;

    let outcome = lab.manager.set_hostname(&r1, "R1").await.unwrap();
    assert!(outcome.reply.is_ok());
    assert!(
        outcome
            .request
            .contains(r#"<native xmlns="http://cisco.com/ns/yang/Cisco-IOS-XE-native"><hostname>R1</hostname></native>"#)
    );
    let sent = lab.device("10.0.0.1").requests().pop().unwrap();
    assert!(sent.contains("<target><candidate/></target>"));

    // Cached hostname only follows the commit
    assert_eq!(lab.manager.hostname(&r1).await.unwrap(), "r1");
    assert_eq!(lab.device("10.0.0.1").running_hostname().as_deref(), Some("r1"));

    let results = lab.manager.commit(&[r1.clone()], CommitOptions::default()).await;
    assert!(results[&r1].is_ok());
    assert_eq!(lab.manager.hostname(&r1).await.unwrap(), "R1");
    assert_eq!(lab.manager.get_hostname(&r1).await.unwrap(), "R1");
    lab.manager.shutdown().await;
}

#[tokio::test]
async fn scenario_replace_ipv4_address() {
    let lab = Lab::new(&[("10.0.0.1", SimulatedDevice::ios_xe("r1"))]);
    let r1 = lab.connect("10.0.0.1", "r1", Vendor::IosXe).await;

    let [deleted, added] = lab
        .manager
        .replace_interface_ip(
            &r1,
            "GigabitEthernet1",
            0,
            "10.0.0.1/24".parse().unwrap(),
            "10.0.0.2/24".parse().unwrap(),
        )
        .await
        .unwrap();
    assert!(deleted.request.contains(r#"operation="delete""#));
    assert!(deleted.request.contains("<ip>10.0.0.1</ip>"));
    assert!(added.request.contains("<ip>10.0.0.2</ip>"));
    assert!(added.request.contains("<prefix-length>24</prefix-length>"));
    assert!(!added.request.contains("operation="));

    let sent = lab.device("10.0.0.1").requests();
    let edits: Vec<_> = sent.iter().filter(|r| r.contains("<edit-config>")).collect();
    assert_eq!(edits.len(), 2);
    assert!(edits.iter().all(|r| r.contains("<candidate/>")));

    let pending = lab.manager.pending(&r1);
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|c| c.status == ChangeStatus::Pending));

    let results = lab.manager.commit(&[r1.clone()], CommitOptions::default()).await;
    assert!(results[&r1].is_ok());
    let subinterfaces = lab.manager.get_subinterfaces(&r1, "GigabitEthernet1").await.unwrap();
    let addresses: Vec<String> = subinterfaces[0].ipv4().iter().map(ToString::to_string).collect();
    assert_eq!(addresses, vec!["10.0.0.2/24".to_string()]);
    lab.manager.shutdown().await;
}

#[tokio::test]
async fn scenario_ospf_reference_bandwidth() {
    let lab = Lab::new(&[("10.0.0.2", SimulatedDevice::junos("vsrx"))]);
    let vsrx = lab.connect("10.0.0.2", "vsrx", Vendor::Junos).await;

    let ospf = OspfConfig::new("0.0.0.0")
        .with_reference_bandwidth(10_000)
        .with_network("GigabitEthernet2", "10.1.0.0/24".parse().unwrap());
    let outcome = lab.manager.configure_ospf(&vsrx, &ospf).await.unwrap();
    assert!(outcome.request.contains("http://openconfig.net/yang/network-instance"));
    assert!(outcome.request.contains("<id>GigabitEthernet2</id><metric>10</metric>"));
    assert_eq!(lab.manager.pending(&vsrx).len(), 1);
    lab.manager.shutdown().await;
}

#[tokio::test]
async fn scenario_ipsec_between_two_ios_xe_peers() {
    let lab = Lab::new(&[
        ("10.0.0.1", SimulatedDevice::ios_xe("r1")),
        ("10.0.0.3", SimulatedDevice::ios_xe("r3")),
    ]);
    let r1 = lab.connect("10.0.0.1", "r1", Vendor::IosXe).await;
    let r3 = lab.connect("10.0.0.3", "r3", Vendor::IosXe).await;
    let (peer_a, peer_b) = peers();

    let results = lab
        .manager
        .configure_ipsec(&r1, &r3, &peer_a, &peer_b, &ike(), &ipsec())
        .await
        .unwrap();
    for (device, result) in &results {
        let outcome = result.as_ref().unwrap();
        let request = &outcome.request;
        assert!(request.contains("<name>100</name>"), "{device}");
        assert!(request.contains("<tag>sha_hmac_aes_128</tag>"), "{device}");
        assert!(request.contains("<number>1</number>"), "{device}");
        assert!(request.contains("<key>128</key>"), "{device}");
        assert!(request.contains("<group>14</group>"), "{device}");
        assert!(request.contains("<lifetime>3600</lifetime>"), "{device}");
        assert!(request.contains("<tag>netconf_cm</tag>"), "{device}");
        assert!(request.contains("<seq>1</seq>"), "{device}");
        assert!(request.contains("<ipv4-addr>203.0.113."), "{device}");
        assert_eq!(lab.manager.pending(device).len(), 1);
    }

    let committed = lab.manager.commit(&[r1.clone(), r3.clone()], CommitOptions::default()).await;
    assert!(committed.values().all(Result::is_ok));
    for (device, peer) in [(&r1, &peer_a), (&r3, &peer_b)] {
        let summary = lab.manager.get_crypto_map(device).await.unwrap();
        assert_eq!(summary.name.as_deref(), Some("netconf_cm"));
        assert_eq!(summary.transform_set.as_deref(), Some("sha_hmac_aes_128"));
        assert_eq!(summary.peer, Some(peer.remote_peer));
        assert_eq!(summary.isakmp_policy, Some(1));
        assert_eq!(summary.acl.as_deref(), Some("100"));
    }

    // Peers that do not mirror each other are rejected before anything is sent
    let before = lab.device("10.0.0.1").requests().len();
    let err = lab
        .manager
        .configure_ipsec(&r1, &r3, &peer_a, &peer_a, &ike(), &ipsec())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ferrisconf::ErrorKind::InvalidParameters);
    assert_eq!(lab.device("10.0.0.1").requests().len(), before);
    lab.manager.shutdown().await;
}

#[tokio::test]
async fn scenario_discard_on_junos() {
    let lab = Lab::new(&[("10.0.0.2", SimulatedDevice::junos("vsrx"))]);
    let vsrx = lab.connect("10.0.0.2", "vsrx", Vendor::Junos).await;

    let ospf = OspfConfig::new("0.0.0.0").with_network("ge-0/0/1", "10.1.0.0/24".parse().unwrap());
    lab.manager.configure_ospf(&vsrx, &ospf).await.unwrap();
    assert!(lab.manager.is_dirty(&vsrx).await.unwrap());

    let results = lab.manager.discard(&[vsrx.clone()]).await;
    assert!(results[&vsrx].is_ok());

    let last = lab.device("10.0.0.2").requests().pop().unwrap();
    assert!(last.contains(r#"<load-configuration rollback="0"/>"#));
    assert!(!lab.manager.is_dirty(&vsrx).await.unwrap());
    assert!(lab.manager.pending(&vsrx).is_empty());
    let entries = lab.manager.ledger().entries(&vsrx);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, ChangeStatus::Discarded);
    assert!(lab.device("10.0.0.2").candidate().find("network-instances").is_none());
    lab.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_confirmed_commit_timeout() {
    let lab = Lab::new(&[("10.0.0.1", SimulatedDevice::ios_xe("r1"))]);
    let r1 = lab.connect("10.0.0.1", "r1", Vendor::IosXe).await;

    lab.manager.set_hostname(&r1, "R1").await.unwrap();
    let results = lab
        .manager
        .commit(&[r1.clone()], CommitOptions::confirmed(Duration::from_secs(30)))
        .await;
    assert!(results[&r1].is_ok());
    assert_eq!(lab.manager.get_hostname(&r1).await.unwrap(), "R1");
    assert!(matches!(lab.manager.confirm_status(&r1).unwrap(), ConfirmStatus::Open { .. }));

    tokio::time::advance(Duration::from_secs(31)).await;

    assert_eq!(lab.manager.get_hostname(&r1).await.unwrap(), "r1");
    assert_eq!(lab.manager.confirm_status(&r1).unwrap(), ConfirmStatus::Expired);
    assert_err!(lab.manager.confirm(&r1).await);
    assert_eq!(lab.manager.pending(&r1).len(), 1, "entries stay pending until acknowledged");

    assert_eq!(lab.manager.acknowledge_expired(&r1).await.unwrap(), 1);
    assert!(lab.manager.pending(&r1).is_empty());
    assert_eq!(lab.manager.hostname(&r1).await.unwrap(), "r1");
    lab.manager.shutdown().await;
}

#[tokio::test]
async fn ledger_events_follow_apply_and_commit() {
    let lab = Lab::new(&[("10.0.0.1", SimulatedDevice::ios_xe("r1"))]);
    let r1 = lab.connect("10.0.0.1", "r1", Vendor::IosXe).await;

    let added = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));
    let a = added.clone();
    lab.manager.ledger().subscribe(EventKind::PendingChangeAdded, move |_| {
        a.fetch_add(1, Ordering::SeqCst);
    });
    let r = removed.clone();
    lab.manager.ledger().subscribe(EventKind::PendingChangeRemoved, move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    lab.manager.set_hostname(&r1, "R1").await.unwrap();
    lab.manager
        .add_interface_ip(&r1, "GigabitEthernet2", 0, "10.2.0.1/30".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(added.load(Ordering::SeqCst), 2);
    assert_eq!(removed.load(Ordering::SeqCst), 0);

    lab.manager.commit(&[r1.clone()], CommitOptions::default()).await;
    assert_eq!(removed.load(Ordering::SeqCst), 2);
    lab.manager.shutdown().await;
}

#[tokio::test]
async fn parallel_ospf_on_many_devices_is_identical() {
    let hosts: Vec<String> = (1..=4).map(|i| format!("10.0.1.{i}")).collect();
    let devices: Vec<(&str, SimulatedDevice)> = hosts
        .iter()
        .enumerate()
        .map(|(i, host)| (host.as_str(), SimulatedDevice::ios_xe(&format!("r{i}"))))
        .collect();
    let lab = Lab::new(&devices);

    let mut ids = Vec::new();
    for (i, host) in hosts.iter().enumerate() {
        ids.push(lab.connect(host, &format!("r{i}"), Vendor::IosXe).await);
    }

    let ospf = OspfConfig::new("0.0.0.0")
        .with_reference_bandwidth(10_000)
        .with_passive("GigabitEthernet3")
        .with_network("GigabitEthernet2", "10.1.0.0/24".parse().unwrap());
    let outcomes = join_all(ids.iter().map(|id| lab.manager.configure_ospf(id, &ospf))).await;
    let requests: Vec<String> = outcomes.into_iter().map(|o| o.unwrap().request).collect();
    assert!(requests.windows(2).all(|w| w[0] == w[1]));

    let results = lab.manager.commit(&ids, CommitOptions::default()).await;
    assert_eq!(results.len(), ids.len());
    assert!(results.values().all(Result::is_ok));
    lab.manager.shutdown().await;
}

#[tokio::test]
async fn commit_failure_is_per_device() {
    let lab = Lab::new(&[
        ("10.0.0.1", SimulatedDevice::ios_xe("r1")),
        ("10.0.0.2", SimulatedDevice::junos("vsrx")),
    ]);
    let r1 = lab.connect("10.0.0.1", "r1", Vendor::IosXe).await;
    let vsrx = lab.connect("10.0.0.2", "vsrx", Vendor::Junos).await;

    lab.manager.set_hostname(&r1, "R1").await.unwrap();
    lab.manager.set_hostname(&vsrx, "edge").await.unwrap();
    lab.device("10.0.0.2").inject(ferrisconf::sim::Fault::RpcError {
        tag: "operation-failed".to_string(),
        message: "commit check failed".to_string(),
    });

    let unknown = DeviceId::new("ghost");
    let results = lab
        .manager
        .commit(&[r1.clone(), vsrx.clone(), unknown.clone()], CommitOptions::default())
        .await;
    assert_ok!(&results[&r1]);
    assert_err!(&results[&vsrx]);
    assert_err!(&results[&unknown]);

    assert!(!lab.manager.is_dirty(&r1).await.unwrap());
    assert!(lab.manager.is_dirty(&vsrx).await.unwrap());
    assert_eq!(lab.manager.pending(&vsrx).len(), 1);
    assert_eq!(lab.manager.hostname(&vsrx).await.unwrap(), "vsrx");
    lab.manager.shutdown().await;
}
