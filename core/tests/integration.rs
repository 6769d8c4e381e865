//! End-to-end tests against the live mock PostgREST server.
//!
//! Each test starts its own server on a random port and points both the
//! master and slave endpoints at it, then talks to it over real HTTP through
//! `UreqTransport` with HMAC-signed tokens.

use std::net::SocketAddr;
use std::time::Duration;

use pgrest_core::{Agent, AgentConfig, Endpoint, Error, JwtSigner, Query, UreqTransport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Person {
    id: u64,
    first_name: String,
    last_name: String,
    email: String,
    phone_number: String,
}

fn test_person() -> Person {
    Person {
        id: 12_345_678_900,
        first_name: "Test".to_string(),
        last_name: "Testerson".to_string(),
        email: "ttesterson@tester.test".to_string(),
        phone_number: "(000)000-0000".to_string(),
    }
}

const TABLE: &str = "test_table";

/// Start the mock server on a random port and return its address.
fn spawn_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn config_for(addr: SocketAddr) -> AgentConfig {
    let base = format!("http://{addr}");
    AgentConfig::default()
        .with_issuer("test")
        .with_master(base.clone(), "masterRole", "masterSecret")
        .with_slave(base, "slaveRole", "slaveSecret")
        .with_token_lifetime(Duration::from_secs(5))
}

fn agent_for(config: AgentConfig) -> Agent {
    Agent::new(config, UreqTransport::new(), JwtSigner::hs256()).unwrap()
}

fn by_id(id: u64) -> Query {
    let mut query = Query::new();
    query.set("id", format!("eq.{id}"));
    query
}

#[test]
fn ping_succeeds_against_live_server() {
    let agent = agent_for(config_for(spawn_server()));
    agent.ping().unwrap();
}

#[test]
fn ping_reports_failing_master_status() {
    let addr = spawn_server();
    let mut config = config_for(addr);
    config.master_base_url = format!("http://{addr}?error=404");
    let agent = agent_for(config);

    let err = agent.ping().unwrap_err();
    assert!(matches!(
        err,
        Error::Unhealthy {
            endpoint: Endpoint::Master,
            ..
        }
    ));
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().starts_with("master service error: "), "{err}");
    assert!(err.to_string().ends_with("404 Not Found"), "{err}");
}

#[test]
fn ping_reports_failing_slave_after_healthy_master() {
    let addr = spawn_server();
    let mut config = config_for(addr);
    config.slave_base_url = format!("http://{addr}?error=503");

    let err = agent_for(config).ping().unwrap_err();
    assert!(matches!(
        err,
        Error::Unhealthy {
            endpoint: Endpoint::Slave,
            ..
        }
    ));
    assert_eq!(err.status(), Some(503));
}

#[test]
fn ping_reports_unreachable_master_as_transport_error() {
    let addr = spawn_server();
    let mut config = config_for(addr);
    // Port 9 (discard) on localhost is not listening in test environments.
    config.master_base_url = "http://127.0.0.1:9".to_string();

    match agent_for(config).ping().unwrap_err() {
        Error::Unhealthy { endpoint, source } => {
            assert_eq!(endpoint, Endpoint::Master);
            assert!(matches!(*source, Error::Transport(_)), "{source}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn read_of_unknown_table_is_404() {
    let agent = agent_for(config_for(spawn_server()));

    let response = agent.get("tableNoExist", None).unwrap();
    assert_eq!(response.status, 404);

    let err = agent.get_json::<Vec<Person>>("tableNoExist", None).unwrap_err();
    assert!(matches!(err, Error::Remote { status: 404, .. }));
}

#[test]
fn read_with_error_param_is_remote_error() {
    let agent = agent_for(config_for(spawn_server()));
    agent.post_json(TABLE, &test_person()).unwrap();

    let mut query = by_id(test_person().id);
    query.set("error", "404");
    match agent.get_json::<Vec<Person>>(TABLE, Some(&query)).unwrap_err() {
        Error::Remote {
            method,
            url,
            status,
            reason,
        } => {
            assert_eq!(method.as_str(), "GET");
            assert!(url.contains("error=404"), "{url}");
            assert_eq!(status, 404);
            assert_eq!(reason, "Not Found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn post_returns_created() {
    let agent = agent_for(config_for(spawn_server()));
    let body = serde_json::to_vec(&test_person()).unwrap();

    let response = agent.post(TABLE, body).unwrap();
    assert_eq!(response.status, 201);

    assert_eq!(agent.post_json(TABLE, &test_person()).unwrap(), 201);
}

#[test]
fn post_and_return_echoes_sent_object() {
    let agent = agent_for(config_for(spawn_server()));

    let raw = agent
        .post_and_return(TABLE, serde_json::to_vec(&test_person()).unwrap())
        .unwrap();
    assert_eq!(raw.status, 201);
    let echoed: Person = serde_json::from_slice(&raw.body).unwrap();
    assert_eq!(echoed, test_person());

    let decoded = agent
        .post_json_and_return::<_, Person>(TABLE, &test_person())
        .unwrap();
    assert_eq!(decoded.status, 201);
    assert_eq!(decoded.body, test_person());
}

#[test]
fn table_lifecycle() {
    let agent = agent_for(config_for(spawn_server()));
    let ada = Person {
        id: 1,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@engine.test".to_string(),
        phone_number: "(000)000-0001".to_string(),
    };

    // create two rows
    assert_eq!(agent.post_json(TABLE, &[test_person(), ada.clone()]).unwrap(), 201);

    // read one back by id
    let rows = agent.get_json::<Vec<Person>>(TABLE, Some(&by_id(1))).unwrap();
    assert_eq!(rows.status, 200);
    assert_eq!(rows.body, vec![ada.clone()]);

    // paginate
    let mut page = Query::new();
    page.set("limit", "1").set("offset", "1");
    let rows = agent.get_json::<Vec<Person>>(TABLE, Some(&page)).unwrap();
    assert_eq!(rows.body, vec![ada.clone()]);

    // update
    let status = agent
        .patch_json(
            TABLE,
            Some(&by_id(1)),
            &serde_json::json!({ "email": "countess@engine.test" }),
        )
        .unwrap();
    assert_eq!(status, 204);

    let rows = agent.get_json::<Vec<Person>>(TABLE, Some(&by_id(1))).unwrap();
    assert_eq!(rows.body[0].email, "countess@engine.test");

    // raw patch with caller-serialized body
    let response = agent
        .patch(TABLE, Some(&by_id(1)), r#"{"last_name":"King"}"#)
        .unwrap();
    assert_eq!(response.status, 204);

    // delete
    assert_eq!(agent.delete_json(TABLE, Some(&by_id(1))).unwrap(), 204);
    let rows = agent.get_json::<Vec<Person>>(TABLE, None).unwrap();
    assert_eq!(rows.body, vec![test_person()]);

    let response = agent.delete(TABLE, None).unwrap();
    assert_eq!(response.status, 204);
    let rows = agent.get_json::<Vec<Person>>(TABLE, None).unwrap();
    assert!(rows.body.is_empty());
}

#[test]
fn reads_bodies_larger_than_ten_mebibytes() {
    let agent = agent_for(config_for(spawn_server()));
    let filler = "x".repeat(1024 * 1024);
    for id in 0..12u64 {
        let status = agent
            .post_json("bulk", &serde_json::json!({ "id": id, "filler": filler }))
            .unwrap();
        assert_eq!(status, 201);
    }

    let raw = agent.get("bulk", None).unwrap();
    assert_eq!(raw.status, 200);
    assert!(raw.body.len() > 10 * 1024 * 1024, "{} bytes", raw.body.len());

    let rows = agent.get_json::<Vec<serde_json::Value>>("bulk", None).unwrap();
    assert_eq!(rows.body.len(), 12);
    assert_eq!(rows.body[11]["id"], 11);
}

#[test]
fn configured_body_limit_is_enforced() {
    let config = config_for(spawn_server());
    let agent = Agent::new(
        config,
        UreqTransport::new().with_body_limit(16),
        JwtSigner::hs256(),
    )
    .unwrap();
    agent.post_json(TABLE, &test_person()).unwrap();

    let err = agent.get(TABLE, None).unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err}");
}

#[test]
fn decode_failure_reports_internal_status() {
    let agent = agent_for(config_for(spawn_server()));
    agent.post_json(TABLE, &test_person()).unwrap();

    // Rows are an array; asking for a single object cannot decode.
    let err = agent.get_json::<Person>(TABLE, None).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(err.status(), Some(500));
}

#[test]
fn write_to_malformed_master_fails_before_sending() {
    let addr = spawn_server();
    let mut config = config_for(addr);
    config.master_base_url = "://xy/".to_string();
    let agent = agent_for(config);

    for err in [
        agent.post(TABLE, "{}").unwrap_err(),
        agent.post_json(TABLE, &test_person()).unwrap_err(),
        agent
            .post_json_and_return::<_, Person>(TABLE, &test_person())
            .unwrap_err(),
        agent.patch_json(TABLE, Some(&by_id(1)), &test_person()).unwrap_err(),
        agent.delete_json(TABLE, Some(&by_id(1))).unwrap_err(),
    ] {
        assert!(matches!(err, Error::MalformedBase { .. }), "{err}");
        assert!(err.to_string().starts_with("parse ://xy/: "), "{err}");
    }

    // Reads go to the slave, which is still fine.
    assert_eq!(agent.get(TABLE, None).unwrap().status, 404);
}
